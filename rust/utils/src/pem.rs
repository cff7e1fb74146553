//! Locating PEM blocks inside arbitrary byte buffers.

use std::{borrow::Cow, ops::Range};

use snafu::Snafu;

const BEGIN: &[u8] = b"-----BEGIN ";
const END: &[u8] = b"-----END ";
const DASHES: &[u8] = b"-----";

/// A `-----BEGIN <label>-----` marker was found, but the buffer ended before the matching
/// `-----END <label>-----`.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(display("PEM {label} block starting at byte {offset} has no matching footer"))]
pub struct UnterminatedBlock {
    pub offset: usize,
    pub label: String,
}

/// One PEM block, of any label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PemBlock<'a> {
    /// Byte offset of the header within the scanned buffer.
    pub offset: usize,

    /// The label between `-----BEGIN ` and `-----`, such as `CERTIFICATE` or `PRIVATE KEY`.
    pub label: &'a [u8],

    /// The (still base64-armored) payload between the header and footer lines.
    pub body: &'a [u8],

    /// The whole block, including its header and footer.
    pub contents: &'a [u8],
}

impl<'a> PemBlock<'a> {
    /// The range of the scanned buffer that this block occupies.
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.contents.len()
    }

    pub fn label(&self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.label)
    }
}

/// Iterates over the PEM blocks in `pem`, in order of appearance.
///
/// Anything between blocks (comments, `openssl` bag attributes) is skipped, as are `-----BEGIN`
/// markers that are not closed by `-----` on the same line. A header without a footer is reported
/// once as an error, after which the iterator is exhausted.
pub fn pem_blocks(pem: &[u8]) -> PemBlocks<'_> {
    PemBlocks { pem, position: 0 }
}

pub struct PemBlocks<'a> {
    pem: &'a [u8],
    position: usize,
}

impl<'a> Iterator for PemBlocks<'a> {
    type Item = Result<PemBlock<'a>, UnterminatedBlock>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Some(begin_pos) = find(&self.pem[self.position..], BEGIN) else {
                self.position = self.pem.len();
                return None;
            };
            let start = self.position + begin_pos;
            let label_start = start + BEGIN.len();
            // Skip over this marker whatever happens, so that the next search makes progress
            self.position = label_start;

            let Some(label_len) = header_label_len(&self.pem[label_start..]) else {
                continue;
            };
            let label = &self.pem[label_start..label_start + label_len];
            let body_start = label_start + label_len + DASHES.len();

            let footer = [END, label, DASHES].concat();
            let Some(footer_pos) = find(&self.pem[body_start..], &footer) else {
                self.position = self.pem.len();
                return Some(
                    UnterminatedBlockSnafu {
                        offset: start,
                        label: String::from_utf8_lossy(label),
                    }
                    .fail(),
                );
            };
            let body_end = body_start + footer_pos;
            let end = body_end + footer.len();
            self.position = end;
            return Some(Ok(PemBlock {
                offset: start,
                label,
                body: &self.pem[body_start..body_end],
                contents: &self.pem[start..end],
            }));
        }
    }
}

/// Length of the label in `rest` (the header line after `-----BEGIN `), if the line is closed by
/// `-----`.
fn header_label_len(rest: &[u8]) -> Option<usize> {
    let line_end = rest
        .iter()
        .position(|&b| b == b'\n')
        .unwrap_or(rest.len());
    find(&rest[..line_end], DASHES).filter(|&len| len > 0)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
