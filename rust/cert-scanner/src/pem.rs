//! Decoding of PEM certificate bundles.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use openssl::x509::X509;
use snafu::{ResultExt, Snafu};
use stackable_cert_scanner_utils::pem::{pem_blocks, UnterminatedBlock};

#[derive(Debug, Snafu)]
pub enum ParseError {
    #[snafu(display("PEM block #{index} is truncated"))]
    Unterminated {
        source: UnterminatedBlock,
        index: usize,
    },

    #[snafu(display("PEM block #{index} ({label}, at byte {offset}) is not valid base64"))]
    InvalidArmor {
        source: base64::DecodeError,
        index: usize,
        offset: usize,
        label: String,
    },

    #[snafu(display(
        "PEM block #{index} ({label}, at byte {offset}) is malformed, and is not valid X.509 data"
    ))]
    Malformed {
        source: openssl::error::ErrorStack,
        index: usize,
        offset: usize,
        label: String,
    },
}

#[derive(Debug)]
pub struct Decoded {
    /// Certificates in order of appearance.
    pub certificates: Vec<X509>,

    /// Number of input bytes up to and including the last certificate's footer.
    pub consumed: usize,
}

/// Decodes every PEM block in `pem` as an X.509 certificate.
///
/// The block label is not interpreted, so legacy labels such as `X509 CERTIFICATE` decode fine,
/// while a bundled `PRIVATE KEY` is rejected as malformed. A buffer without any blocks decodes to
/// an empty list. A single bad block fails the whole buffer, no partial results are returned.
pub fn decode(pem: &[u8]) -> Result<Decoded, ParseError> {
    let mut certificates = Vec::new();
    let mut consumed = 0;
    for (index, block) in pem_blocks(pem).enumerate() {
        let block = block.context(UnterminatedSnafu { index })?;
        let armor = block
            .body
            .iter()
            .copied()
            .filter(|b| !b.is_ascii_whitespace())
            .collect::<Vec<u8>>();
        let der = STANDARD.decode(armor).with_context(|_| InvalidArmorSnafu {
            index,
            offset: block.offset,
            label: block.label(),
        })?;
        let certificate = X509::from_der(&der).with_context(|_| MalformedSnafu {
            index,
            offset: block.offset,
            label: block.label(),
        })?;
        certificates.push(certificate);
        consumed = block.range().end;
    }
    Ok(Decoded {
        certificates,
        consumed,
    })
}
