//! Reads certificates embedded in (or referenced by) structured documents, such as kubeconfigs.

use std::{
    fs,
    path::{Path, PathBuf},
};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use snafu::{ensure, ResultExt, Snafu};
use stackable_cert_scanner_utils::bytes::iterator_try_concat_bytes;
use tracing::debug;

use super::CertificateRecord;
use crate::{
    pem,
    query::{QueryError, QueryEvaluator},
};

/// How certificate material is stored at the location matched by a certificate expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Encoding {
    /// The matched value is base64-encoded PEM (for example `certificate-authority-data`).
    InlineBase64,

    /// The matched value is a path to a PEM file, relative to the document's directory (for
    /// example `certificate-authority`).
    FileReference,
}

/// Where to find certificates in a document, and which labels identify them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathExpressionPair {
    pub certificate_expression: String,

    /// Must match exactly one label per certificate found by `certificate_expression`, in the
    /// same order.
    pub identity_expression: String,

    pub encoding: Encoding,
}

impl PathExpressionPair {
    pub fn new(
        certificate_expression: impl Into<String>,
        identity_expression: impl Into<String>,
        encoding: Encoding,
    ) -> Self {
        Self {
            certificate_expression: certificate_expression.into(),
            identity_expression: identity_expression.into(),
            encoding,
        }
    }
}

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to evaluate {expression:?} against {document:?}"))]
    EvaluateExpression {
        source: QueryError,
        document: PathBuf,
        expression: String,
    },

    #[snafu(display(
        "failed to decode base64 certificate data matched by {expression:?} in {document:?}"
    ))]
    DecodeInline {
        source: base64::DecodeError,
        document: PathBuf,
        expression: String,
    },

    #[snafu(display(
        "failed to read certificate file {path:?} referenced by {expression:?} in {document:?}"
    ))]
    ReadReference {
        source: std::io::Error,
        document: PathBuf,
        expression: String,
        path: PathBuf,
    },

    #[snafu(display("failed to parse certificates matched by {expression:?} in {document:?}"))]
    ParseCertificates {
        source: pem::ParseError,
        document: PathBuf,
        expression: String,
    },

    #[snafu(display(
        "failed to parse some labels in {document:?} (got {identities} IDs for {identity_expression:?} but {certificates} certs for {certificate_expression:?})"
    ))]
    CorrelationCountMismatch {
        document: PathBuf,
        certificate_expression: String,
        identity_expression: String,
        identities: usize,
        certificates: usize,
    },
}

/// Reads the certificates located by each of `expressions`, in order.
///
/// Expressions that match nothing are skipped. Any other failure aborts the whole read, discarding
/// the records found by earlier expressions.
#[tracing::instrument(skip(expressions, evaluator))]
pub fn read(
    document: &Path,
    expressions: &[PathExpressionPair],
    evaluator: &dyn QueryEvaluator,
) -> Result<Vec<CertificateRecord>, Error> {
    let mut records = Vec::new();
    for pair in expressions {
        records.extend(read_pair(document, pair, evaluator)?);
    }
    Ok(records)
}

fn read_pair(
    document: &Path,
    pair: &PathExpressionPair,
    evaluator: &dyn QueryEvaluator,
) -> Result<Vec<CertificateRecord>, Error> {
    let PathExpressionPair {
        certificate_expression,
        identity_expression,
        encoding,
    } = pair;

    let raw_certificates = evaluator
        .evaluate(document, certificate_expression)
        .context(EvaluateExpressionSnafu {
            document,
            expression: certificate_expression,
        })?;
    let matches = non_empty_lines(&raw_certificates).collect::<Vec<_>>();
    if matches.is_empty() {
        debug!(%certificate_expression, "Expression matched nothing, skipping");
        return Ok(Vec::new());
    }

    let pem = match encoding {
        Encoding::InlineBase64 => {
            iterator_try_concat_bytes(matches.iter().map(|value| STANDARD.decode(value)))
                .context(DecodeInlineSnafu {
                    document,
                    expression: certificate_expression,
                })?
        }
        Encoding::FileReference => {
            let base_dir = document.parent().unwrap_or_else(|| Path::new(""));
            iterator_try_concat_bytes(matches.iter().map(|value| {
                let path = base_dir.join(value);
                debug!(?path, "Reading referenced certificate file");
                fs::read(&path).context(ReadReferenceSnafu {
                    document,
                    expression: certificate_expression,
                    path: &path,
                })
            }))?
        }
    };
    let certificates = pem::decode(&pem)
        .context(ParseCertificatesSnafu {
            document,
            expression: certificate_expression,
        })?
        .certificates;

    let raw_identities = evaluator
        .evaluate(document, identity_expression)
        .context(EvaluateExpressionSnafu {
            document,
            expression: identity_expression,
        })?;
    let identities = non_empty_lines(&raw_identities).collect::<Vec<_>>();
    ensure!(
        identities.len() == certificates.len(),
        CorrelationCountMismatchSnafu {
            document,
            certificate_expression,
            identity_expression,
            identities: identities.len(),
            certificates: certificates.len(),
        }
    );
    debug!(
        %certificate_expression,
        certificates = certificates.len(),
        "Correlated certificates with identities"
    );

    Ok(certificates
        .into_iter()
        .zip(identities)
        .map(|(certificate, identity)| CertificateRecord {
            certificate,
            identity: Some(identity.to_owned()),
            source_expression: Some(certificate_expression.clone()),
        })
        .collect())
}

/// Splits evaluator output into one value per line, dropping trailing whitespace and blank lines.
fn non_empty_lines(raw: &str) -> impl Iterator<Item = &str> {
    raw.lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
}
