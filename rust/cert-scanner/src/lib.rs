//! Extraction of X.509 certificates from heterogeneous configuration sources.
//!
//! A [`CertificateSource`] describes one scan target (a PEM file, a kubeconfig-style document or a
//! Kubernetes Secret). [`CertificateSource::parse`] turns it into a list of [`CertificateRecord`]s,
//! or fails with a [`SourceError`] that names the source.

pub mod cert_ext;
pub mod pem;
pub mod query;
pub mod source;
pub mod well_known;

#[cfg(test)]
mod test_utils;

pub use self::source::{
    document::{Encoding, PathExpressionPair},
    CertificateRecord, CertificateSource, Format, FormatKind, ReadError, SourceError,
};
