//! Reads certificates from standalone PEM files.

use std::{
    fs,
    path::{Path, PathBuf},
};

use snafu::{ResultExt, Snafu};
use tracing::debug;

use super::CertificateRecord;
use crate::pem;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read {path:?}"))]
    ReadFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to parse certificates in {path:?}"))]
    ParseCertificates {
        source: pem::ParseError,
        path: PathBuf,
    },
}

#[tracing::instrument]
pub fn read(path: &Path) -> Result<Vec<CertificateRecord>, Error> {
    let contents = fs::read(path).context(ReadFileSnafu { path })?;
    let certificates = pem::decode(&contents)
        .context(ParseCertificatesSnafu { path })?
        .certificates;
    debug!(certificates = certificates.len(), "Decoded PEM file");
    Ok(certificates
        .into_iter()
        .map(CertificateRecord::uncorrelated)
        .collect())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{read, Error};
    use crate::{
        pem::ParseError,
        test_utils::{common_name, pem_bundle, self_signed},
    };

    #[test]
    fn reads_uncorrelated_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.pem");
        fs::write(
            &path,
            pem_bundle(&[self_signed("first"), self_signed("second")]),
        )
        .unwrap();

        let records = read(&path).unwrap();

        assert_eq!(
            records
                .iter()
                .map(|record| common_name(record.certificate.subject_name()))
                .collect::<Vec<_>>(),
            ["first", "second"]
        );
        assert!(records
            .iter()
            .all(|record| record.identity.is_none() && record.source_expression.is_none()));
    }

    #[test]
    fn empty_file_has_no_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.pem");
        fs::write(&path, "").unwrap();

        assert!(read(&path).unwrap().is_empty());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.pem");

        let err = read(&path).unwrap_err();
        assert!(matches!(err, Error::ReadFile { .. }), "{err:?}");
        assert!(err.to_string().contains("missing.pem"));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.pem");
        fs::write(
            &path,
            "-----BEGIN CERTIFICATE-----\nZm9vYmFy\n-----END CERTIFICATE-----\n",
        )
        .unwrap();

        assert!(matches!(
            read(&path),
            Err(Error::ParseCertificates {
                source: ParseError::Malformed { index: 0, .. },
                ..
            })
        ));
    }
}
