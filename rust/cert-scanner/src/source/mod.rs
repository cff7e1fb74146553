//! Certificate sources, and the dispatch from a source to the reader for its format.

use std::{
    fmt::Display,
    path::{Path, PathBuf},
    sync::Arc,
};

use openssl::x509::X509;
use snafu::{ResultExt, Snafu};
use stackable_operator::k8s_openapi::api::core::v1::Secret;
use strum::EnumDiscriminants;
use tracing::debug;

use self::document::PathExpressionPair;
use crate::query::QueryEvaluator;

pub mod document;
pub mod file;
pub mod secret;

/// One decoded certificate.
#[derive(Debug, Clone)]
pub struct CertificateRecord {
    pub certificate: X509,

    /// The label (such as the cluster or user name) that owns the certificate.
    ///
    /// Only known for [`Format::StructuredDocument`] sources.
    pub identity: Option<String>,

    /// The path expression that located the certificate.
    ///
    /// Only known for [`Format::StructuredDocument`] sources.
    pub source_expression: Option<String>,
}

impl CertificateRecord {
    fn uncorrelated(certificate: X509) -> Self {
        Self {
            certificate,
            identity: None,
            source_expression: None,
        }
    }
}

#[derive(Debug, EnumDiscriminants)]
#[strum_discriminants(
    name(FormatKind),
    derive(strum::Display),
    strum(serialize_all = "kebab-case")
)]
pub enum Format {
    /// A file of concatenated PEM certificates.
    DirectFile,

    /// A YAML/JSON document (such as a kubeconfig) that embeds or references certificates.
    StructuredDocument {
        expressions: Vec<PathExpressionPair>,
        evaluator: Arc<dyn QueryEvaluator>,
    },

    /// A Kubernetes TLS Secret.
    ClusterSecret { secret: Box<Secret> },
}

#[derive(Debug, Snafu)]
pub enum ReadError {
    #[snafu(display("failed to read PEM file"), context(false))]
    DirectFile { source: file::Error },

    #[snafu(display("failed to read structured document"), context(false))]
    StructuredDocument { source: document::Error },

    #[snafu(display("failed to read cluster secret"), context(false))]
    ClusterSecret { source: secret::Error },
}

/// A failure to read a [`CertificateSource`], along with the source itself.
#[derive(Debug, Snafu)]
#[snafu(display("failed to read certificates from {certificate_source}"))]
pub struct SourceError {
    source: ReadError,
    certificate_source: Box<CertificateSource>,
}

impl SourceError {
    pub fn reason(&self) -> &ReadError {
        &self.source
    }

    pub fn certificate_source(&self) -> &CertificateSource {
        &self.certificate_source
    }

    pub fn into_certificate_source(self) -> CertificateSource {
        *self.certificate_source
    }
}

/// A single scan target.
///
/// Sources are independent of each other, so callers are free to parse them concurrently.
#[derive(Debug)]
pub struct CertificateSource {
    path: PathBuf,
    format: Format,
    records: Vec<CertificateRecord>,
}

impl CertificateSource {
    pub fn new(path: impl Into<PathBuf>, format: Format) -> Self {
        Self {
            path: path.into(),
            format,
            records: Vec::new(),
        }
    }

    pub fn direct_file(path: impl Into<PathBuf>) -> Self {
        Self::new(path, Format::DirectFile)
    }

    pub fn structured_document(
        path: impl Into<PathBuf>,
        expressions: Vec<PathExpressionPair>,
        evaluator: Arc<dyn QueryEvaluator>,
    ) -> Self {
        Self::new(
            path,
            Format::StructuredDocument {
                expressions,
                evaluator,
            },
        )
    }

    /// `path` is only used to identify the source, for example the manifest the Secret was loaded from.
    pub fn cluster_secret(path: impl Into<PathBuf>, secret: Secret) -> Self {
        Self::new(
            path,
            Format::ClusterSecret {
                secret: Box::new(secret),
            },
        )
    }

    /// Reads all certificates from the source.
    ///
    /// Consumes the source, and hands it back with its records populated. On failure the source is
    /// returned inside the [`SourceError`] instead, without any records.
    pub fn parse(mut self) -> Result<Self, SourceError> {
        debug!(source = %self, "Parsing certificate source");
        match self.read() {
            Ok(records) => {
                debug!(source = %self, certificates = records.len(), "Parsed certificate source");
                self.records = records;
                Ok(self)
            }
            Err(error) => Err(error).context(SourceSnafu {
                certificate_source: Box::new(self),
            }),
        }
    }

    fn read(&self) -> Result<Vec<CertificateRecord>, ReadError> {
        Ok(match &self.format {
            Format::DirectFile => file::read(&self.path)?,
            Format::StructuredDocument {
                expressions,
                evaluator,
            } => document::read(&self.path, expressions, evaluator.as_ref())?,
            Format::ClusterSecret { secret } => secret::read(secret)?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> &Format {
        &self.format
    }

    pub fn kind(&self) -> FormatKind {
        FormatKind::from(&self.format)
    }

    pub fn records(&self) -> &[CertificateRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<CertificateRecord> {
        self.records
    }
}

impl Display for CertificateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.format {
            Format::DirectFile => write!(f, "PEM file {:?}", self.path),
            Format::StructuredDocument { .. } => write!(f, "document {:?}", self.path),
            Format::ClusterSecret { secret } => {
                write!(f, "{} from {:?}", secret::object_ref(secret), self.path)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, sync::Arc};

    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use stackable_operator::k8s_openapi::api::core::v1::Secret;

    use super::*;
    use crate::{
        pem::ParseError,
        test_utils::{common_name, pem_bundle, self_signed, FakeEvaluator},
        well_known::kubeconfig_expressions,
    };

    const SECRET_MANIFEST: &str = r#"
---
apiVersion: v1
kind: Secret
metadata:
  name: ingress-tls
  namespace: web
type: kubernetes.io/tls
data:
  tls.key: bm90IGEga2V5
"#;

    #[test]
    fn kubeconfig_cluster_ca_end_to_end() {
        let ca = self_signed("prod-ca");
        let evaluator = FakeEvaluator::default()
            .with_output(
                "clusters.[*].cluster.certificate-authority-data",
                &format!("{}\n", STANDARD.encode(ca.to_pem().unwrap())),
            )
            .with_output("clusters.[*].name", "prod\n");

        let source = CertificateSource::structured_document(
            "/home/user/.kube/config",
            kubeconfig_expressions(),
            Arc::new(evaluator),
        )
        .parse()
        .unwrap();

        assert_eq!(source.kind(), FormatKind::StructuredDocument);
        let records = source.into_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].identity.as_deref(), Some("prod"));
        assert_eq!(
            records[0].source_expression.as_deref(),
            Some("clusters.[*].cluster.certificate-authority-data")
        );
        assert_eq!(
            records[0].certificate.to_der().unwrap(),
            ca.to_der().unwrap()
        );
    }

    #[test]
    fn direct_file_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ca.pem");
        fs::write(&path, pem_bundle(&[self_signed("file-ca")])).unwrap();

        let source = CertificateSource::direct_file(&path).parse().unwrap();

        assert_eq!(source.path(), path);
        assert_eq!(source.records().len(), 1);
        assert_eq!(
            common_name(source.records()[0].certificate.subject_name()),
            "file-ca"
        );
    }

    #[test]
    fn error_carries_source() {
        let err = CertificateSource::direct_file("/nonexistent/ca.pem")
            .parse()
            .unwrap_err();

        assert!(matches!(
            err.reason(),
            ReadError::DirectFile {
                source: file::Error::ReadFile { .. }
            }
        ));
        assert_eq!(err.certificate_source().kind(), FormatKind::DirectFile);
        assert!(err.certificate_source().records().is_empty());
        assert_eq!(
            err.to_string(),
            "failed to read certificates from PEM file \"/nonexistent/ca.pem\""
        );
    }

    #[test]
    fn correlation_mismatch_discards_earlier_records() {
        let evaluator = FakeEvaluator::default()
            .with_output(
                "clusters.[*].cluster.certificate-authority-data",
                &STANDARD.encode(pem_bundle(&[self_signed("prod-ca")])),
            )
            .with_output("clusters.[*].name", "prod\n")
            .with_output(
                "users.[*].user.client-certificate-data",
                &STANDARD.encode(pem_bundle(&[self_signed("a"), self_signed("b")])),
            )
            .with_output("users.[*].name", "admin\n");

        let err = CertificateSource::structured_document(
            "kubeconfig",
            kubeconfig_expressions(),
            Arc::new(evaluator),
        )
        .parse()
        .unwrap_err();

        assert!(matches!(
            err.reason(),
            ReadError::StructuredDocument {
                source: document::Error::CorrelationCountMismatch {
                    identities: 1,
                    certificates: 2,
                    ..
                }
            }
        ));
        assert!(err.into_certificate_source().into_records().is_empty());
    }

    #[test]
    fn cluster_secret_missing_field() {
        let secret: Secret = serde_yaml::from_str(SECRET_MANIFEST).unwrap();

        let err = CertificateSource::cluster_secret("manifests/ingress-tls.yaml", secret)
            .parse()
            .unwrap_err();

        assert!(matches!(
            err.reason(),
            ReadError::ClusterSecret {
                source: secret::Error::MissingField { key: "tls.crt", .. }
            }
        ));
        let message = snafu::Report::from_error(&err).to_string();
        assert!(message.contains("ingress-tls"), "{message}");
        assert!(message.contains("tls.crt"), "{message}");
        assert!(message.contains("manifests/ingress-tls.yaml"), "{message}");
    }

    #[test]
    fn cluster_secret_records() {
        let mut secret: Secret = serde_yaml::from_str(SECRET_MANIFEST).unwrap();
        secret.data.get_or_insert_with(Default::default).insert(
            "tls.crt".to_owned(),
            stackable_operator::k8s_openapi::ByteString(pem_bundle(&[self_signed("ingress")])),
        );

        let source = CertificateSource::cluster_secret("ingress-tls", secret)
            .parse()
            .unwrap();

        assert_eq!(source.kind(), FormatKind::ClusterSecret);
        assert_eq!(
            common_name(source.records()[0].certificate.subject_name()),
            "ingress"
        );
    }

    #[test]
    fn malformed_secret_data_fails_without_records() {
        let secret: Secret = serde_yaml::from_str(&format!(
            "{SECRET_MANIFEST}  tls.crt: {}\n",
            STANDARD.encode("-----BEGIN CERTIFICATE-----\nZm9vYmFy\n-----END CERTIFICATE-----\n")
        ))
        .unwrap();

        let err = CertificateSource::cluster_secret("ingress-tls", secret)
            .parse()
            .unwrap_err();

        assert!(matches!(
            err.reason(),
            ReadError::ClusterSecret {
                source: secret::Error::ParseCertificates {
                    source: ParseError::Malformed { .. },
                    ..
                }
            }
        ));
    }

    #[test]
    fn format_kind_display() {
        assert_eq!(FormatKind::DirectFile.to_string(), "direct-file");
        assert_eq!(
            FormatKind::StructuredDocument.to_string(),
            "structured-document"
        );
        assert_eq!(FormatKind::ClusterSecret.to_string(), "cluster-secret");
    }
}
