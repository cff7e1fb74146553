//! Reads certificates from Kubernetes TLS Secrets.

use snafu::{OptionExt, ResultExt, Snafu};
use stackable_operator::{
    k8s_openapi::{api::core::v1::Secret, ByteString},
    kube::runtime::reflector::ObjectRef,
};
use tracing::debug;

use super::CertificateRecord;
use crate::pem;

/// The key of a `kubernetes.io/tls` Secret that holds the certificate chain.
pub const TLS_CERTIFICATE_KEY: &str = "tls.crt";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("secret {secret} has no key {key:?}"))]
    MissingField {
        secret: ObjectRef<Secret>,
        key: &'static str,
    },

    #[snafu(display("failed to parse certificates from key {key:?} of {secret}"))]
    ParseCertificates {
        source: pem::ParseError,
        secret: ObjectRef<Secret>,
        key: &'static str,
    },
}

#[tracing::instrument(skip(secret), fields(secret = %object_ref(secret)))]
pub fn read(secret: &Secret) -> Result<Vec<CertificateRecord>, Error> {
    let secret_ref = || object_ref(secret);
    let ByteString(certificate_pem) = secret
        .data
        .as_ref()
        .and_then(|data| data.get(TLS_CERTIFICATE_KEY))
        .with_context(|| MissingFieldSnafu {
            secret: secret_ref(),
            key: TLS_CERTIFICATE_KEY,
        })?;
    let certificates = pem::decode(certificate_pem)
        .with_context(|_| ParseCertificatesSnafu {
            secret: secret_ref(),
            key: TLS_CERTIFICATE_KEY,
        })?
        .certificates;
    debug!(
        key = TLS_CERTIFICATE_KEY,
        certificates = certificates.len(),
        "Read certificates from secret"
    );
    Ok(certificates
        .into_iter()
        .map(CertificateRecord::uncorrelated)
        .collect())
}

pub(crate) fn object_ref(secret: &Secret) -> ObjectRef<Secret> {
    let secret_ref = ObjectRef::new(secret.metadata.name.as_deref().unwrap_or_default());
    match &secret.metadata.namespace {
        Some(namespace) => secret_ref.within(namespace),
        None => secret_ref,
    }
}
