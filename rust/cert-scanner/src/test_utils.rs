use std::{
    collections::HashMap, os::unix::process::ExitStatusExt, path::Path, process::ExitStatus,
    sync::Mutex,
};

use openssl::{
    asn1::{Asn1Integer, Asn1Time},
    bn::{BigNum, MsbOption},
    ec::{EcGroup, EcKey},
    hash::MessageDigest,
    nid::Nid,
    pkey::PKey,
    x509::{X509Builder, X509NameBuilder, X509NameRef, X509},
};

use crate::query::{QueryError, QueryEvaluator};

pub const NOT_BEFORE: i64 = 1_700_000_000;
pub const NOT_AFTER: i64 = NOT_BEFORE + 365 * 24 * 60 * 60;

/// Builds a self-signed certificate with the given common name.
pub fn self_signed(common_name: &str) -> X509 {
    let name = X509NameBuilder::new()
        .and_then(|mut name| {
            name.append_entry_by_nid(Nid::COMMONNAME, common_name)?;
            Ok(name)
        })
        .unwrap()
        .build();
    let key = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1)
        .and_then(|group| EcKey::generate(&group))
        .and_then(PKey::from_ec_key)
        .unwrap();
    X509Builder::new()
        .and_then(|mut x509| {
            x509.set_version(
                3 - 1, // zero-indexed
            )?;
            let mut serial = BigNum::new()?;
            serial.rand(64, MsbOption::MAYBE_ZERO, false)?;
            x509.set_serial_number(Asn1Integer::from_bn(&serial)?.as_ref())?;
            x509.set_subject_name(&name)?;
            x509.set_issuer_name(&name)?;
            x509.set_not_before(Asn1Time::from_unix(NOT_BEFORE)?.as_ref())?;
            x509.set_not_after(Asn1Time::from_unix(NOT_AFTER)?.as_ref())?;
            x509.set_pubkey(&key)?;
            x509.sign(&key, MessageDigest::sha256())?;
            Ok(x509)
        })
        .unwrap()
        .build()
}

/// Concatenates the PEM encodings of `certificates`.
pub fn pem_bundle<'a>(certificates: impl IntoIterator<Item = &'a X509>) -> Vec<u8> {
    certificates
        .into_iter()
        .flat_map(|certificate| certificate.to_pem().unwrap())
        .collect()
}

pub fn common_name(name: &X509NameRef) -> String {
    name.entries_by_nid(Nid::COMMONNAME)
        .next()
        .expect("name has no common name")
        .data()
        .as_utf8()
        .unwrap()
        .to_string()
}

/// In-memory [`QueryEvaluator`] that answers from a fixed table of expressions.
///
/// Unknown expressions evaluate to no matches.
#[derive(Debug, Default)]
pub struct FakeEvaluator {
    outputs: HashMap<String, String>,
    failures: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
}

impl FakeEvaluator {
    pub fn with_output(mut self, expression: &str, output: &str) -> Self {
        self.outputs.insert(expression.to_owned(), output.to_owned());
        self
    }

    pub fn with_failure(mut self, expression: &str, stderr: &str) -> Self {
        self.failures.insert(expression.to_owned(), stderr.to_owned());
        self
    }

    /// Expressions evaluated so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl QueryEvaluator for FakeEvaluator {
    fn evaluate(&self, _document: &Path, expression: &str) -> Result<String, QueryError> {
        self.calls.lock().unwrap().push(expression.to_owned());
        if let Some(stderr) = self.failures.get(expression) {
            return Err(QueryError::Failed {
                program: "fake-yq".into(),
                status: ExitStatus::from_raw(1 << 8),
                stdout: String::new(),
                stderr: stderr.clone(),
            });
        }
        Ok(self.outputs.get(expression).cloned().unwrap_or_default())
    }
}
