use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{Parser, Subcommand};
use snafu::ResultExt;
use stackable_cert_scanner::{
    query::{QueryEvaluator, Yq},
    well_known::kubeconfig_expressions,
    CertificateSource, PathExpressionPair,
};
use stackable_operator::k8s_openapi::api::core::v1::Secret;

#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Extract the certificates from PEM files, kubeconfigs and Secret manifests, and log them
    Scan(Scan),
}

#[derive(Parser, Debug)]
pub struct Scan {
    /// List of PEM file(s), each containing one or more certificates
    #[arg(long = "pem")]
    pub pems: Vec<PathBuf>,

    /// List of kubeconfig(s), or other YAML documents that embed or reference certificates
    #[arg(long = "kubeconfig")]
    pub kubeconfigs: Vec<PathBuf>,

    /// List of Kubernetes Secret manifest(s) (YAML), each with a `tls.crt` key
    #[arg(long = "secret")]
    pub secrets: Vec<PathBuf>,

    /// YAML file listing the path expressions to evaluate against each --kubeconfig.
    ///
    /// Each entry has a `certificateExpression`, an `identityExpression` and an `encoding`
    /// (`inline-base64` or `file-reference`). Defaults to the well-known kubeconfig locations.
    #[arg(long)]
    pub expressions: Option<PathBuf>,

    /// The yq (v3) executable used to evaluate path expressions
    #[arg(long, env = "CERT_SCANNER_YQ", default_value = "yq")]
    pub yq: PathBuf,

    /// Abort at the first source that can not be read, rather than skipping it
    #[arg(long)]
    pub fail_fast: bool,
}

impl Scan {
    pub fn certificate_sources(&self) -> Result<Vec<CertificateSource>, snafu::Whatever> {
        let evaluator: Arc<dyn QueryEvaluator> = Arc::new(Yq::new(&self.yq));
        let expressions = match &self.expressions {
            Some(path) => read_expressions(path)?,
            None => kubeconfig_expressions(),
        };

        let mut sources = Vec::new();
        sources.extend(self.pems.iter().map(CertificateSource::direct_file));
        sources.extend(self.kubeconfigs.iter().map(|path| {
            CertificateSource::structured_document(path, expressions.clone(), evaluator.clone())
        }));
        for path in &self.secrets {
            sources.push(CertificateSource::cluster_secret(path, read_secret(path)?));
        }
        Ok(sources)
    }
}

fn read_expressions(path: &Path) -> Result<Vec<PathExpressionPair>, snafu::Whatever> {
    let contents = fs::read_to_string(path)
        .with_whatever_context(|_| format!("failed to read path expressions from {path:?}"))?;
    serde_yaml::from_str(&contents)
        .with_whatever_context(|_| format!("failed to parse path expressions in {path:?}"))
}

fn read_secret(path: &Path) -> Result<Secret, snafu::Whatever> {
    let contents = fs::read_to_string(path)
        .with_whatever_context(|_| format!("failed to read Secret manifest from {path:?}"))?;
    serde_yaml::from_str(&contents)
        .with_whatever_context(|_| format!("failed to parse Secret manifest in {path:?}"))
}
