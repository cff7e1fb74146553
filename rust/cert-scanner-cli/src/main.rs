use clap::Parser;
use cli_args::{Cli, CliCommand, Scan};
use snafu::{ensure_whatever, ResultExt};
use stackable_cert_scanner::{cert_ext::CertExt, CertificateRecord, CertificateSource};
use tracing::{info, level_filters::LevelFilter, warn};

mod cli_args;

#[snafu::report]
pub fn main() -> Result<(), snafu::Whatever> {
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()
        .whatever_context("failed to create tracing subscriber EnvFilter")?;
    tracing_subscriber::fmt()
        // Short running tool does not need any complex output
        .with_target(false)
        .without_time()
        .with_env_filter(filter)
        .init();

    let cli = Cli::parse();

    match cli.command {
        CliCommand::Scan(cli_args) => scan(cli_args)?,
    }

    Ok(())
}

fn scan(cli_args: Scan) -> Result<(), snafu::Whatever> {
    let certificate_sources = cli_args.certificate_sources()?;
    ensure_whatever!(
        !certificate_sources.is_empty(),
        "The list of certificate sources can not be empty. Please provide at least one --pem, --kubeconfig or --secret."
    );

    let total = certificate_sources.len();
    let mut failed = 0;
    for source in certificate_sources {
        info!(%source, format = %source.kind(), "Scanning certificate source");
        match source.parse() {
            Ok(source) => {
                for record in source.records() {
                    log_record(&source, record)?;
                }
            }
            Err(err) if cli_args.fail_fast => {
                return Err(err).whatever_context("aborting scan after first failed source");
            }
            Err(err) => {
                warn!(
                    error = %snafu::Report::from_error(&err),
                    "Skipped certificate source that could not be read"
                );
                failed += 1;
            }
        }
    }

    ensure_whatever!(
        failed == 0,
        "{failed} of {total} certificate sources could not be read"
    );
    Ok(())
}

fn log_record(
    source: &CertificateSource,
    record: &CertificateRecord,
) -> Result<(), snafu::Whatever> {
    let certificate = &record.certificate;
    let serial = certificate
        .serial_as_hex()
        .whatever_context("failed to read certificate serial number")?;
    let sha256 = certificate
        .sha256_digest()
        .whatever_context("failed to fingerprint certificate")?;
    let not_before = certificate
        .not_before_utc()
        .whatever_context("failed to read certificate validity")?;
    let not_after = certificate
        .not_after_utc()
        .whatever_context("failed to read certificate validity")?;

    info!(
        %source,
        identity = ?record.identity,
        expression = ?record.source_expression,
        subject = ?certificate.subject_name(),
        issuer = ?certificate.issuer_name(),
        serial = %serial,
        sha256 = hex::encode(sha256),
        %not_before,
        %not_after,
        "Found certificate"
    );
    Ok(())
}
