//! Convenience accessors for inspecting decoded certificates.

use openssl::{
    asn1::{Asn1Time, Asn1TimeRef, TimeDiff},
    hash::{DigestBytes, MessageDigest},
    string::OpensslString,
    x509::X509Ref,
};
use snafu::{OptionExt, ResultExt, Snafu};
use time::OffsetDateTime;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to convert certificate serial number to BigNum"))]
    ConvertSerialToBigNum { source: openssl::error::ErrorStack },

    #[snafu(display("failed to convert certificate serial number to a hexadecimal string"))]
    ConvertSerialToHexString { source: openssl::error::ErrorStack },

    #[snafu(display("failed to retrieve certificate digest as SHA256"))]
    RetrieveDigest { source: openssl::error::ErrorStack },

    #[snafu(display("failed to convert certificate {bound} to a timestamp"))]
    ConvertValidity {
        source: Asn1TimeParseError,
        bound: &'static str,
    },
}

pub trait CertExt {
    fn serial_as_hex(&self) -> Result<OpensslString, Error>;
    fn sha256_digest(&self) -> Result<DigestBytes, Error>;
    fn not_before_utc(&self) -> Result<OffsetDateTime, Error>;
    fn not_after_utc(&self) -> Result<OffsetDateTime, Error>;
}

impl CertExt for X509Ref {
    fn serial_as_hex(&self) -> Result<OpensslString, Error> {
        self.serial_number()
            .to_bn()
            .context(ConvertSerialToBigNumSnafu)?
            .to_hex_str()
            .context(ConvertSerialToHexStringSnafu)
    }

    fn sha256_digest(&self) -> Result<DigestBytes, Error> {
        self.digest(MessageDigest::sha256())
            .context(RetrieveDigestSnafu)
    }

    fn not_before_utc(&self) -> Result<OffsetDateTime, Error> {
        asn1time_to_offsetdatetime(self.not_before()).context(ConvertValiditySnafu {
            bound: "notBefore",
        })
    }

    fn not_after_utc(&self) -> Result<OffsetDateTime, Error> {
        asn1time_to_offsetdatetime(self.not_after()).context(ConvertValiditySnafu {
            bound: "notAfter",
        })
    }
}

#[derive(Debug, Snafu)]
#[snafu(module)]
pub enum Asn1TimeParseError {
    #[snafu(display("unix epoch is not a valid Asn1Time"))]
    Epoch { source: openssl::error::ErrorStack },

    #[snafu(display("unable to diff Asn1Time"))]
    Diff { source: openssl::error::ErrorStack },

    #[snafu(display("unable to parse as OffsetDateTime"))]
    Parse { source: time::error::ComponentRange },

    #[snafu(display("time overflowed"))]
    Overflow,
}

fn asn1time_to_offsetdatetime(asn: &Asn1TimeRef) -> Result<OffsetDateTime, Asn1TimeParseError> {
    use asn1_time_parse_error::*;
    const SECS_PER_DAY: i64 = 60 * 60 * 24;
    let epoch = Asn1Time::from_unix(0).context(EpochSnafu)?;
    let TimeDiff { days, secs } = epoch.diff(asn).context(DiffSnafu)?;
    OffsetDateTime::from_unix_timestamp(
        i64::from(days)
            .checked_mul(SECS_PER_DAY)
            .and_then(|day_secs| day_secs.checked_add(i64::from(secs)))
            .context(OverflowSnafu)?,
    )
    .context(ParseSnafu)
}
