//! Evaluation of path expressions against structured documents.
//!
//! The certificate scanner does not interpret expressions like
//! `clusters.[*].cluster.certificate-authority-data` itself, it delegates them to a
//! [`QueryEvaluator`]. [`Yq`] is the production implementation, which shells out to `yq`.

use std::{
    fmt::Debug,
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Stdio},
    string::FromUtf8Error,
};

use snafu::{ResultExt, Snafu};

/// The `yq` subcommand for reading values (`yq r <document> <expression>`).
const READ_MODE: &str = "r";

#[derive(Debug, Snafu)]
pub enum QueryError {
    #[snafu(display("failed to start query evaluator {program:?}"))]
    Spawn {
        source: std::io::Error,
        program: PathBuf,
    },

    #[snafu(display(
        "query evaluator {program:?} failed with {status}, stderr: {stderr}, stdout: {stdout}"
    ))]
    Failed {
        program: PathBuf,
        status: ExitStatus,
        stdout: String,
        stderr: String,
    },

    #[snafu(display("query evaluator {program:?} produced output that is not valid UTF-8"))]
    InvalidOutput {
        source: FromUtf8Error,
        program: PathBuf,
    },
}

pub trait QueryEvaluator: Debug + Send + Sync {
    /// Returns the raw text matched by `expression` in `document`.
    ///
    /// Multiple matches are returned one per line. No matches are returned as an empty (or
    /// whitespace-only) string, rather than as an error.
    fn evaluate(&self, document: &Path, expression: &str) -> Result<String, QueryError>;
}

/// Evaluates expressions by running `yq` (v3 syntax).
#[derive(Debug, Clone)]
pub struct Yq {
    program: PathBuf,
}

impl Yq {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for Yq {
    fn default() -> Self {
        Self::new("yq")
    }
}

impl QueryEvaluator for Yq {
    fn evaluate(&self, document: &Path, expression: &str) -> Result<String, QueryError> {
        let program = &self.program;
        tracing::trace!(?program, ?document, expression, "Running query evaluator");
        let output = Command::new(program)
            .arg(READ_MODE)
            .arg(document)
            .arg(expression)
            .stdin(Stdio::null())
            .output()
            .context(SpawnSnafu { program })?;
        if !output.status.success() {
            return FailedSnafu {
                program,
                status: output.status,
                stdout: String::from_utf8_lossy(&output.stdout),
                stderr: String::from_utf8_lossy(&output.stderr),
            }
            .fail();
        }
        String::from_utf8(output.stdout).context(InvalidOutputSnafu { program })
    }
}
