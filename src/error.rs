use benfy_codegen::CodegenError;
use benfy_model::{Diagnostic, ParseError, Report};
use std::path::PathBuf;
use thiserror::Error;

/// Failure of one pipeline stage.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read grammar file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("grammar text has {} blocking finding(s)", blocking_count(.0))]
    Lint(Vec<Diagnostic>),
    #[error(transparent)]
    Syntax(#[from] ParseError),
    #[error("grammar has {} reference error(s)", .0.errors.len())]
    Validation(Report),
    #[error(transparent)]
    Codegen(#[from] CodegenError),
}

fn blocking_count(findings: &[Diagnostic]) -> usize {
    findings.iter().filter(|d| d.is_error()).count()
}

impl Error {
    /// Every diagnostic carried by this error, for display by a caller.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Error::Lint(findings) => findings,
            Error::Validation(report) => &report.errors,
            _ => &[],
        }
    }
}
