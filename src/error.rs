use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

// ---------------------------------------------------------------------------
// Load problems – collected across the whole directory before failing
// ---------------------------------------------------------------------------

/// A single problem found while loading a directory.
#[derive(Debug, Clone, PartialEq)]
pub enum Problem {
    /// The file is not a well-formed document.
    Parse {
        file: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },
    /// The document is well-formed but breaks a field contract or invariant.
    /// `files` holds more than one path for cross-file problems such as
    /// duplicate record names.
    Schema {
        files: Vec<PathBuf>,
        field: String,
        message: String,
    },
}

impl Problem {
    pub(crate) fn schema(
        file: impl Into<PathBuf>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Problem::Schema {
            files: vec![file.into()],
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, Problem::Parse { .. })
    }

    pub fn is_schema(&self) -> bool {
        matches!(self, Problem::Schema { .. })
    }

    /// Every file this problem refers to.
    pub fn files(&self) -> &[PathBuf] {
        match self {
            Problem::Parse { file, .. } => std::slice::from_ref(file),
            Problem::Schema { files, .. } => files,
        }
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Problem::Parse {
                file,
                line,
                column,
                message,
            } => write!(
                f,
                "parse error in {} at {line}:{column}: {message}",
                file.display()
            ),
            Problem::Schema {
                files,
                field,
                message,
            } => {
                let files: Vec<String> = files.iter().map(|p| p.display().to_string()).collect();
                write!(f, "schema error in {} at `{field}`: {message}", files.join(", "))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum Error {
    /// The load failed; every problem found in the directory is listed.
    #[error("{} problem(s) found while loading reference data:\n{}", .0.len(), render_problems(.0))]
    Invalid(Vec<Problem>),

    /// A zone-keyed value, record, or series was asked for but is absent.
    #[error("lookup failed for {what}: {reason}")]
    Lookup { what: String, reason: String },

    /// A time-series lookup fell outside the tabulated years.
    #[error("year {year} is outside the tabulated range {first}..={last} for {series}")]
    Range {
        series: String,
        year: i32,
        first: i32,
        last: i32,
    },

    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid options file {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },
}

impl Error {
    /// The aggregated problems of a failed load, empty for other errors.
    pub fn problems(&self) -> &[Problem] {
        match self {
            Error::Invalid(problems) => problems,
            _ => &[],
        }
    }
}

fn render_problems(problems: &[Problem]) -> String {
    problems
        .iter()
        .map(|p| format!("  - {p}"))
        .collect::<Vec<_>>()
        .join("\n")
}
