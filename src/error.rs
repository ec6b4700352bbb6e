//! Error types for compiling, locating and rendering views

use std::path::PathBuf;

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

/// Byte range in compiled script text
pub type Span = std::ops::Range<usize>;

/// Errors found while reading compiled script text, before anything executes
#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("syntax error on line {line}: {message}")]
    Syntax {
        span: Span,
        line: usize,
        message: String,
        expected: Vec<String>,
    },

    #[error("unterminated code island starting on line {line}")]
    Unterminated { span: Span, line: usize },

    /// A block keyword with no matching opener, e.g. `endif` outside an `if`
    #[error("unexpected '{found}' on line {line}")]
    Unexpected {
        span: Span,
        line: usize,
        found: String,
    },

    #[error("'{block}' opened on line {line} is never closed")]
    Unclosed {
        span: Span,
        line: usize,
        block: &'static str,
    },
}

impl ScriptError {
    pub fn span(&self) -> &Span {
        match self {
            ScriptError::Syntax { span, .. }
            | ScriptError::Unterminated { span, .. }
            | ScriptError::Unexpected { span, .. }
            | ScriptError::Unclosed { span, .. } => span,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            ScriptError::Syntax { line, .. }
            | ScriptError::Unterminated { line, .. }
            | ScriptError::Unexpected { line, .. }
            | ScriptError::Unclosed { line, .. } => *line,
        }
    }

    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        let headline = self.to_string();
        let label = match self {
            ScriptError::Syntax {
                message, expected, ..
            } if !expected.is_empty() => {
                format!("{}\nExpected: {}", message, expected.join(", "))
            }
            ScriptError::Syntax { message, .. } => message.clone(),
            other => other.to_string(),
        };
        let span = self.span().clone();

        let mut buf = Vec::new();
        let written = Report::build(ReportKind::Error, filename, span.start)
            .with_message(&headline)
            .with_label(
                Label::new((filename, span))
                    .with_message(label)
                    .with_color(Color::Red),
            )
            .finish()
            .write((filename, Source::from(source)), &mut buf);

        match written {
            Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
            Err(_) => headline,
        }
    }
}

/// Errors that can occur while resolving or rendering a view
#[derive(Error, Debug)]
pub enum ViewError {
    /// The finder could not locate a logical name in any search path
    #[error("view [{name}] not found")]
    NotFound { name: String },

    /// Namespaced name with more than one `::` separator
    #[error("view [{name}] has an invalid name")]
    InvalidName { name: String },

    #[error("no hint path defined for [{namespace}]")]
    NoHintPath { namespace: String },

    #[error("no engine is registered for the extension of {}", path.display())]
    UnknownExtension { path: PathBuf },

    #[error("engine [{name}] is not registered")]
    UnknownEngine { name: String },

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Compiled output that the script sandbox could not read
    #[error("failed to parse compiled view {}: {source}", path.display())]
    Script { path: PathBuf, source: ScriptError },

    /// A failure raised while executing a view, tagged with where it happened
    #[error("{source} (view: {}, line {line})", path.display())]
    Evaluation {
        path: PathBuf,
        line: usize,
        source: Box<ViewError>,
    },

    #[error("{message}")]
    Runtime { message: String },

    #[error("cannot stop a section without first starting one")]
    NoOpenSection,

    #[error("failed to parse view configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("failed to convert view data: {0}")]
    Data(#[from] serde_json::Error),
}

impl ViewError {
    /// Create a runtime error with the given message
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    /// Attach a path to an I/O error
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The innermost error, skipping any `Evaluation` wrappers
    pub fn root_cause(&self) -> &ViewError {
        match self {
            ViewError::Evaluation { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
