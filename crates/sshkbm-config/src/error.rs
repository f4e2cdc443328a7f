use miette::Diagnostic;
use thiserror::Error;

/// Line/column position of a node in the configuration source (1-indexed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
    pub len: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize, offset: usize, len: usize) -> Self {
        Self {
            line,
            column,
            offset,
            len,
        }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("Failed to parse KDL")]
    #[diagnostic(code(sshkbm::config::parse_error))]
    ParseError {
        #[source_code]
        src: String,
        #[label("here")]
        span: miette::SourceSpan,
        #[source]
        source: kdl::KdlError,
    },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(sshkbm::config::invalid))]
    Invalid { message: String },

    #[error("Invalid value for `{node}` at {location}: {message}")]
    #[diagnostic(code(sshkbm::config::invalid_value))]
    InvalidValue {
        node: String,
        message: String,
        location: SourceLocation,
    },

    #[error("Unknown modifier: {name}")]
    #[diagnostic(
        code(sshkbm::config::unknown_modifier),
        help("expected one of: Compose, Ctrl, Shift, Alt, Super, AltGr")
    )]
    UnknownModifier { name: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
