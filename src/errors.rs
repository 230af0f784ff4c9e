use thiserror::Error;

/// A grammar violation found while parsing a path or filter string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid path {input:?} at offset {offset}: {message}")]
    Path {
        input: String,
        offset: usize,
        message: String,
    },

    #[error("invalid filter {input:?} at offset {offset}: {message}")]
    Filter {
        input: String,
        offset: usize,
        message: String,
    },
}

impl ParseError {
    pub fn path(input: &str, offset: usize, message: impl Into<String>) -> Self {
        ParseError::Path {
            input: input.to_string(),
            offset,
            message: message.into(),
        }
    }

    pub fn filter(input: &str, offset: usize, message: impl Into<String>) -> Self {
        ParseError::Filter {
            input: input.to_string(),
            offset,
            message: message.into(),
        }
    }

    pub fn offset(&self) -> usize {
        match self {
            ParseError::Path { offset, .. } | ParseError::Filter { offset, .. } => *offset,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ParseError::Path { message, .. } | ParseError::Filter { message, .. } => message,
        }
    }
}

#[derive(Debug, Error)]
pub enum ScimError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The path does not fit the shape of the document.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A remove or replace matched nothing.
    #[error("no target: {0}")]
    NoTarget(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("invalid patch request: {0}")]
    InvalidPatch(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("patch operation {index} ({op} {path:?}) failed: {source}")]
    Operation {
        index: usize,
        op: &'static str,
        path: String,
        #[source]
        source: Box<ScimError>,
    },
}

impl ScimError {
    /// The SCIM `scimType` keyword for this error.
    pub fn scim_type(&self) -> &'static str {
        match self {
            ScimError::Parse(ParseError::Path { .. }) => "invalidPath",
            ScimError::Parse(ParseError::Filter { .. }) => "invalidFilter",
            ScimError::InvalidPath(_) => "invalidPath",
            ScimError::NoTarget(_) => "noTarget",
            ScimError::InvalidValue(_) => "invalidValue",
            ScimError::InvalidPatch(_) | ScimError::Json(_) => "invalidSyntax",
            ScimError::Operation { source, .. } => source.scim_type(),
        }
    }

    /// HTTP status a transport layer should report.
    pub fn status(&self) -> u16 {
        400
    }

    /// True when the error only says that nothing was addressed.
    pub fn is_no_target(&self) -> bool {
        match self {
            ScimError::NoTarget(_) => true,
            ScimError::Operation { source, .. } => source.is_no_target(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScimError>;
