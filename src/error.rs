use crate::declaration::Direction;
use crate::filters::FilterStage;
use thiserror::Error;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors. Any of these aborts the generation run; no partial document is produced.
#[derive(Debug, Error)]
pub enum Error {
    /// The options did not name a single marker type
    #[error("no marker types configured; at least one module must be scanned")]
    NoMarkerTypes,

    /// Schema resolution nested deeper than `GeneratorOptions::max_depth`
    #[error("schema resolution for `{type_name}` exceeded the maximum depth of {max_depth}")]
    SchemaDepthExceeded { type_name: String, max_depth: usize },

    /// A filter returned an error; the remaining pipeline was skipped
    #[error("filter `{filter}` failed during the {stage} stage")]
    FilterExecution {
        filter: String,
        stage: FilterStage,
        #[source]
        source: anyhow::Error,
    },

    /// A `$ref` in a document about to be serialized points nowhere
    #[error("reference `{reference}` at {location} does not resolve to a component")]
    DanglingReference { reference: String, location: String },

    /// Input text is not a structurally valid AsyncAPI document
    #[error("malformed AsyncAPI document: {0}")]
    MalformedDocument(String),

    /// A `$ref` in a parsed document points nowhere
    #[error("cannot resolve reference `{reference}` at {location}")]
    SchemaResolution { reference: String, location: String },

    /// Two operations on different channels share an operationId
    #[error("operationId `{operation_id}` is used by both {first} and {second}")]
    DuplicateOperationId {
        operation_id: String,
        first: String,
        second: String,
    },

    /// A server declares a variable its url never mentions
    #[error("server `{server}` declares variable `{variable}` which does not appear in its url")]
    UnknownServerVariable { server: String, variable: String },

    /// A schema identifier was reserved but never finalized
    #[error("schema `{0}` was reserved but never finalized")]
    UnresolvedSchema(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Non-fatal findings, collected and returned next to the generated document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Warning {
    /// One type declared the same operationId twice with incompatible shapes.
    /// Both declarations are dropped.
    #[error("conflicting declarations of operation `{operation_id}` on `{type_name}`: {first} vs {second}")]
    ConflictingDeclaration {
        type_name: String,
        operation_id: String,
        first: String,
        second: String,
    },

    /// Two declarations targeted the same channel and direction; the later one won.
    #[error("{direction} operation on channel `{channel}` from {superseded} was replaced by {winner}")]
    DuplicateOperation {
        channel: String,
        direction: Direction,
        superseded: String,
        winner: String,
    },

    /// Two standalone messages claimed the same component name; the later one won.
    #[error("message `{name}` from {superseded} was replaced by {winner}")]
    DuplicateMessage {
        name: String,
        superseded: String,
        winner: String,
    },
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(format!("JSON: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(format!("YAML: {}", err))
    }
}
