//! Error types for ISAPI payload parsing

use thiserror::Error;

/// Errors that can occur while decoding ISAPI XML payloads
///
/// These never escape the stream pipeline: the public `decode_*` helpers turn
/// them into `None` because malformed fragments are routine on the wire.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The payload is not well-formed XML
    #[error("Malformed XML: {0}")]
    MalformedXml(String),

    /// XML deserialization into a typed structure failed
    #[error("XML deserialization failed: {0}")]
    XmlDeserializationFailed(String),

    /// The document root is not the element we expected
    #[error("Unexpected root element: expected {expected}, found {found}")]
    UnexpectedRoot {
        /// Local name of the expected root
        expected: &'static str,
        /// Local name of the root that was found
        found: String,
    },
}

/// Result type alias for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;
