use thiserror::Error;

/// Error type for the signing pipeline.
///
/// Every stage fails fast; no variant is retried. A failure anywhere before
/// assembly leaves the caller's document untouched.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Canonicalization error: {0}")]
    Canonicalization(String),

    #[error("Unsupported transform: {0}")]
    Transform(String),

    #[error("Unsupported digest algorithm: {0}")]
    Digest(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Insertion error: {0}")]
    Insertion(String),

    #[error("XML processing error: {0}")]
    Xml(String),

    #[error("Crypto error: {0}")]
    Crypto(#[from] crate::crypto::Error),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err.to_string())
    }
}

impl From<quick_xml::SeError> for Error {
    fn from(err: quick_xml::SeError) -> Self {
        Error::Xml(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::Xml(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Xml(err.to_string())
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Error::Utf8(err.utf8_error())
    }
}
