use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Missing file, unparsable file, or a required field left empty
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport failure, timeout, unexpected status or malformed body
    #[error("network error: {0}")]
    Network(String),

    /// The provider rejected the credential (HTTP 401/403)
    #[error("authentication failed: {0}")]
    Auth(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }
}
