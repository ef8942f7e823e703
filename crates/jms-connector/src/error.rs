use thiserror::Error;

/// A type alias for handling `Result`s with `Error`
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the connector actions and the send coordinator
#[derive(Error, Debug)]
pub enum Error {
    /// The connector was built without its configuration structure, or a
    /// required value is missing. Raised before any client interaction.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The messaging client failed to connect, acquire a session or send.
    #[error("Failed to send message. {message}")]
    SendFailure {
        message: String,
        #[source]
        source: ClientError,
    },

    /// The scope's transaction manager or the XA coordinator rejected a call.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// A typed property or body read failed.
    #[error("Property error: {0}")]
    Property(#[from] PropertyError),
}

impl Error {
    /// Wrap a client failure as a fatal send failure, keeping the cause.
    pub fn send_failure(source: ClientError) -> Self {
        Error::SendFailure {
            message: source.to_string(),
            source,
        }
    }

    /// True if this error came from the messaging client.
    pub fn is_send_failure(&self) -> bool {
        matches!(self, Error::SendFailure { .. })
    }
}

impl From<ClientError> for Error {
    fn from(e: ClientError) -> Self {
        Error::send_failure(e)
    }
}

/// Errors reported across the messaging client boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Connection to the broker could not be established or was lost.
    #[error("{0}")]
    Connection(String),

    /// A session could not be created, committed or rolled back.
    #[error("session error: {0}")]
    Session(String),

    /// The broker refused or failed to accept a message.
    #[error("{0}")]
    Send(String),

    /// The client or session was already closed.
    #[error("client closed")]
    Closed,

    #[error("{0}")]
    Other(String),
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Failures reading a typed value out of a message
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PropertyError {
    #[error("property '{0}' is not set")]
    Missing(String),

    #[error("property '{name}' of type {from} cannot be read as {to}")]
    Conversion {
        name: String,
        from: &'static str,
        to: &'static str,
    },

    #[error("message body is {actual}, expected {expected}")]
    WrongBodyType {
        expected: &'static str,
        actual: &'static str,
    },
}

impl PropertyError {
    /// True if the value was absent rather than unreadable.
    pub fn is_missing(&self) -> bool {
        matches!(self, PropertyError::Missing(_))
    }
}
