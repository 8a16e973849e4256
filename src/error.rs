use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure categories shared by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Connection,
    Directory,
    Transfer,
    Deletion,
    Listing,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("directory error: {message}")]
    Directory {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("transfer error: {message}")]
    Transfer {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("deletion error: {message}")]
    Deletion {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("listing error: {message}")]
    Listing {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    pub fn directory(message: impl Into<String>) -> Self {
        Self::Directory {
            message: message.into(),
            source: None,
        }
    }

    pub fn transfer(message: impl Into<String>) -> Self {
        Self::Transfer {
            message: message.into(),
            source: None,
        }
    }

    pub fn deletion(message: impl Into<String>) -> Self {
        Self::Deletion {
            message: message.into(),
            source: None,
        }
    }

    pub fn listing(message: impl Into<String>) -> Self {
        Self::Listing {
            message: message.into(),
            source: None,
        }
    }

    /// Attaches the backend-native failure that caused this error.
    ///
    /// Configuration errors never originate from a backend, so the cause is
    /// dropped for them.
    #[must_use]
    pub fn caused_by<E>(mut self, cause: E) -> Self
    where
        E: Into<BoxError>,
    {
        match &mut self {
            Self::Configuration(_) => {}
            Self::Connection { source, .. }
            | Self::Directory { source, .. }
            | Self::Transfer { source, .. }
            | Self::Deletion { source, .. }
            | Self::Listing { source, .. } => *source = Some(cause.into()),
        }
        self
    }

    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Directory { .. } => ErrorKind::Directory,
            Self::Transfer { .. } => ErrorKind::Transfer,
            Self::Deletion { .. } => ErrorKind::Deletion,
            Self::Listing { .. } => ErrorKind::Listing,
        }
    }
}
