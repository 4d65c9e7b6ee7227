//! Error types for the cache facade.

use std::fmt;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the cache facade.
///
/// Read-path operations (`get`, `has`, `get_multiple`) never surface these:
/// a backend or decode failure there is reported as a miss. Everything that
/// writes, deletes or resolves a driver returns one of the variants below.
#[derive(Debug, Clone)]
pub enum Error {
    /// Driver construction failed: driver disabled, missing backend handle,
    /// or unusable settings.
    ///
    /// **Recovery:** Fix configuration and restart. Never retried.
    ConfigError(String),

    /// `Manager::driver` was asked for a name that is not registered.
    DriverNotFound(String),

    /// A mutating registry operation found no usable default driver.
    ///
    /// Raised both when no default name was ever set and when the default
    /// name does not resolve to a registered driver.
    NoDefaultDriver,

    /// A value could not be encoded by the driver's codec.
    ///
    /// Common causes:
    /// - Non-finite float (NaN, infinity) under a structured codec
    /// - Codec-level failure (buffer, nesting limit)
    SerializationError(String),

    /// Stored bytes could not be decoded back into a value.
    ///
    /// Only observable through the codec API; drivers turn it into a miss.
    DeserializationError(String),

    /// Native entry header is invalid (bad magic or truncated envelope).
    InvalidCacheEntry(String),

    /// Native entry was written under a different schema version.
    VersionMismatch {
        /// Expected schema version (from compiled code)
        expected: u32,
        /// Found schema version (from cached entry)
        found: u32,
    },

    /// Backend failure, message preserved verbatim.
    ///
    /// Common causes:
    /// - Connection lost or pool exhausted
    /// - Network timeout
    /// - Filesystem I/O failure
    ///
    /// Not retried by this crate.
    BackendError(String),

    /// One or more drivers failed to close; every driver was still attempted.
    CloseFailed(Vec<(String, Error)>),

    /// Generic error with custom message.
    Other(String),
}

impl Error {
    /// True for the variants produced by a codec.
    pub fn is_serialization(&self) -> bool {
        matches!(
            self,
            Error::SerializationError(_)
                | Error::DeserializationError(_)
                | Error::InvalidCacheEntry(_)
                | Error::VersionMismatch { .. }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
            Error::DriverNotFound(name) => write!(f, "driver '{}' not found", name),
            Error::NoDefaultDriver => write!(f, "no default cache driver set"),
            Error::SerializationError(msg) => {
                write!(f, "could not serialize value: {}", msg)
            }
            Error::DeserializationError(msg) => {
                write!(f, "could not deserialize value: {}", msg)
            }
            Error::InvalidCacheEntry(msg) => write!(f, "Invalid cache entry: {}", msg),
            Error::VersionMismatch { expected, found } => {
                write!(
                    f,
                    "Cache version mismatch: expected {}, found {}",
                    expected, found
                )
            }
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::CloseFailed(failures) => {
                write!(f, "failed to close {} driver(s): ", failures.len())?;
                for (i, (name, err)) in failures.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{}: {}", name, err)?;
                }
                Ok(())
            }
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            Error::BackendError(e.to_string())
        } else if e.is_syntax() || e.is_eof() || e.is_data() {
            Error::DeserializationError(e.to_string())
        } else {
            Error::SerializationError(e.to_string())
        }
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Error::SerializationError(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Error::DeserializationError(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::BackendError(e.to_string())
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Other(e)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Other(e.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<deadpool_redis::redis::RedisError> for Error {
    fn from(e: deadpool_redis::redis::RedisError) -> Self {
        Error::BackendError(format!("Redis error: {}", e))
    }
}

#[cfg(feature = "document")]
impl From<mongodb::error::Error> for Error {
    fn from(e: mongodb::error::Error) -> Self {
        Error::BackendError(format!("MongoDB error: {}", e))
    }
}
