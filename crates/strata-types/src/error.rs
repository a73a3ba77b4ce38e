//! Error type shared by every Strata crate

use std::fmt;

pub type ClResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	NotFound,
	/// Persistence adapter failure
	DbError,
	/// Scope and workspace/user ids do not match the scope rules
	InvalidScopeCombination(String),
	/// Operation not permitted on the addressed row (e.g. deleting a System setting)
	InvalidOperation(String),
	ValidationError(String),
	ConfigError(String),

	// Cache registry
	DuplicateKeyRegistration(String),
	UnknownCacheKey(String),
	CacheTypeMismatch {
		key: String,
		expected: &'static str,
		requested: &'static str,
	},
	/// Refresh failed and no previously loaded value exists
	RefreshFailed {
		key: String,
		reason: String,
	},
	/// Refresh was cancelled and no previously loaded value exists
	Cancelled(String),
	/// Entry was disposed at shutdown
	Disposed(String),

	Internal(String),

	// externals
	Io(std::io::Error),
	Parse(String),
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Error::NotFound => write!(f, "not found"),
			Error::DbError => write!(f, "database error"),
			Error::InvalidScopeCombination(msg) => write!(f, "invalid scope combination: {}", msg),
			Error::InvalidOperation(msg) => write!(f, "invalid operation: {}", msg),
			Error::ValidationError(msg) => write!(f, "validation error: {}", msg),
			Error::ConfigError(msg) => write!(f, "configuration error: {}", msg),
			Error::DuplicateKeyRegistration(key) => {
				write!(f, "cache key '{}' is already registered", key)
			}
			Error::UnknownCacheKey(key) => write!(f, "unknown cache key '{}'", key),
			Error::CacheTypeMismatch { key, expected, requested } => write!(
				f,
				"cache key '{}' holds {}, requested as {}",
				key, expected, requested
			),
			Error::RefreshFailed { key, reason } => {
				write!(f, "refresh of '{}' failed: {}", key, reason)
			}
			Error::Cancelled(key) => write!(f, "refresh of '{}' was cancelled", key),
			Error::Disposed(key) => write!(f, "cache entry '{}' is disposed", key),
			Error::Internal(msg) => write!(f, "internal error: {}", msg),
			Error::Io(err) => write!(f, "I/O error: {}", err),
			Error::Parse(msg) => write!(f, "parse error: {}", msg),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Error::Io(err) => Some(err),
			_ => None,
		}
	}
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Self::Io(err)
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Self::Parse(err.to_string())
	}
}

// vim: ts=4
