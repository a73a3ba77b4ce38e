//! Common types used throughout Strata.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

// Timestamp //
//***********//
/// Unix timestamp in seconds
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub i64);

impl Timestamp {
	pub fn now() -> Timestamp {
		let res = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
		Timestamp(i64::try_from(res.as_secs()).unwrap_or(i64::MAX))
	}

	pub fn add_seconds(self, secs: i64) -> Timestamp {
		Timestamp(self.0.saturating_add(secs))
	}
}

impl std::fmt::Display for Timestamp {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl Serialize for Timestamp {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		serializer.serialize_i64(self.0)
	}
}

impl<'de> Deserialize<'de> for Timestamp {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		Ok(Timestamp(i64::deserialize(deserializer)?))
	}
}

// Opaque ids //
//************//
/// Opaque workspace identifier supplied by the caller
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceId(pub Box<str>);

/// Opaque user identifier supplied by the caller
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Box<str>);

macro_rules! opaque_id {
	($ty:ident) => {
		impl $ty {
			pub fn as_str(&self) -> &str {
				&self.0
			}
		}

		impl std::fmt::Display for $ty {
			fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				f.write_str(&self.0)
			}
		}

		impl From<&str> for $ty {
			fn from(id: &str) -> Self {
				$ty(id.into())
			}
		}

		impl From<String> for $ty {
			fn from(id: String) -> Self {
				$ty(id.into_boxed_str())
			}
		}
	};
}

opaque_id!(WorkspaceId);
opaque_id!(UserId);

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_timestamp_ordering() {
		let a = Timestamp(10);
		assert!(a.add_seconds(5) > a);
		assert_eq!(a.add_seconds(-10), Timestamp(0));
		assert_eq!(Timestamp(i64::MAX).add_seconds(1), Timestamp(i64::MAX));
	}

	#[test]
	fn test_ids_serialize_transparently() {
		let ws = WorkspaceId::from("ws-1");
		assert_eq!(serde_json::to_string(&ws).unwrap(), "\"ws-1\"");
		let user: UserId = serde_json::from_str("\"alice\"").unwrap();
		assert_eq!(user.as_str(), "alice");
		assert_eq!(user.to_string(), "alice");
	}
}

// vim: ts=4
