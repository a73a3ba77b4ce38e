pub use strata_types::error::{ClResult, Error};
pub use strata_types::types::{Timestamp, UserId, WorkspaceId};

pub use tracing::{debug, error, info, warn};

// vim: ts=4
