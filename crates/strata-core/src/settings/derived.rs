//! Effective settings as a cache source

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::resolver::{CascadeResolver, EffectiveSetting};
use crate::cache::{CacheSource, RefreshPolicy};
use crate::prelude::*;

pub type EffectiveSettings = Arc<HashMap<String, EffectiveSetting>>;

/// Every effective setting of one user, resolved on refresh
#[derive(Debug)]
pub struct EffectiveSettingsSource {
	key: String,
	resolver: CascadeResolver,
	workspace_id: WorkspaceId,
	user_id: UserId,
	ttl: Option<Duration>,
	policy: RefreshPolicy,
}

impl EffectiveSettingsSource {
	pub fn new(
		key: impl Into<String>,
		resolver: CascadeResolver,
		workspace_id: &WorkspaceId,
		user_id: &UserId,
	) -> Self {
		Self {
			key: key.into(),
			resolver,
			workspace_id: workspace_id.clone(),
			user_id: user_id.clone(),
			ttl: None,
			policy: RefreshPolicy::Blocking,
		}
	}

	pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
		self.ttl = ttl;
		self
	}

	pub fn with_policy(mut self, policy: RefreshPolicy) -> Self {
		self.policy = policy;
		self
	}
}

#[async_trait]
impl CacheSource for EffectiveSettingsSource {
	type Value = EffectiveSettings;

	fn key(&self) -> &str {
		&self.key
	}

	fn ttl(&self) -> Option<Duration> {
		self.ttl
	}

	fn policy(&self) -> RefreshPolicy {
		self.policy
	}

	async fn refresh(&self, _cancel: &CancellationToken) -> ClResult<EffectiveSettings> {
		let settings = self.resolver.get_effective_all(&self.workspace_id, &self.user_id).await?;
		debug!(
			"Resolved {} settings for {}/{} into '{}'",
			settings.len(),
			self.workspace_id,
			self.user_id,
			self.key
		);
		Ok(Arc::new(settings))
	}
}

// vim: ts=4
