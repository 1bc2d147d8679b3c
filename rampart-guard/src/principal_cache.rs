//! Principal Info Cache — cached identity lookups for acting principals.
//!
//! Whether an actor is an automated agent, and whether it carries the
//! platform's verified trust flag, changes on the order of days; lookups are
//! cached for a multi-minute TTL so a burst of events from one actor costs a
//! single external round trip.

use rampart_core::providers::IdentityProvider;
use rampart_core::ttl_cache::TtlCache;
use rampart_core::RampartResult;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
struct PrincipalInfo {
    automated: bool,
    verified: bool,
}

pub struct PrincipalInfoCache {
    identity: Arc<dyn IdentityProvider>,
    cache: TtlCache<String, PrincipalInfo>,
}

impl PrincipalInfoCache {
    pub fn new(identity: Arc<dyn IdentityProvider>, ttl_secs: i64) -> Self {
        Self {
            identity,
            cache: TtlCache::new(50_000, ttl_secs),
        }
    }

    fn info_for(&self, actor_id: &str, now: i64) -> RampartResult<PrincipalInfo> {
        if let Some(info) = self.cache.get(&actor_id.to_string(), now) {
            return Ok(info);
        }
        let automated = self.identity.is_automated_agent(actor_id)?;
        // Verification only applies to automated agents; skip the second
        // lookup for humans.
        let verified = automated && self.identity.is_verified_agent(actor_id)?;
        let info = PrincipalInfo { automated, verified };
        self.cache.insert(actor_id.to_string(), info, now);
        Ok(info)
    }

    pub fn is_automated_agent(&self, actor_id: &str, now: i64) -> RampartResult<bool> {
        Ok(self.info_for(actor_id, now)?.automated)
    }

    /// True only for automated agents carrying the verified trust flag.
    pub fn is_verified_agent(&self, actor_id: &str, now: i64) -> RampartResult<bool> {
        let info = self.info_for(actor_id, now)?;
        Ok(info.automated && info.verified)
    }

    pub fn prune_expired(&self, now: i64) -> usize {
        self.cache.prune_expired(now)
    }
}
