use serde::{Deserialize, Serialize};

use crate::timestamp::Timestamp;

/// Isolation scope for packages, repositories, and builds (§3 Tenant,
/// GLOSSARY "Tenant"). The empty string is single-tenant mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub private: bool,
    pub interactive: Option<String>,
    pub created_at: Timestamp,
    pub archived: bool,
    pub service: Option<TenantService>,
    pub queued_at: Option<Timestamp>,
    pub toolchain: Option<BuildToolchain>,
    pub unloaded_at: Option<Timestamp>,
}

impl Tenant {
    pub fn new_loader_tenant(id: String, private: bool, interactive: Option<String>) -> Self {
        Tenant {
            id,
            private,
            interactive,
            created_at: Timestamp::now(),
            archived: false,
            service: None,
            queued_at: None,
            toolchain: None,
            unloaded_at: None,
        }
    }

    /// Whether this tenant is an "unloaded" CI tenant (GLOSSARY
    /// "Unloaded tenant"): created via CI `create` but not yet walked
    /// by the loader.
    pub fn is_unloaded(&self) -> bool {
        self.unloaded_at.is_some()
    }

    /// Whether this tenant carries an `interactive` login template
    /// (GLOSSARY "Interactive tenant").
    pub fn is_interactive(&self) -> bool {
        self.interactive.is_some()
    }

    /// §5 "Cross-request ordering": new tasks may not be issued from
    /// this tenant until `queued_at + notify_expiration` has passed.
    pub fn queued_notification_suppressed(&self, now: Timestamp, expiration: crate::Duration) -> bool {
        match self.queued_at {
            Some(q) => !q.is_older_than(now, expiration),
            None => false,
        }
    }

    /// §3.1: stash the build toolchain the first time a package from
    /// this tenant is considered but no configuration is picked, so the
    /// unbuilt-configurations list can disambiguate "nothing left" from
    /// "not enough information yet".
    pub fn stash_toolchain_if_absent(&mut self, toolchain: BuildToolchain) {
        if self.toolchain.is_none() {
            self.toolchain = Some(toolchain);
        }
    }
}

/// `{type, id, data?, ref_count}` — opaque payload maintained by
/// callback owners (§3 "Tenant service").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantService {
    #[serde(rename = "type")]
    pub service_type: String,
    pub id: String,
    pub data: Option<serde_json::Value>,
    pub ref_count: u32,
}

impl TenantService {
    pub fn new(service_type: String, id: String, data: Option<serde_json::Value>) -> Self {
        TenantService {
            service_type,
            id,
            data,
            ref_count: 1,
        }
    }

    pub fn key(&self) -> (&str, &str) {
        (self.service_type.as_str(), self.id.as_str())
    }
}

/// Build toolchain stashed on a tenant (§3.1), `(name, version)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildToolchain {
    pub name: String,
    pub version: String,
}

/// Controls behavior when a CI `create` call collides on
/// `(service.type, service.id)` with an existing tenant (§4.4 "Create
/// unloaded tenant").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateTenantMode {
    Fail,
    Ignore,
    Replace,
    ReplaceArchived,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_tenant_queued_notification_not_suppressed() {
        let t = Tenant::new_loader_tenant(String::new(), false, None);
        assert!(!t.queued_notification_suppressed(Timestamp::now(), crate::Duration::from_secs(60)));
    }

    #[test]
    fn recent_queued_at_suppresses_notification() {
        let mut t = Tenant::new_loader_tenant(String::new(), false, None);
        let now = Timestamp::now();
        t.queued_at = Some(now);
        assert!(t.queued_notification_suppressed(now, crate::Duration::from_secs(60)));
    }

    #[test]
    fn stash_toolchain_is_first_write_wins() {
        let mut t = Tenant::new_loader_tenant(String::new(), false, None);
        t.stash_toolchain_if_absent(BuildToolchain { name: "gcc".into(), version: "13".into() });
        t.stash_toolchain_if_absent(BuildToolchain { name: "clang".into(), version: "17".into() });
        assert_eq!(t.toolchain.unwrap().name, "gcc");
    }
}
