//! Monitor-facing stalled-notification read model (§4.5): "for every
//! tenant with a registered service, how long has its oldest
//! un-notified queued build been waiting" — a pure function over
//! already-loaded tenant rows, plus a thin orchestration wrapper that
//! loads them.

use serde::Serialize;

use repoctl_types::{Duration, Tenant, Timestamp};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StalledTenant {
    pub tenant_id: String,
    pub service_type: String,
    pub service_id: String,
    pub waiting: Duration,
}

/// Every serviced tenant whose `queued_at` is older than
/// `notify_interval`, oldest first.
pub fn find_stalled(tenants: &[Tenant], now: Timestamp, notify_interval: Duration) -> Vec<StalledTenant> {
    let mut stalled: Vec<StalledTenant> = tenants
        .iter()
        .filter_map(|t| {
            let service = t.service.as_ref()?;
            let queued_at = t.queued_at?;
            if !queued_at.is_older_than(now, notify_interval) {
                return None;
            }
            Some(StalledTenant {
                tenant_id: t.id.clone(),
                service_type: service.service_type.clone(),
                service_id: service.id.clone(),
                waiting: Duration {
                    as_nanos: now.as_nanos().saturating_sub(queued_at.as_nanos()),
                },
            })
        })
        .collect();
    stalled.sort_by(|a, b| b.waiting.as_nanos.cmp(&a.waiting.as_nanos));
    stalled
}

/// Loads every live serviced tenant and applies `find_stalled`.
pub async fn stalled_notifications(
    pool: &sqlx::PgPool,
    now: Timestamp,
    notify_interval: Duration,
) -> sqlx::Result<Vec<StalledTenant>> {
    let tenants = repoctl_db::tenant::list_serviced_tenants(pool).await?;
    Ok(find_stalled(&tenants, now, notify_interval))
}

#[cfg(test)]
mod tests {
    use super::*;
    use repoctl_types::TenantService;

    fn serviced_tenant(id: &str, queued_at: Option<Timestamp>) -> Tenant {
        Tenant {
            id: id.into(),
            private: false,
            interactive: None,
            created_at: Timestamp::from_nanos(0),
            archived: false,
            service: Some(TenantService::new("github".into(), id.into(), None)),
            queued_at,
            toolchain: None,
            unloaded_at: None,
        }
    }

    #[test]
    fn tenant_without_service_is_never_stalled() {
        let mut t = serviced_tenant("t1", Some(Timestamp::from_nanos(0)));
        t.service = None;
        let stalled = find_stalled(&[t], Timestamp::from_nanos(1_000_000_000), Duration::from_secs(1));
        assert!(stalled.is_empty());
    }

    #[test]
    fn fresh_queued_at_is_not_stalled() {
        let t = serviced_tenant("t1", Some(Timestamp::from_nanos(0)));
        let stalled = find_stalled(&[t], Timestamp::from_nanos(500_000_000), Duration::from_secs(1));
        assert!(stalled.is_empty());
    }

    #[test]
    fn old_queued_at_is_reported_with_wait_time() {
        let t = serviced_tenant("t1", Some(Timestamp::from_nanos(0)));
        let now = Timestamp::from_nanos(5_000_000_000);
        let stalled = find_stalled(&[t], now, Duration::from_secs(1));
        assert_eq!(stalled.len(), 1);
        assert_eq!(stalled[0].tenant_id, "t1");
        assert_eq!(stalled[0].waiting, Duration::from_secs(5));
    }

    #[test]
    fn results_are_sorted_oldest_first() {
        let a = serviced_tenant("a", Some(Timestamp::from_nanos(0)));
        let b = serviced_tenant("b", Some(Timestamp::from_nanos(3_000_000_000)));
        let now = Timestamp::from_nanos(10_000_000_000);
        let stalled = find_stalled(&[a, b], now, Duration::from_secs(1));
        assert_eq!(stalled.iter().map(|s| s.tenant_id.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
