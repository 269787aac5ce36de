//! Tenant-service notification sequencing (§4.2 "Tenant-service
//! notifications": queued then building). Delivery goes through
//! `repoctl_webhook::ServiceClient` synchronously, because the
//! scheduler needs the callback's replacement service data before its
//! transaction commits (§5).

use repoctl_types::{BuildState, Tenant, Timestamp};
use repoctl_webhook::{NotifiedBuild, ServiceCallback, ServiceClient};

/// Deliver `callback` for `tenant` if a tenant service is registered,
/// returning any replacement service data to persist. No-op when the
/// tenant has no service or no client is configured for it.
pub fn notify_if_registered(
    client: Option<&ServiceClient>,
    tenant: &Tenant,
    callback: ServiceCallback,
    now: Timestamp,
    builds: &[NotifiedBuild],
    state: Option<BuildState>,
) -> anyhow::Result<Option<serde_json::Value>> {
    let (Some(client), Some(service)) = (client, tenant.service.as_ref()) else {
        return Ok(None);
    };
    let response = client.notify(callback, &tenant.id, now, builds, state, service.data.clone())?;
    Ok(response.service_data)
}

/// §4.2 "queued then building": the two notifications a freshly
/// selected build fires, in order, short-circuiting on the first
/// failure so `building` is never sent without `queued` having
/// succeeded.
pub fn notify_queued_then_building(
    client: Option<&ServiceClient>,
    tenant: &Tenant,
    now: Timestamp,
    builds: &[NotifiedBuild],
) -> anyhow::Result<(Option<serde_json::Value>, Option<serde_json::Value>)> {
    let queued_data = notify_if_registered(client, tenant, ServiceCallback::Queued, now, builds, None)?;
    let building_data =
        notify_if_registered(client, tenant, ServiceCallback::Building, now, builds, None)?;
    Ok((queued_data, building_data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_client_configured_is_a_no_op() {
        let tenant = Tenant::new_loader_tenant(String::new(), false, None);
        let result = notify_if_registered(
            None,
            &tenant,
            ServiceCallback::Queued,
            Timestamp::from_nanos(0),
            &[],
            None,
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn tenant_without_service_is_a_no_op_even_with_a_client() {
        let tenant = Tenant::new_loader_tenant(String::new(), false, None);
        assert!(tenant.service.is_none());
    }
}
