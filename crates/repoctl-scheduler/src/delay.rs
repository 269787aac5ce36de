//! Build-delay tracking (§4.2 "Delay tracking": for every tuple that
//! passes the filter but is not selected, ensure a `build_delays` row
//! exists recording how long it has waited. §3 "archived tenants
//! without any prior build for a tuple do not receive a delay row" —
//! there is nothing to measure a delay against yet).

use repoctl_db::build::{ensure_build_delay, BuildDelayRow};
use sqlx::{Postgres, Transaction};

use crate::select::Candidate;

#[allow(clippy::too_many_arguments)]
pub async fn record_unselected(
    tx: &mut Transaction<'_, Postgres>,
    tenant: &str,
    tenant_archived: bool,
    package_name: &str,
    package_version: &str,
    target: &str,
    target_config_name: &str,
    toolchain_name: &str,
    toolchain_version: &str,
    package_timestamp: i64,
    candidates: &[Candidate],
    picked: Option<&Candidate>,
) -> sqlx::Result<()> {
    for candidate in candidates {
        if let Some(picked) = picked {
            if candidate.package_config_name() == picked.package_config_name() {
                continue;
            }
        }
        if tenant_archived && matches!(candidate, Candidate::New { .. }) {
            continue;
        }
        let report_timestamp = match candidate {
            Candidate::Rebuild { build } => build.completion_timestamp.map(|t| t.as_nanos()),
            Candidate::New { .. } => None,
        };
        ensure_build_delay(
            tx,
            &BuildDelayRow {
                tenant: tenant.to_string(),
                package_name: package_name.to_string(),
                package_version: package_version.to_string(),
                target: target.to_string(),
                target_config_name: target_config_name.to_string(),
                package_config_name: candidate.package_config_name().to_string(),
                toolchain_name: toolchain_name.to_string(),
                toolchain_version: toolchain_version.to_string(),
                report_timestamp,
                package_timestamp,
            },
        )
        .await?;
    }
    Ok(())
}
