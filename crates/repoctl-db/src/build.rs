//! Build queries (§3 "Build", §4.2 "Persistence on selection", §4.3
//! "Session validation").

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use repoctl_types::{
    Build, BuildState, Challenge, ChecksumTriple, ForceState, OperationResult, ResultStatus,
    Timestamp,
};

#[derive(Debug, FromRow)]
struct BuildRow {
    tenant: String,
    package_name: String,
    package_version: String,
    target: String,
    target_config_name: String,
    package_config_name: String,
    toolchain_name: String,
    toolchain_version: String,
    state: String,
    status: Option<String>,
    force: String,
    timestamp: i64,
    soft_timestamp: i64,
    hard_timestamp: i64,
    completion_timestamp: Option<i64>,
    interactive: Option<String>,
    agent_fingerprint: Option<String>,
    agent_challenge: Option<String>,
    machine: String,
    auxiliary_machines: Vec<String>,
    controller_checksum: String,
    machine_checksum: String,
    agent_checksum: Option<String>,
    worker_checksum: Option<String>,
    dependency_checksum: Option<String>,
    results: serde_json::Value,
}

fn state_str(s: BuildState) -> &'static str {
    match s {
        BuildState::Queued => "queued",
        BuildState::Building => "building",
        BuildState::Built => "built",
    }
}

fn parse_state(s: &str) -> BuildState {
    match s {
        "queued" => BuildState::Queued,
        "building" => BuildState::Building,
        _ => BuildState::Built,
    }
}

fn force_str(f: ForceState) -> &'static str {
    match f {
        ForceState::Unforced => "unforced",
        ForceState::Forcing => "forcing",
        ForceState::Forced => "forced",
    }
}

fn parse_force(s: &str) -> ForceState {
    match s {
        "forcing" => ForceState::Forcing,
        "forced" => ForceState::Forced,
        _ => ForceState::Unforced,
    }
}

fn status_str(s: ResultStatus) -> &'static str {
    match s {
        ResultStatus::Success => "success",
        ResultStatus::Warning => "warning",
        ResultStatus::Error => "error",
        ResultStatus::Abort => "abort",
        ResultStatus::Abnormal => "abnormal",
        ResultStatus::Skip => "skip",
        ResultStatus::Interrupt => "interrupt",
    }
}

fn parse_status(s: &str) -> Option<ResultStatus> {
    Some(match s {
        "success" => ResultStatus::Success,
        "warning" => ResultStatus::Warning,
        "error" => ResultStatus::Error,
        "abort" => ResultStatus::Abort,
        "abnormal" => ResultStatus::Abnormal,
        "skip" => ResultStatus::Skip,
        "interrupt" => ResultStatus::Interrupt,
        _ => return None,
    })
}

impl From<BuildRow> for Build {
    fn from(row: BuildRow) -> Self {
        Build {
            tenant: row.tenant,
            package_name: row.package_name,
            package_version: row.package_version,
            target: row.target,
            target_config_name: row.target_config_name,
            package_config_name: row.package_config_name,
            toolchain_name: row.toolchain_name,
            toolchain_version: row.toolchain_version,
            state: parse_state(&row.state),
            status: row.status.as_deref().and_then(parse_status),
            force: parse_force(&row.force),
            timestamp: Timestamp::from_nanos(row.timestamp),
            soft_timestamp: Timestamp::from_nanos(row.soft_timestamp),
            hard_timestamp: Timestamp::from_nanos(row.hard_timestamp),
            completion_timestamp: row.completion_timestamp.map(Timestamp::from_nanos),
            interactive: row.interactive,
            agent_fingerprint: row.agent_fingerprint,
            agent_challenge: row.agent_challenge.and_then(|h| Challenge::from_hex(&h).ok()),
            machine: row.machine,
            auxiliary_machines: row.auxiliary_machines,
            controller_checksum: row.controller_checksum,
            machine_checksum: row.machine_checksum,
            checksums: ChecksumTriple {
                agent_checksum: row.agent_checksum,
                worker_checksum: row.worker_checksum,
                dependency_checksum: row.dependency_checksum,
            },
            results: serde_json::from_value(row.results).unwrap_or_default(),
        }
    }
}

const SELECT_COLUMNS: &str = r#"tenant, package_name, package_version, target, target_config_name,
    package_config_name, toolchain_name, toolchain_version, state, status, force, timestamp,
    soft_timestamp, hard_timestamp, completion_timestamp, interactive, agent_fingerprint,
    agent_challenge, machine, auxiliary_machines, controller_checksum, machine_checksum,
    agent_checksum, worker_checksum, dependency_checksum, results"#;

pub async fn fetch_build(
    tx: &mut Transaction<'_, Postgres>,
    tenant: &str,
    package_name: &str,
    package_version: &str,
    target: &str,
    target_config_name: &str,
    package_config_name: &str,
    toolchain_name: &str,
    toolchain_version: &str,
) -> sqlx::Result<Option<Build>> {
    let query = format!(
        "SELECT {SELECT_COLUMNS} FROM builds
         WHERE tenant = $1 AND package_name = $2 AND package_version = $3 AND target = $4
           AND target_config_name = $5 AND package_config_name = $6
           AND toolchain_name = $7 AND toolchain_version = $8
         FOR UPDATE"
    );
    let row: Option<BuildRow> = sqlx::query_as(&query)
        .bind(tenant)
        .bind(package_name)
        .bind(package_version)
        .bind(target)
        .bind(target_config_name)
        .bind(package_config_name)
        .bind(toolchain_name)
        .bind(toolchain_version)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(row.map(Build::from))
}

/// Every build for a package not currently `built` or recently
/// `building`, the candidate-gathering step of the selection loop
/// (§4.2 step 3).
pub async fn list_builds_for_package(
    tx: &mut Transaction<'_, Postgres>,
    tenant: &str,
    package_name: &str,
    package_version: &str,
) -> sqlx::Result<Vec<Build>> {
    let query = format!(
        "SELECT {SELECT_COLUMNS} FROM builds
         WHERE tenant = $1 AND package_name = $2 AND package_version = $3"
    );
    let rows: Vec<BuildRow> = sqlx::query_as(&query)
        .bind(tenant)
        .bind(package_name)
        .bind(package_version)
        .fetch_all(&mut **tx)
        .await?;
    Ok(rows.into_iter().map(Build::from).collect())
}

pub async fn upsert_build(tx: &mut Transaction<'_, Postgres>, build: &Build) -> sqlx::Result<()> {
    let results_json = serde_json::to_value(&build.results).expect("results always serialize");
    sqlx::query(
        r#"INSERT INTO builds
             (tenant, package_name, package_version, target, target_config_name,
              package_config_name, toolchain_name, toolchain_version, state, status, force,
              timestamp, soft_timestamp, hard_timestamp, completion_timestamp, interactive,
              agent_fingerprint, agent_challenge, machine, auxiliary_machines,
              controller_checksum, machine_checksum, agent_checksum, worker_checksum,
              dependency_checksum, results)
           VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,
                   $21,$22,$23,$24,$25,$26)
           ON CONFLICT (tenant, package_name, package_version, target, target_config_name,
                        package_config_name, toolchain_name, toolchain_version)
           DO UPDATE SET
             state = EXCLUDED.state, status = EXCLUDED.status, force = EXCLUDED.force,
             timestamp = EXCLUDED.timestamp, soft_timestamp = EXCLUDED.soft_timestamp,
             hard_timestamp = EXCLUDED.hard_timestamp,
             completion_timestamp = EXCLUDED.completion_timestamp,
             interactive = EXCLUDED.interactive, agent_fingerprint = EXCLUDED.agent_fingerprint,
             agent_challenge = EXCLUDED.agent_challenge, machine = EXCLUDED.machine,
             auxiliary_machines = EXCLUDED.auxiliary_machines,
             controller_checksum = EXCLUDED.controller_checksum,
             machine_checksum = EXCLUDED.machine_checksum,
             agent_checksum = EXCLUDED.agent_checksum, worker_checksum = EXCLUDED.worker_checksum,
             dependency_checksum = EXCLUDED.dependency_checksum, results = EXCLUDED.results"#,
    )
    .bind(&build.tenant)
    .bind(&build.package_name)
    .bind(&build.package_version)
    .bind(&build.target)
    .bind(&build.target_config_name)
    .bind(&build.package_config_name)
    .bind(&build.toolchain_name)
    .bind(&build.toolchain_version)
    .bind(state_str(build.state))
    .bind(build.status.map(status_str))
    .bind(force_str(build.force))
    .bind(build.timestamp.as_nanos())
    .bind(build.soft_timestamp.as_nanos())
    .bind(build.hard_timestamp.as_nanos())
    .bind(build.completion_timestamp.map(|t| t.as_nanos()))
    .bind(&build.interactive)
    .bind(&build.agent_fingerprint)
    .bind(build.agent_challenge.as_ref().map(|c| c.to_hex()))
    .bind(&build.machine)
    .bind(&build.auxiliary_machines)
    .bind(&build.controller_checksum)
    .bind(&build.machine_checksum)
    .bind(&build.checksums.agent_checksum)
    .bind(&build.checksums.worker_checksum)
    .bind(&build.checksums.dependency_checksum)
    .bind(results_json)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn delete_build(
    tx: &mut Transaction<'_, Postgres>,
    tenant: &str,
    package_name: &str,
    package_version: &str,
    target: &str,
    target_config_name: &str,
    package_config_name: &str,
    toolchain_name: &str,
    toolchain_version: &str,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"DELETE FROM builds
           WHERE tenant = $1 AND package_name = $2 AND package_version = $3 AND target = $4
             AND target_config_name = $5 AND package_config_name = $6
             AND toolchain_name = $7 AND toolchain_version = $8"#,
    )
    .bind(tenant)
    .bind(package_name)
    .bind(package_version)
    .bind(target)
    .bind(target_config_name)
    .bind(package_config_name)
    .bind(toolchain_name)
    .bind(toolchain_version)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// `{build_id, report_timestamp?, package_timestamp}` (§3 "Build
/// delay").
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BuildDelayRow {
    pub tenant: String,
    pub package_name: String,
    pub package_version: String,
    pub target: String,
    pub target_config_name: String,
    pub package_config_name: String,
    pub toolchain_name: String,
    pub toolchain_version: String,
    pub report_timestamp: Option<i64>,
    pub package_timestamp: i64,
}

/// Create a build-delay row if absent (§4.2 "Delay tracking": "for
/// every tuple that passes the filter but is not selected").
pub async fn ensure_build_delay(
    tx: &mut Transaction<'_, Postgres>,
    row: &BuildDelayRow,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"INSERT INTO build_delays
             (tenant, package_name, package_version, target, target_config_name,
              package_config_name, toolchain_name, toolchain_version, report_timestamp,
              package_timestamp)
           VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
           ON CONFLICT (tenant, package_name, package_version, target, target_config_name,
                        package_config_name, toolchain_name, toolchain_version) DO NOTHING"#,
    )
    .bind(&row.tenant)
    .bind(&row.package_name)
    .bind(&row.package_version)
    .bind(&row.target)
    .bind(&row.target_config_name)
    .bind(&row.package_config_name)
    .bind(&row.toolchain_name)
    .bind(&row.toolchain_version)
    .bind(row.report_timestamp)
    .bind(row.package_timestamp)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Builds whose `building` notification lags its `queued` notification
/// beyond `notify_interval` — the monitor-facing read query (§4.5
/// "stalled_notifications").
pub async fn stalled_builds(
    pool: &PgPool,
    now: Timestamp,
    notify_interval: repoctl_types::Duration,
) -> sqlx::Result<Vec<Build>> {
    let cutoff = now.saturating_sub(notify_interval);
    let query = format!(
        "SELECT {SELECT_COLUMNS} FROM builds
         WHERE state = 'building' AND timestamp < $1"
    );
    let rows: Vec<BuildRow> = sqlx::query_as(&query)
        .bind(cutoff.as_nanos())
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(Build::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_string() {
        for s in [BuildState::Queued, BuildState::Building, BuildState::Built] {
            assert_eq!(parse_state(state_str(s)), s);
        }
    }

    #[test]
    fn force_round_trips_through_string() {
        for f in [ForceState::Unforced, ForceState::Forcing, ForceState::Forced] {
            assert_eq!(parse_force(force_str(f)), f);
        }
    }

    #[test]
    fn status_round_trips_through_string() {
        for s in [
            ResultStatus::Success,
            ResultStatus::Warning,
            ResultStatus::Error,
            ResultStatus::Abort,
            ResultStatus::Abnormal,
            ResultStatus::Skip,
            ResultStatus::Interrupt,
        ] {
            assert_eq!(parse_status(status_str(s)), Some(s));
        }
    }
}
