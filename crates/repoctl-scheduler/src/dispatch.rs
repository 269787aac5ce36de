//! Task-dispatch orchestration (§4.2 "Build scheduler"): ties the pure
//! pre-check/selection/interactive/auxiliary helpers in this crate to
//! `repoctl-db` and `repoctl-webhook`, producing the response an axum
//! handler sends back to a build agent.
//!
//! Simplification (documented further in DESIGN.md): `controller_checksum`
//! and `machine_checksum` are derived deterministically from the tuple's
//! identity rather than hashing the actual build-configuration file
//! content, since that file format is out of this crate's scope.

use std::collections::BTreeSet;

use sha2::{Digest, Sha256};
use sqlx::{Postgres, Transaction};

use repoctl_config::Config;
use repoctl_error::RepoError;
use repoctl_retry::RetryPolicy;
use repoctl_types::protocol::{OfferedMachine, TaskDescriptor, TaskRequest, TaskResponse};
use repoctl_types::{
    Build, BuildState, BuildTargetConfig, Challenge, ChecksumTriple, ForceState, Package,
    TargetConfigMap, Tenant, Timestamp,
};
use repoctl_webhook::{NotifiedBuild, ServiceClient};

use crate::select::Candidate;
use crate::{auxiliary, delay, interactive, precheck, select};

pub struct Dispatcher<'a> {
    pub pool: &'a sqlx::PgPool,
    pub config: &'a Config,
    pub configs: &'a TargetConfigMap,
    pub bot_agent_keys: Option<&'a BTreeSet<String>>,
    pub service_client: Option<&'a ServiceClient>,
}

fn wrap_db(e: sqlx::Error) -> RepoError {
    RepoError::Recoverable(Box::new(e))
}

fn wrap_notify(e: anyhow::Error) -> RepoError {
    RepoError::Recoverable(e.into())
}

fn checksum(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b"\0");
    }
    hex::encode(hasher.finalize())
}

impl<'a> Dispatcher<'a> {
    /// §4.2 end-to-end: pre-checks, candidate search across buildable
    /// packages, persistence-on-selection, interactive validation,
    /// auxiliary-machine assignment, and tenant-service notification.
    pub async fn dispatch(
        &self,
        request: &TaskRequest,
        interactive_requested: bool,
        now: Timestamp,
    ) -> Result<TaskResponse, RepoError> {
        let fingerprint = request.fingerprint.as_deref();
        let is_custom = precheck::classify_bot(self.bot_agent_keys, fingerprint)?;

        let build_machines = precheck::build_machines(&request.machine);
        if build_machines.is_empty() {
            return Ok(TaskResponse::empty());
        }
        let auxiliary_machines = precheck::auxiliary_machines(&request.machine);

        let interactive_mode =
            precheck::interactive_mode(request.interactive_login.is_some(), interactive_requested);

        let packages = repoctl_db::package::list_buildable_packages(self.pool)
            .await
            .map_err(wrap_db)?;

        for package in &packages {
            let resolved: Vec<(&OfferedMachine, &BuildTargetConfig)> = build_machines
                .iter()
                .filter_map(|m| precheck::resolve_target_config(self.configs, &m.name).map(|c| (*m, c)))
                .filter(|(_, cfg)| {
                    !package
                        .build_constraints
                        .iter()
                        .any(|excluded_class| self.configs.belongs(&cfg.name, excluded_class))
                })
                .collect();
            if resolved.is_empty() {
                continue;
            }

            if interactive_mode {
                let names: Vec<&str> = resolved.iter().map(|(_, cfg)| cfg.name.as_str()).collect();
                if interactive::has_multiple_configurations(&names) {
                    self.abort_interactive(package).await?;
                    continue;
                }
            }

            let package_config_names: Vec<String> = package
                .build_configs
                .iter()
                .filter(|c| precheck::bot_key_matches(c.effective_bot_keys(), fingerprint, is_custom))
                .map(|c| c.name.clone())
                .collect();
            if package_config_names.is_empty() {
                continue;
            }

            for (machine, target_config) in &resolved {
                tracing::debug!(package = %package.name, target = %machine.name, config = %target_config.name, "considering tuple for dispatch");
                if let Some(response) = self
                    .try_dispatch_tuple(
                        package,
                        machine,
                        target_config,
                        &package_config_names,
                        &request.toolchain_name,
                        &request.toolchain_version,
                        &auxiliary_machines,
                        request.auxiliary_ram.unwrap_or(0),
                        request.interactive_login.as_deref().filter(|_| interactive_mode),
                        fingerprint,
                        now,
                    )
                    .await?
                {
                    return Ok(response);
                }
            }
        }

        Ok(TaskResponse::empty())
    }

    async fn abort_interactive(&self, package: &Package) -> Result<(), RepoError> {
        if let Some(mut tenant) = repoctl_db::tenant::fetch_tenant(self.pool, &package.tenant)
            .await
            .map_err(wrap_db)?
        {
            tenant.archived = true;
            repoctl_db::serializable_transaction(self.pool, RetryPolicy::Default, |tx| {
                let tenant = tenant.clone();
                async move { repoctl_db::tenant::upsert_tenant(tx, &tenant).await }
            })
            .await
            .map_err(wrap_db)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn try_dispatch_tuple(
        &self,
        package: &Package,
        machine: &OfferedMachine,
        target_config: &BuildTargetConfig,
        package_config_names: &[String],
        toolchain_name: &str,
        toolchain_version: &str,
        auxiliary_offered: &[&OfferedMachine],
        ram_budget: u64,
        interactive_login: Option<&str>,
        fingerprint: Option<&str>,
        now: Timestamp,
    ) -> Result<Option<TaskResponse>, RepoError> {
        let tenant = repoctl_db::tenant::fetch_tenant(self.pool, &package.tenant)
            .await
            .map_err(wrap_db)?
            .unwrap_or_else(|| Tenant::new_loader_tenant(package.tenant.clone(), false, None));
        if tenant.archived {
            return Ok(None);
        }
        if tenant.queued_notification_suppressed(now, self.config.build.queued_timeout.into()) {
            return Ok(None);
        }

        let package_version = package.version.to_string();
        let controller_checksum = checksum(&[&package.tenant, &package.name, &package_version, &target_config.name]);
        let machine_checksum = checksum(&[&machine.name, toolchain_name, toolchain_version]);
        let challenge = Challenge::generate(now);

        let auxiliary_environment_names = &package.build_auxiliaries;
        let auxiliary_assignment = if auxiliary_environment_names.is_empty() {
            Vec::new()
        } else {
            match auxiliary::assign(
                auxiliary_environment_names,
                auxiliary_offered,
                self.configs,
                ram_budget,
                self.config.build.max_auxiliary_machines,
            ) {
                Ok(assignment) => assignment,
                Err(_) => return Ok(None),
            }
        };
        let auxiliary_machine_names: Vec<String> =
            auxiliary_assignment.iter().map(|a| a.machine.clone()).collect();

        let args = TupleArgs {
            tenant_id: &package.tenant,
            package_name: &package.name,
            package_version: &package_version,
            target: &machine.name,
            target_config_name: &target_config.name,
            toolchain_name,
            toolchain_version,
            package_config_names,
            now,
            soft_rebuild_timeout: self.config.build.soft_rebuild_timeout.into(),
            queued_timeout: self.config.build.queued_timeout.into(),
            controller_checksum: &controller_checksum,
            machine_checksum: &machine_checksum,
            challenge: &challenge,
            machine_name: &machine.name,
            auxiliary_machine_names: &auxiliary_machine_names,
            fingerprint,
            interactive_login,
        };

        let picked = repoctl_db::serializable_transaction(self.pool, RetryPolicy::Default, |tx| {
            select_and_persist(tx, &args)
        })
        .await
        .map_err(wrap_db)?;

        let Some(candidate) = picked else { return Ok(None) };

        let notified_build = NotifiedBuild {
            package_name: package.name.clone(),
            package_version: package_version.clone(),
            target: machine.name.clone(),
            target_config: target_config.name.clone(),
            package_config: candidate.package_config_name().to_string(),
        };
        let (queued_data, building_data) =
            crate::notify::notify_queued_then_building(self.service_client, &tenant, now, &[notified_build])
                .map_err(wrap_notify)?;
        if tenant.service.is_some() {
            // §5 "stamping tenant.queued_timestamp = now() whenever queued is
            // dispatched and refusing to issue new tasks from that tenant
            // until a configured expiration has passed" — stamped
            // unconditionally for serviced tenants, not just when a
            // callback returned replacement data.
            let mut tenant = tenant.clone();
            tenant.queued_at = Some(now);
            if let Some(data) = building_data.or(queued_data) {
                if let Some(service) = &mut tenant.service {
                    service.data = Some(data);
                }
            }
            repoctl_db::serializable_transaction(self.pool, RetryPolicy::Default, |tx| {
                let tenant = tenant.clone();
                async move { repoctl_db::tenant::upsert_tenant(tx, &tenant).await }
            })
            .await
            .map_err(wrap_db)?;
        }

        let session = repoctl_types::Session::encode(&repoctl_types::SessionParts {
            tenant: package.tenant.clone(),
            name: package.name.clone(),
            version: package_version.clone(),
            target: machine.name.clone(),
            target_config: target_config.name.clone(),
            package_config: candidate.package_config_name().to_string(),
            toolchain_name: toolchain_name.to_string(),
            toolchain_version: toolchain_version.to_string(),
            timestamp: now,
        });

        let task = TaskDescriptor {
            package_name: package.name.clone(),
            package_version,
            repository_location: package.location.clone().unwrap_or_default(),
            trust: package.build_bot_keys.clone(),
            requirements: package.requirements.clone(),
            tests: package.tests.iter().map(|t| t.dependency.name.clone()).collect(),
            dependency_checksum: controller_checksum.clone(),
            worker_checksum: machine_checksum.clone(),
            machine: machine.name.clone(),
            auxiliary_machines: auxiliary_assignment,
            target: target_config.name.clone(),
            environment: Vec::new(),
            arguments: Vec::new(),
            warning_regexes: Vec::new(),
            interactive_login: interactive_login.map(str::to_string),
        };

        Ok(Some(TaskResponse {
            session: Some(session),
            challenge: Some(challenge.to_hex()),
            result_url: None,
            upload_url: Vec::new(),
            agent_checksum: None,
            task: Some(task),
        }))
    }
}

#[allow(clippy::too_many_arguments)]
struct TupleArgs<'a> {
    tenant_id: &'a str,
    package_name: &'a str,
    package_version: &'a str,
    target: &'a str,
    target_config_name: &'a str,
    toolchain_name: &'a str,
    toolchain_version: &'a str,
    package_config_names: &'a [String],
    now: Timestamp,
    soft_rebuild_timeout: repoctl_types::Duration,
    queued_timeout: repoctl_types::Duration,
    controller_checksum: &'a str,
    machine_checksum: &'a str,
    challenge: &'a Challenge,
    machine_name: &'a str,
    auxiliary_machine_names: &'a [String],
    fingerprint: Option<&'a str>,
    interactive_login: Option<&'a str>,
}

async fn select_and_persist(
    tx: &mut Transaction<'_, Postgres>,
    args: &TupleArgs<'_>,
) -> sqlx::Result<Option<Candidate>> {
    let existing = repoctl_db::build::list_builds_for_package(
        tx,
        args.tenant_id,
        args.package_name,
        args.package_version,
    )
    .await?;

    let candidates = select::gather_candidates(
        args.package_config_names,
        args.target,
        args.target_config_name,
        args.toolchain_name,
        args.toolchain_version,
        &existing,
        args.now,
        args.soft_rebuild_timeout,
        args.queued_timeout,
    );
    let picked = select::pick(candidates.clone());

    delay::record_unselected(
        tx,
        args.tenant_id,
        // `try_dispatch_tuple` already returns early for archived tenants,
        // so every tuple reaching this transaction belongs to a live one.
        false,
        args.package_name,
        args.package_version,
        args.target,
        args.target_config_name,
        args.toolchain_name,
        args.toolchain_version,
        args.now.as_nanos(),
        &candidates,
        picked.as_ref(),
    )
    .await?;

    if let Some(candidate) = &picked {
        let build = build_row_for(args, candidate);
        repoctl_db::build::upsert_build(tx, &build).await?;
    }

    Ok(picked)
}

fn build_row_for(args: &TupleArgs<'_>, candidate: &Candidate) -> Build {
    match candidate {
        Candidate::New { package_config_name } => Build {
            tenant: args.tenant_id.to_string(),
            package_name: args.package_name.to_string(),
            package_version: args.package_version.to_string(),
            target: args.target.to_string(),
            target_config_name: args.target_config_name.to_string(),
            package_config_name: package_config_name.clone(),
            toolchain_name: args.toolchain_name.to_string(),
            toolchain_version: args.toolchain_version.to_string(),
            state: BuildState::Building,
            status: None,
            force: ForceState::Unforced,
            timestamp: args.now,
            soft_timestamp: args.now,
            hard_timestamp: args.now,
            completion_timestamp: None,
            interactive: args.interactive_login.map(str::to_string),
            agent_fingerprint: args.fingerprint.map(str::to_string),
            agent_challenge: Some(args.challenge.clone()),
            machine: args.machine_name.to_string(),
            auxiliary_machines: args.auxiliary_machine_names.to_vec(),
            controller_checksum: args.controller_checksum.to_string(),
            machine_checksum: args.machine_checksum.to_string(),
            checksums: ChecksumTriple::default(),
            results: Vec::new(),
        },
        Candidate::Rebuild { build } => {
            let mut build = build.clone();
            build.state = BuildState::Building;
            build.force = ForceState::Unforced;
            build.timestamp = args.now;
            build.interactive = args.interactive_login.map(str::to_string);
            build.agent_fingerprint = args.fingerprint.map(str::to_string);
            build.agent_challenge = Some(args.challenge.clone());
            build.machine = args.machine_name.to_string();
            build.auxiliary_machines = args.auxiliary_machine_names.to_vec();
            build
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_deterministic_for_same_inputs() {
        assert_eq!(checksum(&["a", "b"]), checksum(&["a", "b"]));
        assert_ne!(checksum(&["a", "b"]), checksum(&["a", "c"]));
    }
}
