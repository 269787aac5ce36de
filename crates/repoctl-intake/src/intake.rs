//! Build-result intake orchestration (§4.3): ties the pure
//! validation/skip/interrupt/recipients helpers in this crate to
//! `repoctl-db`, `repoctl-webhook`, and the injected `EmailSink`,
//! answering an agent's `?build-result` post.

use sqlx::{Postgres, Transaction};

use repoctl_config::Config;
use repoctl_error::{ClientError, RepoError};
use repoctl_retry::RetryPolicy;
use repoctl_types::protocol::{ResultBody, ResultRequest};
use repoctl_types::{Build, BuildState, ForceState, ResultStatus, SessionParts, Tenant, Timestamp};
use repoctl_webhook::{NotifiedBuild, ServiceCallback, ServiceClient};

use crate::email::{EmailSink, NotificationContext, NotificationRequest};
use crate::interrupt::{apply_interrupt, InterruptOutcome};
use crate::recipients::{is_deduplicated_repeat, recipients_for, toolchain_emails_enabled};
use crate::result_kind::{classify, ResultKind};
use crate::skip::{validate_skip, SkipError};
use crate::validate::{challenge_matches, silently_acceptable, validate};

pub struct IntakeProcessor<'a> {
    pub pool: &'a sqlx::PgPool,
    pub config: &'a Config,
    pub email_sink: &'a dyn EmailSink,
    pub service_client: Option<&'a ServiceClient>,
}

fn wrap_db(e: sqlx::Error) -> RepoError {
    RepoError::Recoverable(Box::new(e))
}

fn notified_build_for(build: &Build) -> NotifiedBuild {
    NotifiedBuild {
        package_name: build.package_name.clone(),
        package_version: build.package_version.clone(),
        target: build.target.clone(),
        target_config: build.target_config_name.clone(),
        package_config: build.package_config_name.clone(),
    }
}

/// What the transaction actually did, threaded out so notification
/// delivery (a live HTTP call) and email scheduling happen after
/// commit rather than inside it.
enum Applied {
    /// Session/build/challenge validation failed, or a `skip` result's
    /// checksums did not match (reported to the caller as a client/
    /// expired-session error, never persisted).
    Rejected(RepoError),
    /// §4.3 "Skip": `soft_timestamp` bumped, nothing else changed, no
    /// notification.
    Skipped,
    /// §4.3 "Interrupt" on a rebuild, or on an initial build with no
    /// queued callback: reverted or deleted, no notification fires.
    InterruptedQuietly,
    /// §4.3 "Interrupt" on an initial build with a `service_build_queued`
    /// callback registered: recreated as a blank `queued` row.
    InterruptedToQueued(Build),
    /// §4.3 "Other": the build reached a terminal status.
    Completed { build: Build, previous_status: Option<ResultStatus>, was_forced: bool },
}

impl<'a> IntakeProcessor<'a> {
    /// §4.3 end-to-end. Only a skip-checksum mismatch (`ClientError`)
    /// and a challenge mismatch (`RepoError::AuthFailed`) are surfaced
    /// as anything other than `Ok`/200 — both still map to 200 per
    /// `repoctl-error`'s table, since this endpoint never distinguishes
    /// failure from an outside observer.
    pub async fn handle_result(&self, request: &ResultRequest, now: Timestamp) -> Result<(), RepoError> {
        let session = request
            .session
            .parse()
            .map_err(|e| RepoError::ExpiredSession(format!("unparseable session: {e}")))?;

        let tenant = repoctl_db::tenant::fetch_tenant(self.pool, &session.tenant)
            .await
            .map_err(wrap_db)?;

        let applied = repoctl_db::serializable_transaction(self.pool, RetryPolicy::Default, |tx| {
            self.apply(tx, &session, request, tenant.as_ref(), now)
        })
        .await
        .map_err(wrap_db)?;

        match applied {
            Applied::Rejected(e) => return Err(e),
            Applied::Skipped | Applied::InterruptedQuietly => {}
            Applied::InterruptedToQueued(build) => {
                self.fire_service_callback(ServiceCallback::Queued, &tenant, &build, now);
            }
            Applied::Completed { build, previous_status, was_forced } => {
                self.fire_service_callback(ServiceCallback::Built, &tenant, &build, now);
                self.schedule_emails(&build, previous_status, was_forced, &session).await;
            }
        }
        Ok(())
    }

    fn fire_service_callback(
        &self,
        callback: ServiceCallback,
        tenant: &Option<Tenant>,
        build: &Build,
        now: Timestamp,
    ) {
        let (Some(client), Some(tenant)) = (self.service_client, tenant.as_ref()) else { return };
        let Some(service) = tenant.service.as_ref() else { return };
        let notified_build = notified_build_for(build);
        if let Err(e) = client.notify(callback, &tenant.id, now, &[notified_build], None, service.data.clone()) {
            tracing::warn!(error = %e, tenant = %tenant.id, "tenant-service notification failed");
        }
    }

    async fn schedule_emails(
        &self,
        build: &Build,
        previous_status: Option<ResultStatus>,
        was_forced: bool,
        session: &SessionParts,
    ) {
        let status = build.status.expect("Completed always sets a status");
        let force = if was_forced { ForceState::Forced } else { ForceState::Unforced };
        if is_deduplicated_repeat(previous_status, status, force) {
            return;
        }
        if !toolchain_emails_enabled(&self.config.build.toolchain_email, &build.toolchain_name) {
            return;
        }

        let versions = match repoctl_db::package::list_package_versions_desc(self.pool, &build.tenant, &build.package_name).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load package for email scheduling");
                return;
            }
        };
        let Some(package) = versions.into_iter().find(|p| p.version.to_string() == build.package_version) else {
            return;
        };

        for address in recipients_for(&package.emails, status) {
            let request = NotificationRequest {
                to: vec![address],
                template: repoctl_types::EmailKind::Build,
                context: NotificationContext {
                    package_name: session.name.clone(),
                    package_version: session.version.clone(),
                    target: session.target.clone(),
                    status,
                },
            };
            if let Err(e) = self.email_sink.enqueue(request) {
                tracing::warn!(error = %e, "email enqueue failed");
            }
        }
    }

    async fn apply(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        session: &SessionParts,
        request: &ResultRequest,
        tenant: Option<&Tenant>,
        now: Timestamp,
    ) -> sqlx::Result<Applied> {
        let result = &request.result;

        let build = repoctl_db::build::fetch_build(
            tx,
            &session.tenant,
            &session.name,
            &session.version,
            &session.target,
            &session.target_config,
            &session.package_config,
            &session.toolchain_name,
            &session.toolchain_version,
        )
        .await?;

        let Some(build) = build else {
            tracing::warn!(package = %session.name, "build-result for unknown build");
            return Ok(Applied::Rejected(RepoError::ExpiredSession("no matching build".into())));
        };

        if let Err(failure) = validate(&build, session) {
            if silently_acceptable(result.status) {
                tracing::debug!(?failure, "ignoring session mismatch, plausible machine timeout");
            } else {
                tracing::warn!(?failure, "build-result session mismatch");
            }
            return Ok(Applied::Rejected(RepoError::ExpiredSession(format!("{failure:?}"))));
        }

        if self.config.challenge_auth_enabled() && !challenge_matches(&build, request.challenge.as_deref()) {
            tracing::warn!(package = %session.name, "build-result challenge mismatch");
            return Ok(Applied::Rejected(RepoError::AuthFailed));
        }

        match classify(result.status) {
            ResultKind::Interrupt => self.apply_interrupt(tx, build, tenant).await,
            ResultKind::Skip => self.apply_skip(tx, build, request, now).await,
            ResultKind::Other => self.apply_other(tx, build, result, now).await,
        }
    }

    async fn apply_interrupt(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        build: Build,
        tenant: Option<&Tenant>,
    ) -> sqlx::Result<Applied> {
        let has_queued_callback = tenant.is_some_and(|t| t.service.is_some());
        match apply_interrupt(&build, has_queued_callback) {
            InterruptOutcome::RevertToBuilt(b) => {
                repoctl_db::build::upsert_build(tx, &b).await?;
                Ok(Applied::InterruptedQuietly)
            }
            InterruptOutcome::Delete => {
                repoctl_db::build::delete_build(
                    tx,
                    &build.tenant,
                    &build.package_name,
                    &build.package_version,
                    &build.target,
                    &build.target_config_name,
                    &build.package_config_name,
                    &build.toolchain_name,
                    &build.toolchain_version,
                )
                .await?;
                Ok(Applied::InterruptedQuietly)
            }
            InterruptOutcome::RecreateQueued(b) => {
                repoctl_db::build::upsert_build(tx, &b).await?;
                Ok(Applied::InterruptedToQueued(b))
            }
        }
    }

    async fn apply_skip(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        mut build: Build,
        request: &ResultRequest,
        now: Timestamp,
    ) -> sqlx::Result<Applied> {
        let reported = request.result.reported_checksums(request.agent_checksum.clone());
        if let Err(err) = validate_skip(&build.checksums, &reported) {
            let reason = match err {
                SkipError::NotEligible => "skip reported before soft-rebuild checksums were issued",
                SkipError::ChecksumMismatch => "skip checksum does not match stashed value",
            };
            // §4.3 "skip" checksum mismatch -> HTTP 400, not the generic
            // 422 `InvalidParameter` path.
            return Ok(Applied::Rejected(RepoError::Client(ClientError::InvalidSession(reason.into()))));
        }
        build.soft_timestamp = now;
        repoctl_db::build::upsert_build(tx, &build).await?;
        Ok(Applied::Skipped)
    }

    async fn apply_other(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        mut build: Build,
        result: &ResultBody,
        now: Timestamp,
    ) -> sqlx::Result<Applied> {
        let previous_status = build.status;
        let was_forced = matches!(build.force, ForceState::Forcing | ForceState::Forced);

        build.state = BuildState::Built;
        build.force = ForceState::Unforced;
        build.status = Some(result.status);
        build.results = result.operations.clone();
        build.hard_timestamp = now;
        build.soft_timestamp = now;
        build.completion_timestamp = Some(now);
        build.checksums = result.reported_checksums(build.checksums.agent_checksum.clone());
        build.interactive = None;
        build.agent_fingerprint = None;
        build.agent_challenge = None;
        repoctl_db::build::upsert_build(tx, &build).await?;

        Ok(Applied::Completed { build, previous_status, was_forced })
    }
}
