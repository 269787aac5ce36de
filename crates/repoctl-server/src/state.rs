//! Shared, read-only-after-startup application state (§5 "Shared
//! state": target-configuration maps, bot-agent key maps, and option
//! structures are read-only after module initialization and may be
//! shared across threads without locks").

use std::collections::BTreeSet;

use sqlx::PgPool;

use repoctl_config::Config;
use repoctl_intake::email::{EmailSink, NullEmailSink};
use repoctl_tenant::email::{CiEmailSink, NullCiEmailSink};
use repoctl_types::TargetConfigMap;
use repoctl_webhook::ServiceClient;

pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub target_configs: TargetConfigMap,
    pub bot_agent_keys: Option<BTreeSet<String>>,
    pub service_client: Option<ServiceClient>,
    pub email_sink: Box<dyn EmailSink>,
    pub ci_email_sink: Box<dyn CiEmailSink>,
}

impl AppState {
    /// Loads the target-config table and bot-agent-keys directory per
    /// `config`, wiring null sinks for email/CI-notification delivery
    /// (§1 "HTML/email rendering is out of scope" — the transport is a
    /// collaborator trait, not something this crate implements).
    pub fn new(pool: PgPool, config: Config) -> anyhow::Result<Self> {
        let target_configs = match &config.build.target_config_path {
            Some(path) => repoctl_config::load_target_config_map(path)?,
            None => TargetConfigMap::default(),
        };
        let bot_agent_keys = match &config.auth.bot_agent_keys {
            Some(dir) => Some(repoctl_config::load_bot_agent_keys(dir)?),
            None => None,
        };
        let service_client = config.service.as_ref().map(ServiceClient::new).transpose()?;

        Ok(Self {
            pool,
            config,
            target_configs,
            bot_agent_keys,
            service_client,
            email_sink: Box::new(NullEmailSink),
            ci_email_sink: Box::new(NullCiEmailSink),
        })
    }
}
