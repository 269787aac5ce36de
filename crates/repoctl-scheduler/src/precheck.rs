//! Request pre-checks (§4.2 "Pre-checks"): bot-key classification,
//! interactive-mode intersection, auxiliary-machine name parsing.

use repoctl_error::{ClientError, RepoError};
use repoctl_types::protocol::{MachineRole, OfferedMachine};
use repoctl_types::{derive_config_name, TargetConfigMap};

/// Whether the requesting agent is a "custom" bot (§4.2 "A fingerprint
/// absent from the directory marks the bot as custom; otherwise it is
/// default"). `bot_agent_keys` is the set of fingerprints found in the
/// configured agent-keys directory; `None` means no directory is
/// configured at all, in which case every bot is default.
pub fn classify_bot(
    bot_agent_keys: Option<&std::collections::BTreeSet<String>>,
    fingerprint: Option<&str>,
) -> Result<bool, RepoError> {
    let Some(known) = bot_agent_keys else {
        return Ok(false);
    };
    let fingerprint = fingerprint.ok_or_else(|| {
        RepoError::Client(ClientError::Unauthorized(
            "agent fingerprint required when bot-agent-keys is configured".into(),
        ))
    })?;
    Ok(!known.contains(fingerprint))
}

/// §4.2 "The selected configuration's `effective_bot_keys` must
/// contain the bot's fingerprint iff custom."
pub fn bot_key_matches(effective_bot_keys: &[String], fingerprint: Option<&str>, is_custom: bool) -> bool {
    if !is_custom {
        return true;
    }
    match fingerprint {
        Some(fp) => effective_bot_keys.iter().any(|k| k == fp),
        None => false,
    }
}

/// §4.2 "Interactive mode is the intersection of agent and URL
/// parameter; incompatible combinations return an empty task." The URL
/// parameter is surfaced to this crate as `requested` by the HTTP
/// handler (a `?interactive` query flag); the agent's half is whether
/// it offered an `interactive_login` template.
pub fn interactive_mode(agent_offered_login: bool, requested: bool) -> bool {
    agent_offered_login && requested
}

/// The `role = build` machines offered in the request.
pub fn build_machines(offered: &[OfferedMachine]) -> Vec<&OfferedMachine> {
    offered.iter().filter(|m| m.role == MachineRole::Build).collect()
}

/// The `role = auxiliary` machines offered in the request.
pub fn auxiliary_machines(offered: &[OfferedMachine]) -> Vec<&OfferedMachine> {
    offered.iter().filter(|m| m.role == MachineRole::Auxiliary).collect()
}

/// Resolves the target configuration a build machine serves, deriving
/// its name from the `arch-os…` machine-name convention when no exact
/// pattern match is registered (§4.2 "deriving a configuration name by
/// stripping the first dash-component").
pub fn resolve_target_config<'a>(
    configs: &'a TargetConfigMap,
    machine_name: &str,
) -> Option<&'a repoctl_types::BuildTargetConfig> {
    configs
        .matching(machine_name)
        .or_else(|| derive_config_name(machine_name).and_then(|name| configs.find(name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn no_directory_means_every_bot_is_default() {
        assert_eq!(classify_bot(None, None).unwrap(), false);
    }

    #[test]
    fn missing_fingerprint_with_directory_is_unauthorized() {
        let known = BTreeSet::from(["abc".to_string()]);
        let err = classify_bot(Some(&known), None).unwrap_err();
        assert_eq!(err.http_status(), 401);
    }

    #[test]
    fn known_fingerprint_is_default_bot() {
        let known = BTreeSet::from(["abc".to_string()]);
        assert_eq!(classify_bot(Some(&known), Some("abc")).unwrap(), false);
    }

    #[test]
    fn unknown_fingerprint_is_custom_bot() {
        let known = BTreeSet::from(["abc".to_string()]);
        assert_eq!(classify_bot(Some(&known), Some("zzz")).unwrap(), true);
    }

    #[test]
    fn bot_key_matches_requires_membership_only_when_custom() {
        assert!(bot_key_matches(&[], None, false));
        assert!(!bot_key_matches(&["k1".into()], Some("k2"), true));
        assert!(bot_key_matches(&["k1".into()], Some("k1"), true));
    }

    #[test]
    fn interactive_mode_requires_both_sides() {
        assert!(interactive_mode(true, true));
        assert!(!interactive_mode(true, false));
        assert!(!interactive_mode(false, true));
    }
}
