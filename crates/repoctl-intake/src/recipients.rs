//! Email scheduling decisions (§4.3 "Other"): who gets notified for a
//! terminal result, and whether this particular notification is a
//! de-duplicated repeat. Pure over already-loaded package/build state.

use std::collections::BTreeMap;

use repoctl_types::{EmailKind, ForceState, PackageEmail, ResultStatus};

/// §4.3 "honoring the `build-toolchain-email` skip map": absence from
/// the map means emails stay enabled for that toolchain.
pub fn toolchain_emails_enabled(toolchain_email: &BTreeMap<String, bool>, toolchain_name: &str) -> bool {
    toolchain_email.get(toolchain_name).copied().unwrap_or(true)
}

/// §4.3 "the `success→success` de-dup unless the build was forced or a
/// prior status differed".
pub fn is_deduplicated_repeat(
    previous_status: Option<ResultStatus>,
    new_status: ResultStatus,
    force: ForceState,
) -> bool {
    force == ForceState::Unforced
        && new_status == ResultStatus::Success
        && previous_status == Some(ResultStatus::Success)
}

/// The package email addresses relevant to `status`: build addresses
/// always qualify, warning addresses on a `warning` result, error
/// addresses on `error`/`abort`/`abnormal`.
pub fn recipients_for(emails: &[PackageEmail], status: ResultStatus) -> Vec<String> {
    let wants = |kind: EmailKind| match kind {
        EmailKind::Build => true,
        EmailKind::Warning => status == ResultStatus::Warning,
        EmailKind::Error => matches!(
            status,
            ResultStatus::Error | ResultStatus::Abort | ResultStatus::Abnormal
        ),
    };
    emails
        .iter()
        .filter(|e| wants(e.kind))
        .map(|e| e.address.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(address: &str, kind: EmailKind) -> PackageEmail {
        PackageEmail { address: address.to_string(), kind }
    }

    #[test]
    fn absent_toolchain_defaults_to_enabled() {
        let map = BTreeMap::new();
        assert!(toolchain_emails_enabled(&map, "gcc"));
    }

    #[test]
    fn toolchain_explicitly_disabled_is_honored() {
        let mut map = BTreeMap::new();
        map.insert("gcc".to_string(), false);
        assert!(!toolchain_emails_enabled(&map, "gcc"));
    }

    #[test]
    fn repeated_success_is_deduplicated() {
        assert!(is_deduplicated_repeat(
            Some(ResultStatus::Success),
            ResultStatus::Success,
            ForceState::Unforced
        ));
    }

    #[test]
    fn forced_success_is_not_deduplicated() {
        assert!(!is_deduplicated_repeat(
            Some(ResultStatus::Success),
            ResultStatus::Success,
            ForceState::Forced
        ));
    }

    #[test]
    fn status_change_is_not_deduplicated() {
        assert!(!is_deduplicated_repeat(
            Some(ResultStatus::Warning),
            ResultStatus::Success,
            ForceState::Unforced
        ));
    }

    #[test]
    fn recipients_include_build_always_and_error_only_on_failure() {
        let emails = vec![
            email("build@x", EmailKind::Build),
            email("err@x", EmailKind::Error),
            email("warn@x", EmailKind::Warning),
        ];
        let success = recipients_for(&emails, ResultStatus::Success);
        assert_eq!(success, vec!["build@x".to_string()]);

        let error = recipients_for(&emails, ResultStatus::Error);
        assert_eq!(error, vec!["build@x".to_string(), "err@x".to_string()]);
    }
}
