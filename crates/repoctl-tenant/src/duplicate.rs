//! Duplicate-tenant resolution (§4.4 "Create unloaded tenant"): pure
//! decision over a `(service.type, service.id)` collision, kept
//! separate from the database lookup so the mode-reduction and the
//! action it implies are directly testable.

use repoctl_types::DuplicateTenantMode;

/// What `create_unloaded_tenant` should do once a collision has been
/// looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateAction {
    /// No colliding tenant: persist a new one.
    Create,
    /// `fail` mode and a collision was found: reject the request.
    Reject,
    /// `ignore`: bump the existing tenant's ref-count, hand back its id.
    Ignore,
    /// `replace`: archive (or delete, if still unloaded) the existing
    /// tenant, carrying its ref-count onto the new one.
    Replace,
}

/// `replace_archived` degrades to `replace` or `ignore` depending on
/// whether the colliding tenant is already archived; every other mode
/// passes through unchanged.
pub fn reduce_mode(mode: DuplicateTenantMode, existing_archived: bool) -> DuplicateTenantMode {
    match mode {
        DuplicateTenantMode::ReplaceArchived => {
            if existing_archived {
                DuplicateTenantMode::Replace
            } else {
                DuplicateTenantMode::Ignore
            }
        }
        other => other,
    }
}

/// `mode` must already be reduced (no `ReplaceArchived` left).
pub fn decide(mode: DuplicateTenantMode, existing_found: bool) -> DuplicateAction {
    if !existing_found {
        return DuplicateAction::Create;
    }
    match mode {
        DuplicateTenantMode::Fail => DuplicateAction::Reject,
        DuplicateTenantMode::Ignore => DuplicateAction::Ignore,
        DuplicateTenantMode::Replace => DuplicateAction::Replace,
        DuplicateTenantMode::ReplaceArchived => {
            unreachable!("reduce_mode must run before decide")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_collision_always_creates() {
        for mode in [
            DuplicateTenantMode::Fail,
            DuplicateTenantMode::Ignore,
            DuplicateTenantMode::Replace,
            DuplicateTenantMode::ReplaceArchived,
        ] {
            assert_eq!(decide(reduce_mode(mode, false), false), DuplicateAction::Create);
        }
    }

    #[test]
    fn fail_mode_rejects_on_collision() {
        assert_eq!(decide(DuplicateTenantMode::Fail, true), DuplicateAction::Reject);
    }

    #[test]
    fn replace_archived_degrades_to_replace_when_existing_is_archived() {
        let reduced = reduce_mode(DuplicateTenantMode::ReplaceArchived, true);
        assert_eq!(reduced, DuplicateTenantMode::Replace);
        assert_eq!(decide(reduced, true), DuplicateAction::Replace);
    }

    #[test]
    fn replace_archived_degrades_to_ignore_when_existing_is_live() {
        let reduced = reduce_mode(DuplicateTenantMode::ReplaceArchived, false);
        assert_eq!(reduced, DuplicateTenantMode::Ignore);
        assert_eq!(decide(reduced, true), DuplicateAction::Ignore);
    }
}
