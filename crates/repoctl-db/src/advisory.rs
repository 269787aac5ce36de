//! Advisory locking (§4.1 "exit code 2 if an advisory lock cannot be
//! acquired (another loader/migrator is running)").
//!
//! One lock key per tenant (empty tenant hashes to a fixed key for
//! single-tenant mode), so two loader invocations for different
//! tenants can run concurrently while two for the same tenant cannot.

use sqlx::PgPool;

fn lock_key(tenant: &str) -> i64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    tenant.hash(&mut hasher);
    hasher.finish() as i64
}

/// Attempt to acquire a session-level advisory lock for `tenant`.
/// Returns `false` (not an error) if another session already holds it
/// — the caller maps that to exit code 2.
pub async fn try_advisory_lock(pool: &PgPool, tenant: &str) -> sqlx::Result<bool> {
    let key = lock_key(tenant);
    let (acquired,): (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
        .bind(key)
        .fetch_one(pool)
        .await?;
    Ok(acquired)
}

pub async fn release_advisory_lock(pool: &PgPool, tenant: &str) -> sqlx::Result<()> {
    let key = lock_key(tenant);
    sqlx::query("SELECT pg_advisory_unlock($1)")
        .bind(key)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_key_is_stable_for_same_tenant() {
        assert_eq!(lock_key("acme"), lock_key("acme"));
    }

    #[test]
    fn lock_key_distinguishes_tenants() {
        assert_ne!(lock_key("acme"), lock_key("other"));
    }

    #[test]
    fn single_tenant_mode_has_a_fixed_key() {
        assert_eq!(lock_key(""), lock_key(""));
    }
}
