//! `SERIALIZABLE`-transaction-with-retry helper (§5 "Database
//! concurrency": "all persistence happens inside a single serializable
//! transaction per logical phase").
//!
//! Reuses `repoctl_retry`'s delay-calculation math but sleeps with
//! `tokio::time::sleep` rather than the blocking executor, since this
//! runs on the async pool.

use std::future::Future;

use repoctl_retry::{RetryPolicy, calculate_delay};
use sqlx::{PgPool, Postgres, Transaction};

/// Postgres SQLSTATE for a serialization failure under `SERIALIZABLE`
/// isolation — the only condition this helper retries.
const SERIALIZATION_FAILURE: &str = "40001";

/// Run `body` inside a `SERIALIZABLE` transaction, retrying the whole
/// transaction on a serialization failure per `policy`. Any other
/// error is returned immediately without retry.
pub async fn serializable_transaction<T, F, Fut>(
    pool: &PgPool,
    policy: RetryPolicy,
    mut body: F,
) -> Result<T, sqlx::Error>
where
    F: FnMut(&mut Transaction<'_, Postgres>) -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let config = policy.to_config();
    let mut attempt = 1;
    loop {
        let mut tx = pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        match body(&mut tx).await {
            Ok(value) => match tx.commit().await {
                Ok(()) => return Ok(value),
                Err(e) if is_serialization_failure(&e) && attempt < config.max_attempts => {
                    attempt += 1;
                    tokio::time::sleep(calculate_delay(&config, attempt)).await;
                    continue;
                }
                Err(e) => return Err(e),
            },
            Err(e) if is_serialization_failure(&e) && attempt < config.max_attempts => {
                let _ = tx.rollback().await;
                attempt += 1;
                tokio::time::sleep(calculate_delay(&config, attempt)).await;
                continue;
            }
            Err(e) => {
                let _ = tx.rollback().await;
                return Err(e);
            }
        }
    }
}

fn is_serialization_failure(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some(SERIALIZATION_FAILURE),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialization_failure_detection_ignores_non_db_errors() {
        let err = sqlx::Error::RowNotFound;
        assert!(!is_serialization_failure(&err));
    }
}
