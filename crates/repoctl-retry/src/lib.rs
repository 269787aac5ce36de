//! Retry strategies and backoff policies.
//!
//! Used wherever the spec calls for a retry-with-back-off loop: the
//! loader's fetch-tool invocation (§4.1 "up to N attempts with
//! 1-second back-off on exit code 2"), the scheduler/intake
//! serializable-transaction retry (§5 "Database concurrency"), and the
//! tenant/CI lifecycle's write-path retry (§4.4 "configurable max
//! attempts and exponential back-off").
//!
//! # Example
//!
//! ```
//! use repoctl_retry::{RetryPolicy, calculate_delay};
//!
//! let config = RetryPolicy::Default.to_config();
//! let delay = calculate_delay(&config, 2);
//! println!("retry after: {:?}", delay);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Strategy type for retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategyType {
    /// No delay between retries.
    Immediate,
    /// Delay doubles each attempt (default).
    #[default]
    Exponential,
    /// Delay increases linearly each attempt.
    Linear,
    /// Same delay every attempt — the loader's fetch-tool retry (§4.1)
    /// uses this with a 1-second base delay.
    Constant,
}

/// Predefined retry policies with sensible defaults for different call
/// sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Balanced retry behavior for database transaction retries.
    #[default]
    Default,
    /// More attempts, faster recovery — the tenant/CI lifecycle's
    /// write-path retry (§4.4).
    Aggressive,
    /// Fewer attempts, longer delays.
    Conservative,
    /// The loader's fetch-tool retry on exit code 2 (§4.1): fixed
    /// 1-second back-off, bounded attempts.
    FetchTool,
    /// Fully custom configuration.
    Custom,
}

impl RetryPolicy {
    pub fn to_config(&self) -> RetryStrategyConfig {
        match self {
            RetryPolicy::Default => RetryStrategyConfig {
                strategy: RetryStrategyType::Exponential,
                max_attempts: 6,
                base_delay: Duration::from_secs(2),
                max_delay: Duration::from_secs(120),
                jitter: 0.5,
            },
            RetryPolicy::Aggressive => RetryStrategyConfig {
                strategy: RetryStrategyType::Exponential,
                max_attempts: 10,
                base_delay: Duration::from_millis(500),
                max_delay: Duration::from_secs(30),
                jitter: 0.3,
            },
            RetryPolicy::Conservative => RetryStrategyConfig {
                strategy: RetryStrategyType::Linear,
                max_attempts: 3,
                base_delay: Duration::from_secs(5),
                max_delay: Duration::from_secs(60),
                jitter: 0.1,
            },
            RetryPolicy::FetchTool => RetryStrategyConfig {
                strategy: RetryStrategyType::Constant,
                max_attempts: 5,
                base_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(1),
                jitter: 0.0,
            },
            RetryPolicy::Custom => RetryStrategyConfig::default(),
        }
    }
}

/// Configuration for a retry strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryStrategyConfig {
    #[serde(default)]
    pub strategy: RetryStrategyType,
    #[serde(default)]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay")]
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
    #[serde(default = "default_max_delay")]
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
    /// 0.0 = no jitter, 1.0 = full jitter.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

fn default_base_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(120)
}

fn default_jitter() -> f64 {
    0.5
}

impl Default for RetryStrategyConfig {
    fn default() -> Self {
        Self {
            strategy: RetryStrategyType::Exponential,
            max_attempts: 6,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(120),
            jitter: 0.5,
        }
    }
}

/// Calculate the delay for the next retry attempt (1-indexed).
pub fn calculate_delay(config: &RetryStrategyConfig, attempt: u32) -> Duration {
    let delay = match config.strategy {
        RetryStrategyType::Immediate => Duration::ZERO,
        RetryStrategyType::Exponential => {
            let pow = attempt.saturating_sub(1).min(16);
            config.base_delay.saturating_mul(2_u32.saturating_pow(pow))
        }
        RetryStrategyType::Linear => config.base_delay.saturating_mul(attempt),
        RetryStrategyType::Constant => config.base_delay,
    };

    let capped = delay.min(config.max_delay);

    if config.jitter > 0.0 {
        apply_jitter(capped, config.jitter)
    } else {
        capped
    }
}

fn apply_jitter(delay: Duration, jitter: f64) -> Duration {
    use rand::Rng;

    let jitter_range = 2.0 * jitter;
    let mut rng = rand::rng();
    let random_value: f64 = rng.random();
    let random_factor = 1.0 - jitter + (random_value * jitter_range);
    let millis = (delay.as_millis() as f64 * random_factor).round() as u64;
    Duration::from_millis(millis)
}

/// Whether a failed attempt should be retried (§7 "client errors never
/// retry"). An operation classifies its own error on every attempt
/// rather than the executor guessing from the error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Retry,
    Stop,
}

/// A retry executor that runs a fallible, blocking operation with
/// configured back-off (§5 "Suspension points": the fixed back-off
/// sleep is synchronous and holds the request thread by design).
pub struct RetryExecutor {
    config: RetryStrategyConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryStrategyConfig) -> Self {
        Self { config }
    }

    pub fn from_policy(policy: RetryPolicy) -> Self {
        Self::new(policy.to_config())
    }

    /// Runs `operation` until it succeeds or `max_attempts` is reached,
    /// retrying unconditionally on every error.
    pub fn run<T, E, F>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Result<T, E>,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt) {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if attempt >= self.config.max_attempts {
                        return Err(e);
                    }
                    std::thread::sleep(calculate_delay(&self.config, attempt));
                    attempt += 1;
                }
            }
        }
    }

    /// Runs `operation` until it succeeds, `max_attempts` is reached,
    /// or the operation itself classifies its error as non-retryable
    /// (e.g. a `repoctl_error::RepoError::Client` must never retry per
    /// §7). `operation` returns `Err((error, Outcome))` on failure.
    pub fn run_classified<T, E, F>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Result<T, (E, Outcome)>,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt) {
                Ok(result) => return Ok(result),
                Err((e, Outcome::Stop)) => return Err(e),
                Err((e, Outcome::Retry)) => {
                    if attempt >= self.config.max_attempts {
                        return Err(e);
                    }
                    std::thread::sleep(calculate_delay(&self.config, attempt));
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_exponential_six_attempts() {
        let config = RetryPolicy::Default.to_config();
        assert_eq!(config.strategy, RetryStrategyType::Exponential);
        assert_eq!(config.max_attempts, 6);
    }

    #[test]
    fn fetch_tool_policy_is_one_second_constant() {
        let config = RetryPolicy::FetchTool.to_config();
        assert_eq!(config.strategy, RetryStrategyType::Constant);
        assert_eq!(config.base_delay, Duration::from_secs(1));
    }

    #[test]
    fn exponential_delay_doubles_and_caps() {
        let config = RetryStrategyConfig {
            strategy: RetryStrategyType::Exponential,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter: 0.0,
            max_attempts: 10,
        };
        assert_eq!(calculate_delay(&config, 1), Duration::from_secs(1));
        assert_eq!(calculate_delay(&config, 2), Duration::from_secs(2));
        assert_eq!(calculate_delay(&config, 3), Duration::from_secs(4));
        assert_eq!(calculate_delay(&config, 10), Duration::from_secs(60));
    }

    #[test]
    fn constant_delay_never_changes() {
        let config = RetryStrategyConfig {
            strategy: RetryStrategyType::Constant,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            jitter: 0.0,
            max_attempts: 5,
        };
        assert_eq!(calculate_delay(&config, 1), calculate_delay(&config, 4));
    }

    #[test]
    fn run_retries_until_success() {
        let executor = RetryExecutor::new(RetryStrategyConfig {
            strategy: RetryStrategyType::Immediate,
            max_attempts: 5,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: 0.0,
        });
        let mut seen = 0;
        let result = executor.run(|attempt| {
            seen = attempt;
            if attempt < 3 { Err("transient") } else { Ok("ok") }
        });
        assert_eq!(result, Ok("ok"));
        assert_eq!(seen, 3);
    }

    #[test]
    fn run_classified_stops_immediately_on_client_error() {
        let executor = RetryExecutor::new(RetryStrategyConfig {
            strategy: RetryStrategyType::Immediate,
            max_attempts: 5,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: 0.0,
        });
        let mut attempts = 0;
        let result: Result<(), &str> = executor.run_classified(|attempt| {
            attempts = attempt;
            Err(("client error", Outcome::Stop))
        });
        assert_eq!(result, Err("client error"));
        assert_eq!(attempts, 1);
    }

    #[test]
    fn run_classified_exhausts_retryable_errors() {
        let executor = RetryExecutor::new(RetryStrategyConfig {
            strategy: RetryStrategyType::Immediate,
            max_attempts: 3,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: 0.0,
        });
        let mut attempts = 0;
        let result: Result<(), &str> = executor.run_classified(|attempt| {
            attempts = attempt;
            Err(("recoverable", Outcome::Retry))
        });
        assert_eq!(result, Err("recoverable"));
        assert_eq!(attempts, 3);
    }

    proptest::proptest! {
        #[test]
        fn delay_never_exceeds_max(base_secs in 1u64..100, max_secs in 1u64..100, attempt in 1u32..20) {
            let config = RetryStrategyConfig {
                strategy: RetryStrategyType::Exponential,
                base_delay: Duration::from_secs(base_secs),
                max_delay: Duration::from_secs(max_secs),
                jitter: 0.0,
                max_attempts: 20,
            };
            let delay = calculate_delay(&config, attempt);
            prop_assert!(delay <= Duration::from_secs(max_secs));
        }
    }
}
