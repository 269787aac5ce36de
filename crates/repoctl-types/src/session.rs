use std::fmt;

use serde::{Deserialize, Serialize};

use crate::timestamp::Timestamp;

/// Opaque path identifying a specific in-flight build attempt (GLOSSARY
/// "Session"): `tenant/name/version/target/target_config/
/// package_config/toolchain_name/toolchain_version/timestamp_ns`, slash
/// joined per §4.2 "Session and response".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Session(String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParts {
    pub tenant: String,
    pub name: String,
    pub version: String,
    pub target: String,
    pub target_config: String,
    pub package_config: String,
    pub toolchain_name: String,
    pub toolchain_version: String,
    pub timestamp: Timestamp,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionParseError {
    #[error("invalid session format: expected 9 slash-separated fields, found {0}")]
    WrongFieldCount(usize),
    #[error("invalid session timestamp: {0}")]
    BadTimestamp(String),
}

impl Session {
    pub fn encode(parts: &SessionParts) -> Session {
        Session(
            [
                parts.tenant.as_str(),
                parts.name.as_str(),
                parts.version.as_str(),
                parts.target.as_str(),
                parts.target_config.as_str(),
                parts.package_config.as_str(),
                parts.toolchain_name.as_str(),
                parts.toolchain_version.as_str(),
                &parts.timestamp.as_nanos().to_string(),
            ]
            .join("/"),
        )
    }

    pub fn parse(&self) -> Result<SessionParts, SessionParseError> {
        let fields: Vec<&str> = self.0.split('/').collect();
        let [tenant, name, version, target, target_config, package_config, toolchain_name, toolchain_version, ts] =
            fields.as_slice()
        else {
            return Err(SessionParseError::WrongFieldCount(fields.len()));
        };
        let nanos: i64 = ts
            .parse()
            .map_err(|_| SessionParseError::BadTimestamp((*ts).to_string()))?;
        Ok(SessionParts {
            tenant: tenant.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            target: target.to_string(),
            target_config: target_config.to_string(),
            package_config: package_config.to_string(),
            toolchain_name: toolchain_name.to_string(),
            toolchain_version: toolchain_version.to_string(),
            timestamp: Timestamp::from_nanos(nanos),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Session {
    fn from(s: String) -> Self {
        Session(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_parts() -> SessionParts {
        SessionParts {
            tenant: String::new(),
            name: "libx".into(),
            version: "1.0".into(),
            target: "x86_64-linux-gnu".into(),
            target_config: "linux-gcc".into(),
            package_config: "default".into(),
            toolchain_name: "gcc".into(),
            toolchain_version: "13.1".into(),
            timestamp: Timestamp::from_nanos(42),
        }
    }

    #[test]
    fn encode_matches_scenario_2_format() {
        let s = Session::encode(&sample_parts());
        assert_eq!(
            s.as_str(),
            "/libx/1.0/x86_64-linux-gnu/linux-gcc/default/gcc/13.1/42"
        );
    }

    #[test]
    fn roundtrips_through_parse() {
        let parts = sample_parts();
        let s = Session::encode(&parts);
        assert_eq!(s.parse().unwrap(), parts);
    }

    #[test]
    fn rejects_wrong_field_count() {
        let s = Session::from("/too/few/fields".to_string());
        assert!(matches!(
            s.parse(),
            Err(SessionParseError::WrongFieldCount(3))
        ));
    }
}
