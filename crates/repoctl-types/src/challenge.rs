use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::timestamp::Timestamp;

/// A SHA-256 nonce over 64 random bytes plus the current nanosecond
/// timestamp (GLOSSARY "Challenge"), generated when the scheduler
/// stashes agent authentication state on a build (§4.2 "Persistence on
/// selection") and verified by the intake (§4.3 "Session validation").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Challenge(#[serde(with = "hex_bytes")] Vec<u8>);

impl Challenge {
    pub fn generate(now: Timestamp) -> Self {
        let mut random = [0u8; 64];
        rand::rng().fill_bytes(&mut random);
        Self::from_random_and_timestamp(&random, now)
    }

    fn from_random_and_timestamp(random: &[u8; 64], now: Timestamp) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(random);
        hasher.update(now.as_nanos().to_be_bytes());
        Challenge(hasher.finalize().to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        Ok(Challenge(hex::decode(s)?))
    }
}

mod hex_bytes {
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_32_bytes() {
        let c = Challenge::generate(Timestamp::now());
        assert_eq!(c.as_bytes().len(), 32);
    }

    #[test]
    fn hex_roundtrips() {
        let c = Challenge::generate(Timestamp::now());
        let hex = c.to_hex();
        assert_eq!(Challenge::from_hex(&hex).unwrap(), c);
    }

    #[test]
    fn distinct_random_inputs_differ() {
        let now = Timestamp::now();
        let a = Challenge::from_random_and_timestamp(&[1u8; 64], now);
        let b = Challenge::from_random_and_timestamp(&[2u8; 64], now);
        assert_ne!(a, b);
    }
}
