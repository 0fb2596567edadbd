//! Secure credential handling using the secrecy crate
//!
//! The Cosmos DB account key is held as a `Secret` so it is zeroed on drop
//! and redacted in Debug output. Access requires an explicit
//! `expose_secret()` call.

use secrecy::{CloneableSecret, DebugSecret, Secret, SerializableSecret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

/// Newtype wrapper for String that implements the traits `Secret` requires
#[derive(Clone, Debug, Zeroize)]
#[zeroize(drop)]
pub struct SecretValue(String);

impl CloneableSecret for SecretValue {}
impl DebugSecret for SecretValue {}
impl SerializableSecret for SecretValue {}

impl From<String> for SecretValue {
    fn from(s: String) -> Self {
        SecretValue(s)
    }
}

impl AsRef<str> for SecretValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl SecretValue {
    /// Check if the secret value is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for SecretValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretValue)
    }
}

/// Type alias for a protected string credential
pub type SecretString = Secret<SecretValue>;

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret: SecretString = Secret::new(SecretValue::from("master-key".to_string()));
        let debug = format!("{secret:?}");
        assert!(!debug.contains("master-key"));
    }

    #[test]
    fn test_secret_expose() {
        let secret: SecretString = Secret::new(SecretValue::from("master-key".to_string()));
        assert_eq!(secret.expose_secret().as_ref(), "master-key");
    }

    #[test]
    fn test_secret_deserialize() {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            key: SecretString,
        }
        let wrapper: Wrapper = toml::from_str(r#"key = "abc""#).unwrap();
        assert_eq!(wrapper.key.expose_secret().as_ref(), "abc");
    }
}
