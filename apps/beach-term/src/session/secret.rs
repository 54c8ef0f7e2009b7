use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Correlates one initiation request with the server's room assignment.
/// A new secret is drawn for every connect and reconnect attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionSecret(String);

impl SessionSecret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub trait SecretSource: Send + Sync {
    fn generate(&self) -> SessionSecret;
}

/// Random v4 UUIDs; collisions between attempts are not a practical concern.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidSecrets;

impl SecretSource for UuidSecrets {
    fn generate(&self) -> SessionSecret {
        SessionSecret(Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn uuid_secrets_do_not_repeat() {
        let source = UuidSecrets;
        let drawn: HashSet<SessionSecret> = (0..1_000).map(|_| source.generate()).collect();
        assert_eq!(drawn.len(), 1_000);
    }

    #[test]
    fn secret_serializes_as_bare_string() {
        let secret = SessionSecret::new("abc");
        assert_eq!(serde_json::to_string(&secret).unwrap(), "\"abc\"");
    }
}
