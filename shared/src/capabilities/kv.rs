use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Username;
use crate::session::SessionRecord;
use crate::{AppError, ErrorKind};

pub const MAX_KEY_LENGTH: usize = 512;
pub const MAX_VALUE_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KvError {
    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("value too large: {size} bytes exceeds maximum of {max} bytes")]
    ValueTooLarge { size: usize, max: usize },

    #[error("serialization error: {message}")]
    Serialization { message: String },
}

impl From<KvError> for AppError {
    fn from(e: KvError) -> Self {
        let kind = match e {
            KvError::Serialization { .. } => ErrorKind::Serialization,
            KvError::InvalidKey { .. } | KvError::ValueTooLarge { .. } => ErrorKind::Storage,
        };
        AppError::new(kind, e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyNamespace {
    Session,
}

impl KeyNamespace {
    #[must_use]
    pub fn prefix(&self) -> &str {
        match self {
            KeyNamespace::Session => "session",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KvKey {
    namespace: KeyNamespace,
    key: String,
}

impl KvKey {
    pub fn new(namespace: KeyNamespace, key: impl Into<String>) -> Result<Self, KvError> {
        let key = key.into();
        Self::validate_key(&key)?;
        Ok(Self { namespace, key })
    }

    /// Key as handed to the shell's store.
    #[must_use]
    pub fn raw(&self) -> String {
        format!("{}:{}", self.namespace.prefix(), self.key)
    }

    fn validate_key(key: &str) -> Result<(), KvError> {
        let invalid = |reason: &str| KvError::InvalidKey {
            key: key.chars().take(50).collect(),
            reason: reason.to_string(),
        };

        if key.trim().is_empty() {
            return Err(invalid("key cannot be empty"));
        }
        if key.len() > MAX_KEY_LENGTH {
            return Err(invalid("key is too long"));
        }
        if key.contains("..") || key.starts_with('/') || key.starts_with('\\') {
            return Err(invalid("key cannot contain path segments"));
        }
        if key.chars().any(char::is_control) {
            return Err(invalid("key contains control characters"));
        }
        Ok(())
    }
}

/// Persisted form of a [`SessionRecord`].
#[derive(Serialize, Deserialize)]
pub struct StoredSession {
    pub username: String,
    pub token: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredSession {
    #[must_use]
    pub fn from_record(record: &SessionRecord) -> Self {
        Self {
            username: record.username.to_string(),
            token: record.token.expose_secret().clone(),
            expires_at: record.expires_at,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, KvError> {
        let data = serde_json::to_vec(self).map_err(|e| KvError::Serialization {
            message: e.to_string(),
        })?;
        if data.len() > MAX_VALUE_SIZE {
            return Err(KvError::ValueTooLarge {
                size: data.len(),
                max: MAX_VALUE_SIZE,
            });
        }
        Ok(data)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, KvError> {
        serde_json::from_slice(bytes).map_err(|e| KvError::Serialization {
            message: e.to_string(),
        })
    }

    pub fn into_record(self) -> Result<SessionRecord, KvError> {
        let username = Username::new(self.username).map_err(|e| KvError::Serialization {
            message: e.to_string(),
        })?;
        Ok(SessionRecord {
            username,
            token: SecretString::new(self.token),
            expires_at: self.expires_at,
        })
    }
}

impl std::fmt::Debug for StoredSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredSession")
            .field("username", &self.username)
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_validation() {
        assert!(KvKey::new(KeyNamespace::Session, "").is_err());
        assert!(KvKey::new(KeyNamespace::Session, "   ").is_err());
        assert!(KvKey::new(KeyNamespace::Session, "key\0value").is_err());
        assert!(KvKey::new(KeyNamespace::Session, "../etc/passwd").is_err());
        assert!(KvKey::new(KeyNamespace::Session, "a".repeat(MAX_KEY_LENGTH + 1)).is_err());
        assert!(KvKey::new(KeyNamespace::Session, "jwt_token").is_ok());
    }

    #[test]
    fn test_key_namespace_prefix() {
        let key = KvKey::new(KeyNamespace::Session, "jwt_token").unwrap();
        assert_eq!(key.raw(), "session:jwt_token");
    }

    #[test]
    fn test_stored_session_restores_record() {
        let stored = StoredSession {
            username: "thomas".into(),
            token: "abc.def.ghi".into(),
            expires_at: None,
        };
        let bytes = stored.encode().unwrap();
        let record = StoredSession::decode(&bytes).unwrap().into_record().unwrap();
        assert_eq!(record.username.as_str(), "thomas");
        assert_eq!(record.token.expose_secret(), "abc.def.ghi");
    }

    #[test]
    fn test_corrupted_session_is_rejected() {
        assert!(matches!(
            StoredSession::decode(b"{not json"),
            Err(KvError::Serialization { .. })
        ));

        let blank = StoredSession {
            username: " ".into(),
            token: "t".into(),
            expires_at: None,
        };
        assert!(blank.into_record().is_err());
    }

    #[test]
    fn test_debug_hides_token() {
        let stored = StoredSession {
            username: "thomas".into(),
            token: "very-secret".into(),
            expires_at: None,
        };
        assert!(!format!("{stored:?}").contains("very-secret"));
    }
}
