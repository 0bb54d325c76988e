use super::nullable;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_REGISTRY: &str = "docker.io";

/// A stored login for a private image registry, the password never comes back.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RegistryCredential {
    #[serde(deserialize_with = "nullable")]
    pub id: i64,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub registry: String,
    #[serde(deserialize_with = "nullable")]
    pub username: String,
    pub created_at: Option<String>,
}

/// Body of `POST /api/v1/registry-credentials`.
#[derive(Clone, PartialEq, Serialize)]
pub struct NewCredential {
    pub name: String,
    pub registry: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for NewCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewCredential")
            .field("name", &self.name)
            .field("registry", &self.registry)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl NewCredential {
    /// Checks the required fields, an empty registry becomes Docker Hub.
    pub fn validate(&mut self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Name is required".to_string());
        }
        // the name is a path segment on delete
        if self.name.contains('/') {
            return Err("Name may not contain '/'".to_string());
        }
        if self.username.trim().is_empty() {
            return Err("Username is required".to_string());
        }
        if self.password.is_empty() {
            return Err("Password is required".to_string());
        }
        if self.registry.trim().is_empty() {
            self.registry = DEFAULT_REGISTRY.to_string();
        }
        Ok(())
    }
}
