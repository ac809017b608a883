//! Occupant registry
//!
//! A flat JSON object keyed by username:
//!
//! ```json
//! { "alice": { "age": 3, "sex": 0 }, "bob": { "age": 1, "sex": 1 } }
//! ```
//!
//! Single writer, interactive use only. Re-registering a name replaces the
//! old profile.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, info};
use stratus_ml::ComfortProfile;

use crate::{AgentError, AgentResult};

/// Username → profile store backed by one JSON file
#[derive(Debug, Clone)]
pub struct UserRegistry {
    path: PathBuf,
    users: BTreeMap<String, ComfortProfile>,
}

impl UserRegistry {
    /// Load `path`; a missing file is an empty registry
    pub fn load(path: impl Into<PathBuf>) -> AgentResult<Self> {
        let path = path.into();
        let users = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw).map_err(|source| AgentError::Json {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No registry at {}, starting empty", path.display());
                BTreeMap::new()
            }
            Err(source) => return Err(AgentError::Io { path, source }),
        };

        Ok(Self { path, users })
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Profile for `name`
    pub fn get(&self, name: &str) -> Option<ComfortProfile> {
        self.users.get(name).copied()
    }

    /// Profile for `name`, or a registry error naming the missing user
    pub fn require(&self, name: &str) -> AgentResult<ComfortProfile> {
        self.get(name)
            .ok_or_else(|| AgentError::Registry(format!("user {:?} is not registered", name)))
    }

    /// Validate and store a profile, replacing any previous one
    ///
    /// Only updates memory; call `save` to persist.
    pub fn register(&mut self, name: &str, age: u8, sex: u8) -> AgentResult<ComfortProfile> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AgentError::Registry("username is empty".into()));
        }
        let profile = ComfortProfile::new(age, sex)?;
        if self.users.insert(name.to_string(), profile).is_some() {
            info!("Replaced profile for {}", name);
        }
        Ok(profile)
    }

    /// Registered usernames, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.users.keys().map(String::as_str)
    }

    /// Number of registered users
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Check if nobody is registered
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Write the registry back to its file
    pub fn save(&self) -> AgentResult<()> {
        let raw = serde_json::to_string_pretty(&self.users).map_err(|source| AgentError::Json {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, raw).map_err(|source| AgentError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!("Saved {} users to {}", self.users.len(), self.path.display());
        Ok(())
    }
}
