//! Token storage and request-forgery protection.
//!
//! Tokens live in process memory first. A copy is written to [`LocalStore`]
//! so a restarted client can pick its session back up. That copy is XOR'd
//! against a fixed key and base64 encoded: it keeps tokens out of plain
//! sight in the data directory and nothing more. Anyone who can read the
//! data directory and this source can recover them.

use crate::storage::LocalStore;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parking_lot::RwLock;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

const OBFUSCATION_KEY: &[u8] = b"MindBridge_2024_SecureKey";
const BACKUP_PREFIX: &str = "_sec_";
const MIGRATION_MARKER: &str = "_token_migrated";
const LEGACY_TOKEN_KEYS: [&str; 2] = ["access_token", "refresh_token"];

pub const ACCESS_TOKEN: &str = "access_token";
pub const REFRESH_TOKEN: &str = "refresh_token";

fn obfuscate(value: &str) -> String {
    let mixed: Vec<u8> = value
        .bytes()
        .zip(OBFUSCATION_KEY.iter().cycle())
        .map(|(byte, key)| byte ^ key)
        .collect();
    STANDARD.encode(mixed)
}

fn deobfuscate(encoded: &str) -> Option<String> {
    if encoded.is_empty() {
        return None;
    }
    let mixed = STANDARD.decode(encoded.trim()).ok()?;
    let plain: Vec<u8> = mixed
        .into_iter()
        .zip(OBFUSCATION_KEY.iter().cycle())
        .map(|(byte, key)| byte ^ key)
        .collect();
    String::from_utf8(plain).ok().filter(|value| !value.is_empty())
}

fn backup_key(key: &str) -> String {
    format!("{BACKUP_PREFIX}{key}")
}

/// In-memory token map backed by an obfuscated copy in local storage.
#[derive(Clone)]
pub struct CredentialStore {
    memory: Arc<RwLock<HashMap<String, String>>>,
    backup: LocalStore,
}

impl CredentialStore {
    pub fn new(backup: LocalStore) -> Self {
        Self {
            memory: Arc::new(RwLock::new(HashMap::new())),
            backup,
        }
    }

    pub fn set_token(&self, key: &str, value: &str) {
        self.memory.write().insert(key.to_string(), value.to_string());
        if let Err(err) = self.backup.set_item(&backup_key(key), &obfuscate(value)) {
            warn!(%err, key, "failed to back up credential");
        }
    }

    /// Returns `None` when the token is missing or its backup cannot be
    /// decoded.
    pub fn get_token(&self, key: &str) -> Option<String> {
        if let Some(value) = self.memory.read().get(key) {
            return Some(value.clone());
        }

        let encoded = match self.backup.get_item(&backup_key(key)) {
            Ok(Some(encoded)) => encoded,
            Ok(None) => return None,
            Err(err) => {
                debug!(%err, key, "credential backup unreadable");
                return None;
            }
        };
        let value = deobfuscate(&encoded)?;
        self.memory.write().insert(key.to_string(), value.clone());
        Some(value)
    }

    pub fn remove_token(&self, key: &str) {
        self.memory.write().remove(key);
        if let Err(err) = self.backup.remove_item(&backup_key(key)) {
            warn!(%err, key, "failed to remove credential backup");
        }
    }

    pub fn clear_all(&self) {
        self.memory.write().clear();
        let keys = match self.backup.keys() {
            Ok(keys) => keys,
            Err(err) => {
                warn!(%err, "failed to enumerate credential backups");
                return;
            }
        };
        for key in keys.iter().filter(|key| key.starts_with(BACKUP_PREFIX)) {
            if let Err(err) = self.backup.remove_item(key) {
                warn!(%err, key = key.as_str(), "failed to remove credential backup");
            }
        }
    }

    /// Move plaintext tokens left by older clients into the obfuscated store.
    /// Runs at most once per data directory.
    pub fn migrate_legacy_tokens(&self) {
        match self.backup.get_item(MIGRATION_MARKER) {
            Ok(Some(_)) => return,
            Ok(None) => {}
            Err(err) => {
                debug!(%err, "skipping credential migration");
                return;
            }
        }

        for key in LEGACY_TOKEN_KEYS {
            if let Ok(Some(value)) = self.backup.get_item(key) {
                if !value.is_empty() {
                    self.set_token(key, &value);
                }
                if let Err(err) = self.backup.remove_item(key) {
                    warn!(%err, key, "failed to remove plaintext token");
                }
            }
        }

        if let Err(err) = self.backup.set_item(MIGRATION_MARKER, "true") {
            warn!(%err, "failed to record credential migration");
        }
    }
}

/// Per-process anti-forgery token sent as `X-CSRF-Token`.
#[derive(Clone, Default)]
pub struct CsrfGuard {
    token: Arc<RwLock<Option<String>>>,
}

impl CsrfGuard {
    pub const HEADER: &'static str = "X-CSRF-Token";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> String {
        if let Some(token) = self.token.read().as_ref() {
            return token.clone();
        }
        let mut slot = self.token.write();
        slot.get_or_insert_with(generate_csrf_token).clone()
    }

    pub fn refresh(&self) -> String {
        let token = generate_csrf_token();
        *self.token.write() = Some(token.clone());
        token
    }
}

fn generate_csrf_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}
