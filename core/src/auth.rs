use crate::api::ApiClient;
use crate::ids::prefixed_id;
use crate::locale::Language;
use crate::security::{CredentialStore, ACCESS_TOKEN, REFRESH_TOKEN};
use crate::storage::LocalStore;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEVICE_ID_KEY: &str = "device_id";
pub const USER_ID_KEY: &str = "user_id";
pub const ANONYMOUS_ID_KEY: &str = "anonymous_id";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("auth context used before initialize()")]
    NotInitialized,
}

/// Who the client is talking as.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthState {
    pub is_authenticated: bool,
    pub user_id: String,
    pub anonymous_id: Option<String>,
}

/// Anonymous sign-in handle shared by everything that needs a user id or a
/// bearer token. Cloning shares the same state.
#[derive(Clone)]
pub struct AuthContext {
    state: Arc<RwLock<Option<AuthState>>>,
    api: ApiClient,
    credentials: CredentialStore,
    store: LocalStore,
    language: Language,
}

impl AuthContext {
    pub fn new(api: ApiClient, store: LocalStore, language: Language) -> Self {
        let credentials = api.credentials().clone();
        Self {
            state: Arc::new(RwLock::new(None)),
            api,
            credentials,
            store,
            language,
        }
    }

    /// Sign in, reusing stored credentials when present. Any failure leaves
    /// the context initialized but unauthenticated.
    pub async fn initialize(&self) -> AuthState {
        self.credentials.migrate_legacy_tokens();

        let stored_user = self.read(USER_ID_KEY);
        if let (Some(_), Some(user_id)) = (self.credentials.get_token(ACCESS_TOKEN), &stored_user) {
            debug!(user_id = user_id.as_str(), "reusing stored credentials");
            return self.install(AuthState {
                is_authenticated: true,
                user_id: user_id.clone(),
                anonymous_id: self.read(ANONYMOUS_ID_KEY),
            });
        }

        let device_id = self.read_or_create(DEVICE_ID_KEY, "device");
        let user_id = match stored_user {
            Some(user_id) => user_id,
            None => self.read_or_create(USER_ID_KEY, "user"),
        };

        let state = match self.api.anonymous_auth(&device_id, self.language).await {
            Ok(response) => {
                if let Some(token) = response.access_token.as_deref() {
                    self.credentials.set_token(ACCESS_TOKEN, token);
                }
                if let Some(token) = response.refresh_token.as_deref() {
                    self.credentials.set_token(REFRESH_TOKEN, token);
                }
                let user_id = response
                    .user_id
                    .filter(|id| !id.is_empty())
                    .unwrap_or(user_id);
                self.write(USER_ID_KEY, &user_id);
                if let Some(anonymous_id) = response.anonymous_id.as_deref() {
                    self.write(ANONYMOUS_ID_KEY, anonymous_id);
                }
                info!(user_id = user_id.as_str(), "anonymous sign-in complete");
                AuthState {
                    is_authenticated: response.access_token.is_some(),
                    user_id,
                    anonymous_id: response.anonymous_id,
                }
            }
            Err(err) => {
                warn!(%err, "anonymous sign-in failed, continuing unauthenticated");
                AuthState {
                    is_authenticated: false,
                    user_id,
                    anonymous_id: None,
                }
            }
        };
        self.install(state)
    }

    pub fn teardown(&self) {
        self.state.write().take();
    }

    pub fn require(&self) -> Result<AuthState, AuthError> {
        self.state.read().clone().ok_or(AuthError::NotInitialized)
    }

    pub fn is_initialized(&self) -> bool {
        self.state.read().is_some()
    }

    pub fn user_id(&self) -> Option<String> {
        self.state.read().as_ref().map(|state| state.user_id.clone())
    }

    pub fn access_token(&self) -> Option<String> {
        self.credentials.get_token(ACCESS_TOKEN)
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Forget tokens and the anonymous id. The user and device ids are kept
    /// so the next sign-in maps to the same person.
    pub fn logout(&self) {
        self.credentials.remove_token(ACCESS_TOKEN);
        self.credentials.remove_token(REFRESH_TOKEN);
        if let Err(err) = self.store.remove_item(ANONYMOUS_ID_KEY) {
            warn!(%err, "failed to remove anonymous id");
        }
        if let Some(state) = self.state.write().as_mut() {
            state.is_authenticated = false;
            state.anonymous_id = None;
        }
    }

    fn install(&self, state: AuthState) -> AuthState {
        *self.state.write() = Some(state.clone());
        state
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get_item(key) {
            Ok(value) => value.filter(|value| !value.is_empty()),
            Err(err) => {
                debug!(%err, key, "local storage read failed");
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(err) = self.store.set_item(key, value) {
            warn!(%err, key, "local storage write failed");
        }
    }

    fn read_or_create(&self, key: &str, prefix: &str) -> String {
        if let Some(value) = self.read(key) {
            return value;
        }
        let value = prefixed_id(prefix);
        self.write(key, &value);
        value
    }
}
