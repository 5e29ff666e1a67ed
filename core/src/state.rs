use crate::api::{ApiClient, ChatResponseFormatted, EmotionData};
use crate::auth::{AuthContext, AuthError};
use crate::ids::{now_millis, time_random_id};
use crate::locale::Language;
use crate::persist::{DebouncedWriter, WriteOp};
use crate::storage::LocalStore;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const SESSION_ID_KEY: &str = "current_session_id";
pub const MESSAGES_KEY: &str = "current_messages";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_crisis: Option<bool>,
    pub timestamp: i64,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: time_random_id(),
            role: MessageRole::User,
            content: content.into(),
            emotion: None,
            is_crisis: None,
            timestamp: now_millis(),
        }
    }

    pub fn assistant(reply: &ChatResponseFormatted) -> Self {
        Self {
            id: time_random_id(),
            role: MessageRole::Assistant,
            content: reply.response_text.clone(),
            emotion: Some(reply.emotion.label.clone()),
            is_crisis: Some(reply.is_crisis),
            timestamp: now_millis(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatSettings {
    pub language: Language,
    pub max_stored_messages: usize,
    pub storage_debounce: Duration,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            language: Language::Ko,
            max_stored_messages: 50,
            storage_debounce: Duration::from_millis(1000),
        }
    }
}

/// Point-in-time copy of everything a front end renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatSnapshot {
    pub messages: Vec<Message>,
    pub is_loading: bool,
    pub session_id: Option<String>,
    pub current_emotion: Option<EmotionData>,
    pub techniques: Vec<String>,
    pub show_crisis_alert: bool,
    pub error: Option<String>,
    pub safety_resources: Option<BTreeMap<String, String>>,
}

#[derive(Default)]
struct InnerState {
    messages: Vec<Message>,
    is_loading: bool,
    session_id: Option<String>,
    current_emotion: Option<EmotionData>,
    techniques: Vec<String>,
    show_crisis_alert: bool,
    error: Option<String>,
    safety_resources: Option<BTreeMap<String, String>>,
    restored: bool,
    /// Bumped by `clear_chat` so replies to a cleared conversation are dropped.
    generation: u64,
}

impl InnerState {
    fn snapshot(&self) -> ChatSnapshot {
        ChatSnapshot {
            messages: self.messages.clone(),
            is_loading: self.is_loading,
            session_id: self.session_id.clone(),
            current_emotion: self.current_emotion.clone(),
            techniques: self.techniques.clone(),
            show_crisis_alert: self.show_crisis_alert,
            error: self.error.clone(),
            safety_resources: self.safety_resources.clone(),
        }
    }
}

/// Owns one conversation: optimistic sends, rollback and local persistence.
#[derive(Clone)]
pub struct ChatCoordinator {
    inner: Arc<RwLock<InnerState>>,
    api: ApiClient,
    auth: AuthContext,
    store: LocalStore,
    writer: DebouncedWriter,
    settings: ChatSettings,
}

impl ChatCoordinator {
    /// Spawns the message writer, so this needs a tokio runtime.
    pub fn new(api: ApiClient, auth: AuthContext, store: LocalStore, settings: ChatSettings) -> Self {
        let sink_store = store.clone();
        let writer = DebouncedWriter::spawn(settings.storage_debounce, move |op| {
            let result = match op {
                WriteOp::Put(json) => sink_store.set_item(MESSAGES_KEY, &json),
                WriteOp::Remove => sink_store.remove_item(MESSAGES_KEY),
            };
            if let Err(err) = result {
                warn!(%err, "failed to persist messages");
            }
        });

        Self {
            inner: Arc::new(RwLock::new(InnerState::default())),
            api,
            auth,
            store,
            writer,
            settings,
        }
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Load the previous conversation from local storage. Only the first call
    /// after auth is initialized does anything; it returns `Ok(true)`.
    pub fn restore(&self) -> Result<bool, AuthError> {
        self.auth.require()?;

        let mut inner = self.inner.write();
        if inner.restored {
            return Ok(false);
        }
        inner.restored = true;

        inner.session_id = match self.store.get_item(SESSION_ID_KEY) {
            Ok(value) => value.filter(|id| !id.is_empty()),
            Err(err) => {
                debug!(%err, "no stored session id");
                None
            }
        };
        inner.messages = match self.store.get_item(MESSAGES_KEY) {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|err| {
                warn!(%err, "discarding unreadable stored messages");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(err) => {
                debug!(%err, "no stored messages");
                Vec::new()
            }
        };
        debug!(
            messages = inner.messages.len(),
            session = inner.session_id.is_some(),
            "restored conversation"
        );
        Ok(true)
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        self.inner.read().snapshot()
    }

    pub fn safety_resources(&self) -> Option<BTreeMap<String, String>> {
        self.inner.read().safety_resources.clone()
    }

    /// Send one user message and wait for the reply. Failures end up in
    /// [`ChatSnapshot::error`]; this never reports them to the caller.
    pub async fn send_message(&self, content: &str) {
        if content.trim().is_empty() {
            return;
        }
        let Some(user_id) = self.auth.user_id() else {
            debug!("send ignored: no user id yet");
            return;
        };

        let (pending, session_id) = {
            let mut inner = self.inner.write();
            if inner.is_loading {
                debug!("send ignored: a reply is already pending");
                return;
            }
            inner.is_loading = true;
            inner.error = None;
            let message = Message::user(content);
            let pending = PendingSend {
                coordinator: self,
                message_id: message.id.clone(),
                generation: inner.generation,
                settled: false,
            };
            inner.messages.push(message);
            self.persist_messages(&inner.messages);
            (pending, inner.session_id.clone())
        };

        let result = self
            .api
            .send_message(content, &user_id, session_id.as_deref(), self.settings.language)
            .await;
        match result {
            Ok(reply) => pending.confirm(reply),
            Err(err) => {
                warn!(%err, "chat request failed");
                pending.fail(err.user_message(self.settings.language).to_string());
            }
        }
    }

    /// Forget the conversation both in memory and in local storage.
    pub fn clear_chat(&self) {
        {
            let mut inner = self.inner.write();
            let generation = inner.generation.wrapping_add(1);
            let restored = inner.restored;
            *inner = InnerState {
                restored,
                generation,
                ..InnerState::default()
            };
        }
        self.writer.discard();
        if let Err(err) = self.store.remove_item(MESSAGES_KEY) {
            warn!(%err, "failed to remove stored messages");
        }
        if let Err(err) = self.store.remove_item(SESSION_ID_KEY) {
            warn!(%err, "failed to remove stored session id");
        }
    }

    pub fn dismiss_crisis_alert(&self) {
        self.inner.write().show_crisis_alert = false;
    }

    pub fn clear_error(&self) {
        self.inner.write().error = None;
    }

    /// Write the pending message list without waiting for the debounce window.
    pub async fn flush(&self) {
        self.writer.flush().await;
    }

    fn persist_messages(&self, messages: &[Message]) {
        if messages.is_empty() {
            self.writer.discard();
            return;
        }
        let start = messages.len().saturating_sub(self.settings.max_stored_messages);
        match serde_json::to_string(&messages[start..]) {
            Ok(json) => self.writer.schedule(json),
            Err(err) => warn!(%err, "failed to encode messages"),
        }
    }

    fn persist_session_id(&self, session_id: &str) {
        if let Err(err) = self.store.set_item(SESSION_ID_KEY, session_id) {
            warn!(%err, "failed to persist session id");
        }
    }
}

/// The optimistic half of a send. Unless confirmed, dropping it removes the
/// user message again, so a cancelled send leaves no trace.
struct PendingSend<'a> {
    coordinator: &'a ChatCoordinator,
    message_id: String,
    generation: u64,
    settled: bool,
}

impl PendingSend<'_> {
    fn confirm(mut self, reply: ChatResponseFormatted) {
        self.settled = true;
        let coordinator = self.coordinator;
        let mut inner = coordinator.inner.write();
        if inner.generation != self.generation {
            debug!("dropping reply for a cleared conversation");
            return;
        }

        if inner.session_id.as_deref() != Some(reply.session_id.as_str()) {
            coordinator.persist_session_id(&reply.session_id);
            inner.session_id = Some(reply.session_id.clone());
        }
        inner.current_emotion = Some(reply.emotion.clone());
        inner.techniques = reply.suggested_techniques.clone();
        inner.safety_resources = reply.safety_resources.clone();
        if reply.is_crisis {
            inner.show_crisis_alert = true;
        }
        inner.messages.push(Message::assistant(&reply));
        inner.is_loading = false;
        coordinator.persist_messages(&inner.messages);
    }

    fn fail(mut self, error: String) {
        self.settled = true;
        self.rollback(Some(error));
    }

    fn rollback(&self, error: Option<String>) {
        let coordinator = self.coordinator;
        let mut inner = coordinator.inner.write();
        if inner.generation != self.generation {
            return;
        }
        inner.messages.retain(|message| message.id != self.message_id);
        inner.is_loading = false;
        if error.is_some() {
            inner.error = error;
        }
        coordinator.persist_messages(&inner.messages);
    }
}

impl Drop for PendingSend<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.rollback(None);
        }
    }
}
