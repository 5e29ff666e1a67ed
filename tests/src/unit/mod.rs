mod auth_tests;
mod credential_tests;
mod render_tests;
mod state_tests;

use mindbridge_core::api::mock::ScriptedTransport;
use mindbridge_core::api::RetryPolicy;
use mindbridge_core::{
    ApiClient, AuthContext, ChatCoordinator, ChatSettings, CredentialStore, CsrfGuard, Language,
    LocalStore,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

pub(crate) fn test_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

/// Timers auto-advance whenever the runtime is idle.
pub(crate) fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .expect("runtime")
}

pub(crate) struct Harness {
    pub store: LocalStore,
    pub transport: ScriptedTransport,
    pub auth: AuthContext,
    pub chat: ChatCoordinator,
}

impl Harness {
    /// Builds the full stack without signing in.
    pub fn new(store: LocalStore) -> Self {
        let transport = ScriptedTransport::new();
        let api = ApiClient::new(
            "http://backend.test",
            Arc::new(transport.clone()),
            CredentialStore::new(store.clone()),
            CsrfGuard::new(),
            RetryPolicy::default(),
        );
        let auth = AuthContext::new(api.clone(), store.clone(), Language::Ko);
        let chat = ChatCoordinator::new(api, auth.clone(), store.clone(), ChatSettings::default());
        Self {
            store,
            transport,
            auth,
            chat,
        }
    }

    pub async fn signed_in(store: LocalStore) -> Self {
        let harness = Self::new(store);
        harness.transport.push_json(
            200,
            json!({"access_token": "access-1", "refresh_token": "refresh-1", "user_id": "user_test"}),
        );
        harness.auth.initialize().await;
        harness
    }
}

pub(crate) fn v1_reply(session_id: &str, text: &str, emotion: &str) -> Value {
    json!({
        "session_id": session_id,
        "response": text,
        "emotion": {"label": emotion, "confidence": 0.8, "intensity": 0.6},
        "is_crisis": false,
        "suggested_techniques": ["deep breathing"]
    })
}

pub(crate) fn crisis_reply(session_id: &str) -> Value {
    json!({
        "session_id": session_id,
        "response_text": "You matter. Please reach out right now.",
        "emotion_analysis": {"primary_emotion": "hopeless", "intensity": 0.95},
        "supervisor_feedback": {"intervention_needed": true},
        "safety_resources": {"Counselling centre": "1393"}
    })
}

pub(crate) const DEBOUNCE_PASSED: Duration = Duration::from_millis(1_500);
