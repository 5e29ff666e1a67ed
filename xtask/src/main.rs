use anyhow::{ensure, Result};
use clap::{Parser, Subcommand};
use mindbridge_core::api::mock::ScriptedTransport;
use mindbridge_core::{
    telemetry, ApiClient, AuthContext, ChatCoordinator, ClientSettings, CredentialStore, CsrfGuard,
    LocalStore,
};
use serde_json::json;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "xtask", version, about = "Automation helpers for MindBridge")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run auth, two chat exchanges and a restore against a scripted backend.
    Smoke,
}

fn main() -> Result<()> {
    telemetry::init_tracing(EnvFilter::new("info"))?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Smoke => smoke_test(),
    }
}

fn build(settings: &ClientSettings, store: &LocalStore, transport: &ScriptedTransport) -> ChatCoordinator {
    let api = ApiClient::new(
        settings.api_base_url.clone(),
        Arc::new(transport.clone()),
        CredentialStore::new(store.clone()),
        CsrfGuard::new(),
        settings.retry_policy(),
    );
    let auth = AuthContext::new(api.clone(), store.clone(), settings.language);
    ChatCoordinator::new(api, auth, store.clone(), settings.chat_settings())
}

fn smoke_test() -> Result<()> {
    let runtime = Runtime::new()?;
    let settings = ClientSettings::default();
    let store = LocalStore::in_memory();
    let transport = ScriptedTransport::new();
    transport
        .push_json(
            200,
            json!({"access_token": "smoke-access", "refresh_token": "smoke-refresh", "user_id": "user_smoke"}),
        )
        .push_json(
            200,
            json!({"session_id": "session_smoke", "response": "반가워요.", "emotion": {"label": "calm"}}),
        )
        .push_json(
            200,
            json!({"session_id": "session_smoke", "response_text": "오늘 하루는 어땠나요?",
                   "emotion_analysis": {"primary_emotion": "hopeful", "intensity": 0.6}}),
        );

    runtime.block_on(async {
        let chat = build(&settings, &store, &transport);
        let auth = chat.auth().initialize().await;
        info!(user_id = auth.user_id.as_str(), authenticated = auth.is_authenticated, "signed in");

        chat.send_message("안녕하세요").await;
        chat.send_message("요즘 잠을 잘 못 자요").await;
        chat.flush().await;
        let first = chat.snapshot();
        ensure!(first.error.is_none(), "chat failed: {:?}", first.error);
        ensure!(first.messages.len() == 4, "expected 4 messages, got {}", first.messages.len());

        let restarted = build(&settings, &store, &transport);
        restarted.auth().initialize().await;
        restarted.restore()?;
        let restored = restarted.snapshot();
        ensure!(
            restored.messages == first.messages,
            "restored conversation differs from the saved one"
        );
        info!(
            messages = restored.messages.len(),
            session_id = restored.session_id.as_deref().unwrap_or("-"),
            requests = transport.calls(),
            "smoke test conversation restored"
        );
        Ok(())
    })
}
