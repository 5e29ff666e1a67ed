use crate::config::storage_root;
use crate::ui::{help_text, render_message, render_update};
use anyhow::{Context, Result};
use mindbridge_core::api::{HealthStatus, HttpTransport, ReqwestTransport, SessionSummary};
use mindbridge_core::{
    ApiClient, AuthContext, ChatCoordinator, ClientSettings, CredentialStore, CsrfGuard, Language,
    LocalStore,
};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Continue(Vec<String>),
    Quit,
}

/// Client plumbing shared by every command: storage, credentials, the API
/// client and the (not yet initialized) auth context.
#[derive(Clone)]
pub struct Services {
    pub store: LocalStore,
    pub api: ApiClient,
    pub auth: AuthContext,
}

impl Services {
    pub fn new(settings: &ClientSettings, store: LocalStore, transport: Arc<dyn HttpTransport>) -> Self {
        let credentials = CredentialStore::new(store.clone());
        let api = ApiClient::new(
            settings.api_base_url.clone(),
            transport,
            credentials,
            CsrfGuard::new(),
            settings.retry_policy(),
        );
        let auth = AuthContext::new(api.clone(), store.clone(), settings.language);
        Self { store, api, auth }
    }

    /// Production wiring: disk store under the data directory and a reqwest
    /// transport.
    pub fn connect(settings: &ClientSettings) -> Result<Self> {
        let root = storage_root(settings);
        let store = match LocalStore::open(&root) {
            Ok(store) => store,
            Err(err) => {
                warn!(%err, root = %root.display(), "local storage unavailable, nothing will be saved");
                LocalStore::unavailable()
            }
        };
        let transport = ReqwestTransport::new(settings.request_timeout)
            .context("failed to create HTTP client")?;
        Ok(Self::new(settings, store, Arc::new(transport)))
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        Ok(self.api.check_health().await?)
    }

    pub fn logout(&self) {
        self.auth.logout();
    }
}

pub struct ChatApp {
    services: Services,
    coordinator: ChatCoordinator,
    language: Language,
}

impl ChatApp {
    /// Sign in, then restore the previous conversation. Needs a tokio runtime.
    pub async fn start(services: Services, settings: &ClientSettings) -> Self {
        let auth_state = services.auth.initialize().await;
        info!(
            authenticated = auth_state.is_authenticated,
            "auth context ready"
        );

        let coordinator = ChatCoordinator::new(
            services.api.clone(),
            services.auth.clone(),
            services.store.clone(),
            settings.chat_settings(),
        );
        if let Err(err) = coordinator.restore() {
            warn!(%err, "could not restore previous conversation");
        }

        Self {
            services,
            coordinator,
            language: settings.language,
        }
    }

    pub fn coordinator(&self) -> &ChatCoordinator {
        &self.coordinator
    }

    /// Lines for the conversation restored at start-up.
    pub fn transcript(&self) -> Vec<String> {
        self.coordinator
            .snapshot()
            .messages
            .iter()
            .map(|message| render_message(message, self.language))
            .collect()
    }

    pub async fn handle_line(&self, line: &str) -> LineOutcome {
        let line = line.trim();
        if line.is_empty() {
            return LineOutcome::Continue(Vec::new());
        }

        let notice = |ko: &'static str, en: &'static str| {
            LineOutcome::Continue(vec![self.language.pick(ko, en).to_string()])
        };
        match line {
            "/quit" | "/exit" => LineOutcome::Quit,
            "/help" => LineOutcome::Continue(vec![help_text(self.language).to_string()]),
            "/clear" => {
                self.coordinator.clear_chat();
                notice("대화 기록을 지웠습니다.", "Conversation cleared.")
            }
            "/logout" => {
                self.services.logout();
                notice("로그아웃했습니다.", "Signed out.")
            }
            "/dismiss" => {
                self.coordinator.dismiss_crisis_alert();
                LineOutcome::Continue(Vec::new())
            }
            command if command.starts_with('/') => notice(
                "알 수 없는 명령입니다. /help 를 입력해 보세요.",
                "Unknown command. Try /help.",
            ),
            message => LineOutcome::Continue(self.exchange(message).await),
        }
    }

    /// Send one message and render what changed.
    pub async fn exchange(&self, message: &str) -> Vec<String> {
        let seen = self.coordinator.snapshot().messages.len();
        self.coordinator.send_message(message).await;
        let snapshot = self.coordinator.snapshot();
        if snapshot.error.is_some() {
            self.coordinator.clear_error();
        }
        render_update(&snapshot, seen, self.language)
    }

    pub async fn summary(&self) -> Result<Option<SessionSummary>> {
        let Some(session_id) = self.coordinator.snapshot().session_id else {
            return Ok(None);
        };
        let summary = self.services.api.session_summary(&session_id).await?;
        Ok(Some(summary))
    }

    pub async fn run<R, W>(&self, input: R, mut out: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        for line in self.transcript() {
            writeln!(out, "{line}")?;
        }
        writeln!(
            out,
            "{}",
            self.language.pick(
                "MindBridge 에 오신 것을 환영합니다. /help 로 명령을 볼 수 있어요.",
                "Welcome to MindBridge. Type /help for commands.",
            )
        )?;

        let mut lines = input.lines();
        loop {
            write!(out, "> ")?;
            out.flush()?;
            let Some(line) = lines.next_line().await? else {
                break;
            };
            match self.handle_line(&line).await {
                LineOutcome::Quit => break,
                LineOutcome::Continue(output) => {
                    for entry in output {
                        writeln!(out, "{entry}")?;
                    }
                }
            }
        }

        self.coordinator.flush().await;
        Ok(())
    }

    pub async fn shutdown(&self) {
        self.coordinator.flush().await;
    }
}
