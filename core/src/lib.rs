pub mod api;
pub mod auth;
pub mod config;
pub mod ids;
pub mod locale;
pub mod persist;
pub mod security;
pub mod state;
pub mod storage;
pub mod telemetry;

pub use api::{ApiClient, ApiError, ChatResponseFormatted, EmotionData, RetryPolicy};
pub use auth::{AuthContext, AuthError, AuthState};
pub use config::{ClientSettings, ConfigError};
pub use locale::Language;
pub use security::{CredentialStore, CsrfGuard};
pub use state::{ChatCoordinator, ChatSettings, ChatSnapshot, Message, MessageRole};
pub use storage::{LocalStore, StorageError};
