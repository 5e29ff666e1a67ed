use anyhow::Context;
use clap::{Parser, Subcommand};
use mindbridge::config::{load_settings, Overrides};
use mindbridge::{ChatApp, Services};
use mindbridge_core::{telemetry, ClientSettings, Language};
use std::path::PathBuf;
use tokio::io::BufReader;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mindbridge", version, about = "MindBridge counselling chat in the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    /// Directory for session data and saved credentials.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Backend base URL, e.g. https://api.example.com
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Conversation language: ko or en.
    #[arg(long, global = true)]
    language: Option<Language>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive chat (default).
    Chat,
    /// Send a single message and print the reply.
    Say {
        #[arg(required = true)]
        message: Vec<String>,
    },
    /// Summarize the stored session.
    Summary,
    /// Check that the backend is reachable.
    Health,
    /// Forget the stored sign-in tokens.
    Logout,
}

fn main() -> anyhow::Result<()> {
    telemetry::init_tracing(EnvFilter::from_default_env())?;

    let cli = Cli::parse();
    let overrides = Overrides {
        data_dir: cli.data_dir.clone(),
        api_url: cli.api_url.clone(),
        language: cli.language,
    };
    let settings = load_settings(&overrides)?;

    let runtime = Runtime::new().context("failed to start tokio runtime")?;
    runtime.block_on(run(cli.command.unwrap_or(Command::Chat), settings))
}

async fn run(command: Command, settings: ClientSettings) -> anyhow::Result<()> {
    let services = Services::connect(&settings)?;
    match command {
        Command::Health => {
            let health = services.health().await?;
            println!("{} ({})", health.status, health.version);
        }
        Command::Logout => {
            services.logout();
            println!("{}", settings.language.pick("로그아웃했습니다.", "Signed out."));
        }
        Command::Summary => {
            let app = ChatApp::start(services, &settings).await;
            match app.summary().await? {
                Some(summary) => println!("{}", serde_json::to_string_pretty(&summary)?),
                None => println!(
                    "{}",
                    settings
                        .language
                        .pick("저장된 대화가 없습니다.", "No stored session.")
                ),
            }
        }
        Command::Say { message } => {
            let app = ChatApp::start(services, &settings).await;
            for line in app.exchange(&message.join(" ")).await {
                println!("{line}");
            }
            app.shutdown().await;
        }
        Command::Chat => {
            let app = ChatApp::start(services, &settings).await;
            let stdin = BufReader::new(tokio::io::stdin());
            app.run(stdin, std::io::stdout()).await?;
        }
    }
    Ok(())
}
