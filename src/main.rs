use anyhow::Context;

use medibot::chat::{ChatWidget, SessionConfig, SessionManager};
use medibot::cli;
use medibot::config::AssistantConfig;
use medibot::llm::BackendClient;
use medibot::triage::{AnalyzerConfig, SymptomAnalyzer, SymptomChecker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = AssistantConfig::from_env().context("Failed to load configuration")?;

    let client = BackendClient::initialize(config.backend, config.api_key.as_ref(), &config.model);

    eprintln!("🩺 MediBot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Backend: {} ({})", config.backend, config.model);
    if client.is_available() {
        eprintln!("   Assistant: online");
    } else {
        eprintln!("   Assistant: offline (set MEDIBOT_API_KEY to enable)");
    }
    eprintln!("   Type a message and press Enter. /help for commands, /quit to exit.\n");

    let sessions = SessionManager::new(SessionConfig::from(&config));
    let widget = ChatWidget::mount(&sessions, &client, &config.greeting);
    let checker = SymptomChecker::new(
        SymptomAnalyzer::new(AnalyzerConfig::from(&config)),
        client.clone(),
    );

    if let Some(greeting) = widget.transcript().last().await {
        println!("medibot> {}\n", greeting.text);
    }

    cli::run(&widget, &checker).await
}
