use anyhow::Result;
use leave_assistant::chat_api::ChatConfig;
use leave_assistant::gui::run_gui;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ChatConfig::default();
    tracing::info!(endpoint = %config.endpoint, "starting assistant window");
    run_gui(config)
}
