use idlewatch::commands::Cli;
use idlewatch::libs::messages::macros::is_debug_mode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if is_debug_mode() {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("idlewatch=debug"));
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
    Cli::menu().await
}
