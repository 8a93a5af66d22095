use clap::Parser;
use formrelay::app;
use formrelay::config::RelayConfig;
use std::path::PathBuf;

/// Records poll and contact-form submissions into append-only response sheets
#[derive(Parser, Debug)]
#[command(name = "formrelay", version)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, overrides the config file
    #[arg(short, long)]
    bind: Option<String>,

    /// Directory for response sheets, overrides the config file
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = RelayConfig::load(cli.config.as_deref())?;

    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir;
    }

    log::info!(
        "Storing responses in {}, notifications {}",
        config.storage.data_dir.display(),
        if config.any_notifications() { "on" } else { "off" }
    );

    app::run(config).await
}
