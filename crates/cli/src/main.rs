use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "line2slack")]
#[command(about = "Relay LINE group messages into a Slack channel", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the webhook gateway (GET / and POST /line_callback).
    Serve {
        /// Config file path (default: LINEBRIDGE_CONFIG_PATH or ./config.yml)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 3000)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// List the Slack conversations visible to the bot token (to find SlackChannelId).
    Channels {
        /// Config file path (default: LINEBRIDGE_CONFIG_PATH or ./config.yml)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("line2slack {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Channels { config }) => {
            if let Err(e) = run_channels(config).await {
                log::error!("listing channels failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, path) = linebridge::config::load_config(config_path)?;
    if let Some(p) = port {
        config.port = p;
    }
    log::info!(
        "starting gateway on {} (config {}, slack channel {})",
        config.bind_addr(),
        path.display(),
        config.slack_channel_id
    );
    linebridge::gateway::run_gateway(config).await
}

async fn run_channels(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let (config, _path) = linebridge::config::load_config(config_path)?;
    let slack = linebridge::slack::SlackClient::new(config.slack_token, None)?;
    for c in slack.list_conversations().await? {
        println!("ID: {}, Name: {}", c.id, c.name);
    }
    Ok(())
}
