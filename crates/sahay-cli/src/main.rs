use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sahay", about = "Multilingual document Q&A assistant")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory for the SQLite databases (overrides config)
        #[arg(short, long)]
        data_dir: Option<String>,
    },
    /// Show resolved configuration
    Health,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, data_dir } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(async {
                let mut config = sahay_config::load_config()?;
                if let Some(dir) = data_dir {
                    config.data_dir = Some(std::path::PathBuf::from(dir));
                }
                sahay_gateway::start_server(config, port)
                    .await
                    .map_err(|e| anyhow::anyhow!("{e}"))
            })?;
        }
        Commands::Health => {
            let config = sahay_config::load_config().unwrap_or_default();
            println!("sahay is healthy");
            println!("  gateway: {}:{}", config.gateway.host, config.gateway.port);
            println!(
                "  embedding: {} ({} dims)",
                config.embedding.model, config.embedding.dimensions
            );
            println!("  chat model: {}", config.chat.model);
        }
    }

    Ok(())
}
