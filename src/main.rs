use std::sync::Arc;

use battleroom::{
    init_logging, parse_token_entry, simulate_match, EngineConfig, IdentityProvider, InMemoryStore,
    Lobby, RoomApi, Session, StaticIdentity, TcpTransport,
};
use clap::Parser;
use log::{info, warn};
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
enum Commands {
    /// Serve rooms over TCP.
    Serve {
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,
        /// Accepted player token, as NAME=TOKEN. Repeat for each player.
        #[arg(long = "token", value_name = "NAME=TOKEN", required = true)]
        tokens: Vec<String>,
    },
    /// Play self-play matches and print a JSON report per match.
    Simulate {
        #[arg(long, help = "Seed of the first match (e.g., --seed 12345)")]
        seed: Option<u64>,
        #[arg(long, default_value_t = 1)]
        games: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { bind, tokens } => {
            let mut identity = StaticIdentity::new();
            for entry in &tokens {
                let (player, token) = parse_token_entry(entry)?;
                identity.insert(player, token);
            }
            serve(&bind, identity, EngineConfig::from_env()).await?;
        }
        Commands::Simulate { seed, games } => {
            let first = seed.unwrap_or_else(rand::random);
            for n in 0..games {
                let report = simulate_match(first.wrapping_add(n)).await?;
                println!("{}", serde_json::to_string(&report)?);
            }
        }
    }
    Ok(())
}

async fn serve(bind: &str, identity: StaticIdentity, config: EngineConfig) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!(
        "listening on {} with {} known players",
        listener.local_addr()?,
        identity.len()
    );
    let api: Arc<dyn RoomApi> = Arc::new(Lobby::new(Arc::new(InMemoryStore::new()), config.clone()));
    let identity: Arc<dyn IdentityProvider> = Arc::new(identity);

    loop {
        let (stream, addr) = listener.accept().await?;
        info!("connection from {}", addr);
        let transport = TcpTransport::with_config(stream, &config);
        let mut session = Session::new(api.clone(), identity.clone(), transport);
        tokio::spawn(async move {
            if let Err(err) = session.run().await {
                warn!("session from {} ended: {}", addr, err);
            }
        });
    }
}
