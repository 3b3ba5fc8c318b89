use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use paradise_agent::agent::RoomConnection;
use paradise_agent::config::REQUIRED_VARS;
use paradise_agent::core::reasoner::{
    DirectoryKnowledgeStore, FlightPriceTool, GooglePlaces, OpenAIReasoner, PlaceSearchTool,
    SerpApiFlights, TravelInfoTool,
};
use paradise_agent::core::{BaseTTS, create_stt_provider, create_tts_provider};
use paradise_agent::livekit::{LiveKitRoom, mint_agent_token};
use paradise_agent::{AgentConfig, AgentSession};

/// Paradise - voice travel-planning agent for LiveKit rooms
#[derive(Parser, Debug)]
#[command(name = "paradise-agent")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Join a room and run one conversation
    Run {
        /// Name of the LiveKit room to join
        #[arg(short = 'r', long = "room")]
        room: String,
    },

    /// Validate configuration and exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Must happen before any TLS connection is attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            AgentConfig::from_file(path)
        }
        None => AgentConfig::from_env(),
    }
    .context("Invalid configuration")?;

    match cli.command {
        Commands::CheckConfig => {
            println!("Configuration OK");
            println!("  required: {}", REQUIRED_VARS.join(", "));
            println!("  livekit:  {}", config.livekit_url);
            println!(
                "  models:   stt={} tts={} ({}) chat={}",
                config.stt_model, config.tts_model, config.tts_voice, config.chat_model
            );
            println!(
                "  tools:    travel_info={} flights={} places={}",
                config.knowledge_dir.is_some(),
                config.serpapi_api_key.is_some(),
                config.google_places_api_key.is_some()
            );
            Ok(())
        }
        Commands::Run { room } => run_agent(&config, &room).await,
    }
}

async fn run_agent(config: &AgentConfig, room_name: &str) -> anyhow::Result<()> {
    let stop = CancellationToken::new();
    tokio::spawn({
        let stop = stop.clone();
        async move {
            shutdown_signal().await;
            stop.cancel();
        }
    });

    let stt = create_stt_provider("openai", config.stt_config())?;
    let tts: Arc<dyn BaseTTS> = Arc::from(create_tts_provider("openai", config.tts_config())?);

    let mut reasoner = OpenAIReasoner::new(config.reasoner_config())?;
    if let Some(dir) = &config.knowledge_dir {
        let store = DirectoryKnowledgeStore::load(dir).await?;
        reasoner = reasoner.with_tool(Arc::new(TravelInfoTool::new(Arc::new(store))));
    }
    if let Some(flights) = config.flights_config() {
        let lookup = SerpApiFlights::new(flights)?;
        reasoner = reasoner.with_tool(Arc::new(FlightPriceTool::new(Arc::new(lookup))));
    }
    if let Some(places) = config.places_config() {
        let lookup = GooglePlaces::new(places)?;
        reasoner = reasoner.with_tool(Arc::new(PlaceSearchTool::new(Arc::new(lookup))));
    }
    info!(tools = ?reasoner.tool_names(), "Reasoner ready");

    let token = mint_agent_token(
        &config.livekit_api_key,
        &config.livekit_api_secret,
        room_name,
        &config.agent_identity(),
    )?;
    let room: Arc<dyn RoomConnection> =
        Arc::new(LiveKitRoom::connect(&config.livekit_url, &token).await?);

    let session = tokio::select! {
        started = AgentSession::start(
            Arc::clone(&room),
            stt.as_ref(),
            tts,
            Box::new(reasoner),
            config.session_config(),
        ) => started.context("Session setup failed")?,
        _ = stop.cancelled() => {
            warn!("Shutdown requested during setup");
            if let Err(e) = room.disconnect().await {
                warn!("Failed to leave room: {e}");
            }
            return Ok(());
        }
    };

    let summary = session.run(stop.cancelled_owned()).await;
    info!(
        participant = %summary.participant,
        trigger = %summary.trigger,
        utterances = summary.utterances,
        "Agent finished"
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
