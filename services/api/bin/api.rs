//! Main Entrypoint for the Persona Bridge Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Loading the persona catalog.
//! 3. Initializing the upstream clients (reasoning engine, speech, meeting bots).
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::{Context, anyhow};
use persona_bridge_api::{
    bot::{BotLauncher, RecallBotClient},
    config::Config,
    router::create_router,
    state::AppState,
    ws::{bridge::BridgeSettings, provider},
};
use persona_core::persona::{PersonaCatalog, PersonaConfig, display_name, load_instructions};
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// Builds one persona per instruction file.
fn load_personas(config: &Config) -> anyhow::Result<PersonaCatalog> {
    let instructions = load_instructions(&config.personas_path)?;
    if instructions.is_empty() {
        warn!(path = %config.personas_path.display(), "No persona files found");
    }
    let personas = instructions.into_iter().map(|(key, text)| PersonaConfig {
        display_name: display_name(&key),
        policy: config.control_policy(text),
        voice: config.voice_config(),
        key,
    });
    PersonaCatalog::new(personas, &config.default_persona).with_context(|| {
        format!(
            "Default persona '{}' has no file in {}",
            config.default_persona,
            config.personas_path.display()
        )
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();

    // Rustls 0.23 needs a process-wide crypto provider before any TLS socket opens.
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install Rustls crypto provider"))?;
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Load Personas ---
    let personas = load_personas(&config)?;
    info!(
        personas = ?personas.keys().collect::<Vec<_>>(),
        default = %config.default_persona,
        "Persona catalog loaded."
    );

    // --- 4. Initialize Upstream Clients ---
    let reasoning = provider::reasoning_channel(&config);
    let synthesizer = provider::speech_synthesizer(&config)?;
    let bots = match (&config.recall_api_key, &config.public_ws_url) {
        (Some(api_key), Some(public_ws_url)) => {
            info!("Meeting bot lifecycle enabled.");
            Some(BotLauncher {
                client: Arc::new(RecallBotClient::new(
                    config.recall_api_url.clone(),
                    api_key.clone(),
                )),
                page_url: config.bot_page_url.clone(),
                public_ws_url: public_ws_url.clone(),
            })
        }
        _ => {
            info!("RECALL_API_KEY not set; meeting bot routes are disabled.");
            None
        }
    };

    let app_state = Arc::new(AppState {
        personas: Arc::new(personas),
        reasoning,
        synthesizer,
        bridge: BridgeSettings {
            handshake_timeout: config.handshake_timeout,
            client_sample_rate: config.client_sample_rate,
        },
        bots,
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        tts_provider = ?config.tts_provider,
        model = %config.realtime_model,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
