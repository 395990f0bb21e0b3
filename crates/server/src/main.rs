use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use keyplane_apisix::ApisixClient;
use keyplane_keycloak::KeycloakClient;
use keyplane_orchestrator::Orchestrator;
use keyplane_server::api::{self, AppState};
use keyplane_server::auth::JwksValidator;
use keyplane_server::config::Settings;
use keyplane_vault::VaultClient;

/// Outbound request timeout towards the backends.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Keyplane control-plane HTTP server.
#[derive(Parser, Debug)]
#[command(name = "keyplane-server", about = "API-key control plane for an APISIX fleet")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, env = "CONFIG_FILE", default_value = "config.yaml")]
    config: PathBuf,

    /// Path to an optional YAML secrets file merged over the configuration.
    #[arg(long, env = "SECRETS_FILE")]
    secrets: Option<PathBuf>,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let settings = Settings::load_from(&cli.config, cli.secrets.as_deref())?;

    // RUST_LOG wins over the configured default filter.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.server.log_level)),
        )
        .init();

    let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;

    let apisix_clients = settings
        .apisix
        .instances
        .iter()
        .map(|instance| {
            ApisixClient::new(
                http.clone(),
                instance.clone(),
                settings.apisix.key_path.clone(),
                settings.apisix.key_name.clone(),
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    let vault_clients: Vec<VaultClient> = settings
        .vault
        .instances
        .iter()
        .map(|instance| {
            VaultClient::new(http.clone(), instance.clone(), settings.vault.base_path.clone())
        })
        .collect();

    let keycloak_client = KeycloakClient::new(http.clone(), settings.keycloak.clone());
    let validator = Arc::new(JwksValidator::new(http, &settings.keycloak));

    let orchestrator = Orchestrator::new(
        apisix_clients,
        vault_clients,
        keycloak_client,
        settings.vault.secret_phrase.clone(),
    );

    info!(
        gateways = ?orchestrator.gateway_instances().collect::<Vec<_>>(),
        secret_stores = ?orchestrator.secret_instances().collect::<Vec<_>>(),
        "backends configured"
    );

    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        validator,
    };
    let app = api::router(state, api::cors_layer(&settings.server.allowed_origins));

    let host = cli.host.unwrap_or(settings.server.host);
    let port = cli.port.unwrap_or(settings.server.port);
    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    info!(%host, port, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM so in-flight fan-outs finish their
/// compensation before the process exits.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        _ = terminate => {},
    }
}
