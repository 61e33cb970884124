use std::{process::ExitCode, sync::Arc};
use thiserror::Error;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use crystalgate::config::{CliConfig, CliError, Command, ConfigError, LogLevel, typed_args};
use crystalgate::gateway::{RegistryError, ledger_operations};
use crystalgate::rate_limit::RateLimiter;
use crystalgate::remote::{Agent, TcpAgent};
use crystalgate::retry::CancelSignal;
use crystalgate::session::{AnonymousProvider, IdentityProvider, KeyFileProvider, SessionManager};
use crystalgate::shared_types::SystemClock;
use crystalgate::{Config, Gateway, GatewayError};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const APP_NAME: &str = "💎 crystalgate";

// -----------------------------------------------------------------------------
// ----- Main ------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match CliConfig::from_env() {
        Ok(cli) => cli,
        Err(CliError::Args(e)) => e.exit(),
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(cli.log_level);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{APP_NAME}: {e}");
            ExitCode::FAILURE
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Setup -----------------------------------------------------------------

fn init_tracing(level: LogLevel) {
    // stdout carries the call result; logs go to stderr.
    let filter = EnvFilter::try_new(level.as_str()).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn build_gateway(cli: &CliConfig, config: &Config) -> Result<Gateway, StartupError> {
    let agent: Arc<dyn Agent> = Arc::new(TcpAgent::from_config(&config.replica));

    let provider: Arc<dyn IdentityProvider> = match &cli.identity_file_location {
        Some(path) => Arc::new(KeyFileProvider::new(path)),
        None => Arc::new(AnonymousProvider),
    };

    let registry = ledger_operations(agent.clone(), &config.canisters)?;
    let session = SessionManager::new(provider, agent, Arc::new(SystemClock));

    let gateway = Gateway::new(
        registry,
        session,
        RateLimiter::default(),
        config.gateway_options(),
    );

    gateway.initialize().await;

    if cli.identity_file_location.is_some() {
        gateway.login(&config.provider_config()).await?;
    }

    Ok(gateway)
}

// -----------------------------------------------------------------------------
// ----- Run -------------------------------------------------------------------

async fn run(cli: CliConfig) -> Result<ExitCode, StartupError> {
    let config = Config::from_file(&cli.config_file_location).await?;
    let gateway = build_gateway(&cli, &config).await?;

    match cli.command {
        Command::Operations => {
            for name in gateway.registry().names() {
                if let Some(op) = gateway.registry().get(name) {
                    println!("{name}({})", op.signature());
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Call { operation, args } => {
            let specs = gateway
                .registry()
                .get(&operation)
                .map(|op| op.args())
                .unwrap_or_default();
            let args = typed_args(&args, specs);

            let cancel = CancelSignal::new();

            let watcher = {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    if signal::ctrl_c().await.is_ok() {
                        info!("{APP_NAME} cancelling in-flight call");
                        cancel.cancel();
                    }
                })
            };

            let result = gateway.call_with_cancel(&operation, args, &cancel).await;
            watcher.abort();

            match result {
                Ok(payload) => {
                    println!("{}", serde_json::to_string_pretty(&payload)?);
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    warn!(operation = %operation, "{e}");
                    println!("{}", serde_json::to_string_pretty(&e.to_payload())?);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Login(#[from] GatewayError),

    #[error("could not encode result: {0}")]
    Json(#[from] serde_json::Error),
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
