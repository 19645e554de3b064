use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};

use logingate::{AccountStore, Config, Database, SchemeHasher};

fn main() -> ExitCode {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = logingate::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        logingate::logging::init_console_only(&config.logging.level);
    }

    info!("logingate - player authentication core");

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(&config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &Config) -> logingate::Result<()> {
    config.validate()?;

    let hasher = SchemeHasher::from_config(&config.hashing)?;
    let db = Database::open(&config.database).await?;
    let store = AccountStore::new(&db, Arc::new(hasher));

    info!(
        timestamp_mode = ?db.timestamp_mode(),
        accounts = store.count().await?,
        "Account store ready"
    );
    Ok(())
}
