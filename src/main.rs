use std::{env, sync::Arc};

use colored::Colorize;
use log::{error, info, warn};
use parlor_collab::{
    CatalogError, Collab, Config, DatabaseError, GameCatalog, MemoryDatabase, PgDatabase,
    SharedDatabase, DEFAULT_HISTORY_LIMIT,
};
use parlor_server::{ConfigError, Gateway, ServerConfig, ServerContext};
use thiserror::Error;
use tokio::runtime::{self, Runtime};

mod logging;

pub struct Parlor {
    runtime: Runtime,
    context: ServerContext,
}

#[derive(Debug, Error)]
enum ParlorError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Could not load the game catalog: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Could not initialize database: {0}")]
    Database(#[from] DatabaseError),

    #[error("Could not run the server: {0}")]
    Server(#[source] std::io::Error),

    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl Parlor {
    fn new() -> Result<Self, ParlorError> {
        let server_config = ServerConfig::from_env()?;
        let config = collab_config()?;

        info!("Building async runtime...");
        let runtime = runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("parlor-async")
            .build()
            .map_err(|e| ParlorError::Fatal(e.to_string()))?;

        let catalog = match env::var("PARLOR_GAME_CATALOG") {
            Ok(path) => GameCatalog::from_file(path)?,
            Err(_) => GameCatalog::embedded()?,
        };

        let database: SharedDatabase = match env::var("DATABASE_URL") {
            Ok(url) => {
                info!("Connecting to database...");
                Arc::new(runtime.block_on(PgDatabase::new(&url))?)
            }
            Err(_) => {
                warn!("DATABASE_URL is not set, chat history will be lost on restart");
                Arc::new(MemoryDatabase::new())
            }
        };

        let gateway = Gateway::new();
        let collab = Collab::new(config, database, catalog, gateway.clone());

        runtime.block_on(collab.rooms.restore())?;

        Ok(Self {
            runtime,
            context: ServerContext {
                collab: Arc::new(collab),
                gateway,
                config: Arc::new(server_config),
            },
        })
    }

    fn run(self) -> Result<(), ParlorError> {
        let context = self.context;

        self.runtime
            .block_on(parlor_server::run_server(context))
            .map_err(ParlorError::Server)
    }
}

fn collab_config() -> Result<Config, ConfigError> {
    let history_limit = match env::var("PARLOR_HISTORY_LIMIT") {
        Ok(value) => value.parse().map_err(|_| ConfigError::Invalid {
            name: "PARLOR_HISTORY_LIMIT",
            expected: "a number of messages",
            value,
        })?,
        Err(_) => DEFAULT_HISTORY_LIMIT,
    };

    Ok(Config { history_limit })
}

impl ParlorError {
    fn hint(&self) -> String {
        match self {
            ParlorError::Config(_) => "Check the PARLOR_* environment variables, or unset them to use the defaults.".to_string(),
            ParlorError::Catalog(_) => "Make sure PARLOR_GAME_CATALOG points to a readable RON list of games with unique ids, or unset it to use the built-in catalog.".to_string(),
            ParlorError::Database(_) => "This is a database error. Make sure the PostgreSQL server in DATABASE_URL is running and reachable, or unset DATABASE_URL to keep chat in memory.".to_string(),
            ParlorError::Server(_) => "Make sure no other program is using PARLOR_SERVER_PORT.".to_string(),
            ParlorError::Fatal(_) => "This error is fatal, and should not happen.".to_string(),
        }
    }
}

fn report(error: ParlorError) {
    error!("{} Read the error below to troubleshoot the issue. If you think this might be a bug, please report it by making a GitHub issue.", "Parlor failed to start!".bold().red());
    error!("{}", error);
    error!(
        "{}",
        format!("Hint: {}", error.hint())
            .bright_black()
            .italic()
    );
}

fn main() {
    logging::init_logger();

    match Parlor::new() {
        Ok(parlor) => {
            info!("Initialized successfully.");

            if let Err(error) = parlor.run() {
                report(error);
            }
        }
        Err(error) => report(error),
    }
}
