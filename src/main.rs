mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Commands, DbCommands, TxCommands};
use invest_ledger::config::{Config, LogFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Setup logging
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }

    let cli = Cli::parse();
    match cli.command {
        Commands::Config => return cli::handle_config_validate(&config),
        Commands::Db(DbCommands::Migrate) => return cli::handle_db_migrate(&config).await,
        _ => {}
    }

    let pool = invest_ledger::db::create_pool(&config).await?;
    let (state, _store) = invest_ledger::postgres(pool, &config);
    let _event_log = state.events.spawn_logger();

    match cli.command {
        Commands::Tx(TxCommands::Settle {
            tx_id,
            status,
            admin,
            notes,
        }) => cli::handle_tx_settle(&state, tx_id, status, admin, notes).await,
        Commands::Accrue { date } => cli::handle_accrue(&state, date).await,
        Commands::Mature => cli::handle_mature(&state).await,
        Commands::Plans => cli::handle_plans(&state).await,
        Commands::Leaderboard { limit } => cli::handle_leaderboard(&state, limit).await,
        Commands::Config | Commands::Db(_) => Ok(()),
    }
}
