use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use invest_ledger::config::Config;
use invest_ledger::domain::{Actor, TransactionStatus};
use invest_ledger::AppState;

#[derive(Parser)]
#[command(name = "invest-ledger")]
#[command(about = "Investment ledger and referral commission engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Transaction management commands
    #[command(subcommand)]
    Tx(TxCommands),

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Accrue one day of profit on every active investment
    Accrue {
        /// Day to accrue (YYYY-MM-DD), defaults to today in UTC
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Complete active investments whose term has ended
    Mature,

    /// List active investment plans
    Plans,

    /// Show the top referrers
    Leaderboard {
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Settle a pending transaction
    Settle {
        /// Transaction UUID
        #[arg(value_name = "TX_ID")]
        tx_id: Uuid,

        /// completed, failed or cancelled
        #[arg(value_name = "STATUS", value_parser = parse_status)]
        status: TransactionStatus,

        /// Admin user performing the settlement
        #[arg(long)]
        admin: Uuid,

        #[arg(long)]
        notes: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

fn parse_status(raw: &str) -> Result<TransactionStatus, String> {
    raw.to_lowercase().parse()
}

pub async fn handle_tx_settle(
    state: &AppState,
    tx_id: Uuid,
    status: TransactionStatus,
    admin: Uuid,
    notes: Option<String>,
) -> anyhow::Result<()> {
    let admin = state.users.get(admin).await?;
    let actor = Actor::new(admin.id, admin.role);
    let outcome = state.ledger.settle(tx_id, status, &actor, notes).await?;

    if outcome.applied {
        println!("✓ Transaction {} marked as {}", tx_id, outcome.transaction.status);
        if let Some(refund) = outcome.refund {
            println!("  Refunded {} {} ({})", refund.amount, refund.currency, refund.reference);
        }
    } else {
        println!("Transaction {} was already {}", tx_id, outcome.transaction.status);
    }
    Ok(())
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = invest_ledger::db::create_pool(config).await?;

    tracing::info!("Running database migrations...");
    invest_ledger::db::run_migrations(&pool).await?;

    println!("✓ Database migrations completed");
    Ok(())
}

pub async fn handle_accrue(state: &AppState, date: Option<NaiveDate>) -> anyhow::Result<()> {
    let day = date.unwrap_or_else(|| Utc::now().date_naive());
    let report = state.investments.accrue_all(day).await?;

    println!("✓ Accrual for {} finished", day);
    println!("  Credited: {}", report.credited);
    println!("  Skipped:  {}", report.skipped);
    println!("  Failed:   {}", report.failed);

    if report.failed > 0 {
        anyhow::bail!("{} investment(s) failed to accrue", report.failed);
    }
    Ok(())
}

pub async fn handle_mature(state: &AppState) -> anyhow::Result<()> {
    let completed = state.investments.complete_matured(Utc::now()).await?;
    println!("✓ Completed {} matured investment(s)", completed.len());
    for investment in completed {
        println!("  {} ({} {})", investment.id, investment.amount, investment.currency);
    }
    Ok(())
}

pub async fn handle_plans(state: &AppState) -> anyhow::Result<()> {
    let plans = state.investments.available_plans().await?;
    println!("{} active plan(s)", plans.len());
    for plan in plans {
        println!(
            "  {} {}: {} to {}, {} days, {}% total ({}% daily)",
            plan.id,
            plan.name,
            plan.min_amount,
            plan.max_amount,
            plan.duration_days,
            plan.roi_percent,
            plan.daily_roi()
        );
    }
    Ok(())
}

pub async fn handle_leaderboard(state: &AppState, limit: i64) -> anyhow::Result<()> {
    let ranks = state.users.leaderboard(limit).await?;
    for (position, rank) in ranks.iter().enumerate() {
        println!(
            "{:>3}. {} ({}) {} referral(s), {} active",
            position + 1,
            rank.display_name,
            rank.referral_code,
            rank.total_referrals,
            rank.active_referrals
        );
    }
    Ok(())
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    let rates: Vec<String> = config.commission_rates.iter().map(|r| format!("{}%", r)).collect();
    println!("Configuration:");
    println!(
        "  Database URL: {}",
        config.database_url.as_deref().map(mask_password).unwrap_or_else(|| "(not set)".to_string())
    );
    println!("  Currency: {}", config.currency);
    println!("  Minimum investment: {}", config.min_investment_amount);
    println!("  Minimum withdrawal: {}", config.min_withdrawal_amount);
    println!("  Withdrawal fee: {}%", config.withdrawal_fee_percent);
    println!("  Daily withdrawal limit: {}", config.daily_withdrawal_limit);
    println!("  Commission rates: {}", rates.join(" / "));
    println!("  Strict status transitions: {}", config.strict_status_transitions);

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");
    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user = &url[slash_pos + 2..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
