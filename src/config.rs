use anyhow::Result;
use bigdecimal::BigDecimal;
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

/// Maximum number of referral levels paid on an investment.
pub const MAX_COMMISSION_LEVELS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("LOG_FORMAT must be 'pretty' or 'json', got '{}'", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub currency: String,
    pub min_investment_amount: BigDecimal,
    pub min_withdrawal_amount: BigDecimal,
    pub withdrawal_fee_percent: BigDecimal,
    pub daily_withdrawal_limit: u32,
    /// Level 1 first.
    pub commission_rates: Vec<BigDecimal>,
    pub event_buffer_size: usize,
    pub strict_status_transitions: bool,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            currency: "USD".to_string(),
            min_investment_amount: BigDecimal::from(10),
            min_withdrawal_amount: BigDecimal::from(10),
            withdrawal_fee_percent: BigDecimal::from(2),
            daily_withdrawal_limit: 2,
            commission_rates: vec![BigDecimal::from(7), BigDecimal::from(3), BigDecimal::from(1)],
            event_buffer_size: 1024,
            strict_status_transitions: false,
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let defaults = Config::default();
        Ok(Config {
            database_url: env::var("DATABASE_URL").ok(),
            currency: env::var("LEDGER_CURRENCY").unwrap_or(defaults.currency),
            min_investment_amount: parse_var("MIN_INVESTMENT_AMOUNT", defaults.min_investment_amount)?,
            min_withdrawal_amount: parse_var("MIN_WITHDRAWAL_AMOUNT", defaults.min_withdrawal_amount)?,
            withdrawal_fee_percent: parse_var("WITHDRAWAL_FEE_PERCENT", defaults.withdrawal_fee_percent)?,
            daily_withdrawal_limit: parse_var("DAILY_WITHDRAWAL_LIMIT", defaults.daily_withdrawal_limit)?,
            commission_rates: match env::var("COMMISSION_RATES") {
                Ok(raw) => parse_commission_rates(&raw)?,
                Err(_) => defaults.commission_rates,
            },
            event_buffer_size: parse_var("EVENT_BUFFER_SIZE", defaults.event_buffer_size)?,
            strict_status_transitions: parse_var(
                "STRICT_STATUS_TRANSITIONS",
                defaults.strict_status_transitions,
            )?,
            log_format: parse_var("LOG_FORMAT", defaults.log_format)?,
        })
    }

    pub fn require_database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))
    }
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {}='{}': {}", name, raw, e)),
        Err(_) => Ok(default),
    }
}

/// Comma-separated percentages, level 1 first. Extra levels are ignored.
pub fn parse_commission_rates(raw: &str) -> anyhow::Result<Vec<BigDecimal>> {
    let rates = raw
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(BigDecimal::from_str)
        .collect::<Result<Vec<_>, _>>()?;

    if rates.is_empty() {
        anyhow::bail!("COMMISSION_RATES must list at least one percentage");
    }
    if rates.iter().any(|r| *r < BigDecimal::from(0)) {
        anyhow::bail!("COMMISSION_RATES must not be negative");
    }

    Ok(rates.into_iter().take(MAX_COMMISSION_LEVELS).collect())
}
