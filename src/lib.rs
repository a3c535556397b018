//! Harvests channels, users, message histories, threads and files from the
//! Slack Web API and renders them as JSON or plain-text transcripts.

use chrono::{NaiveDate, NaiveTime};

pub mod cli;
pub mod commands;
pub mod error;
pub mod executor;
pub mod extract;
pub mod pagination;
pub mod records;
pub mod settings;
pub mod slack;
pub mod transcript;

#[cfg(test)]
mod testing;

pub use cli::{Cli, Commands};
pub use error::{AppError, Result};

pub const TOKEN_ENV: &str = "SLACK_USER_TOKEN";

pub fn load_token() -> Result<String> {
    std::env::var(TOKEN_ENV)
        .ok()
        .filter(|token| !token.trim().is_empty())
        .ok_or(AppError::MissingToken)
}

/// Accepts a Slack/Unix timestamp as-is, or a `YYYY-MM-DD` date (UTC midnight).
pub fn parse_bound(s: &str) -> Result<String> {
    let s = s.trim();
    if s.parse::<f64>().is_ok_and(|v| v.is_finite() && v >= 0.0) {
        return Ok(s.to_string());
    }

    let date =
        NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| AppError::InvalidDate(s.to_string()))?;
    Ok(date_to_slack_ts(date))
}

fn date_to_slack_ts(date: NaiveDate) -> String {
    let timestamp = date.and_time(NaiveTime::MIN).and_utc().timestamp();
    format!("{}.000000", timestamp)
}
