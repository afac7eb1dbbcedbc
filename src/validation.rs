use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;

#[allow(clippy::expect_used)]
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+?[0-9(][0-9 ().-]{5,20}$").expect("phone pattern compiles")
});

#[allow(clippy::expect_used)]
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]{1,64}@[^@\s]+\.[^@\s]+$").expect("email pattern compiles")
});

/// Largest row limit a single query accepts
pub const MAX_LIMIT: usize = 100_000;

/// Validation utilities for input arriving at the command-line boundary
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Validate a row limit
    pub fn validate_limit(limit: usize) -> Result<()> {
        if limit == 0 {
            return Err(anyhow!("Limit must be greater than 0"));
        }

        if limit > MAX_LIMIT {
            return Err(anyhow!("Limit too large (max {MAX_LIMIT})"));
        }

        Ok(())
    }

    /// Validate a search term
    pub fn validate_search_term(term: &str) -> Result<()> {
        if term.trim().is_empty() {
            return Err(anyhow!("Search term cannot be empty"));
        }

        if term.contains('\0') {
            return Err(anyhow!("Search term contains invalid characters"));
        }

        Ok(())
    }

    /// Validate a participant handle: a phone number or an email address
    pub fn validate_handle(handle: &str) -> Result<()> {
        let handle = handle.trim();
        if handle.is_empty() {
            return Err(anyhow!("Participant handle cannot be empty"));
        }

        if handle.contains('@') {
            if handle.len() > 254 || !EMAIL_RE.is_match(handle) {
                return Err(anyhow!("Invalid email handle: {handle}"));
            }
            return Ok(());
        }

        let digits = handle.chars().filter(char::is_ascii_digit).count();
        if !PHONE_RE.is_match(handle) || !(5..=15).contains(&digits) {
            return Err(anyhow!("Invalid phone handle: {handle}"));
        }

        Ok(())
    }

    /// Split a comma-separated participant list, validating each entry
    pub fn parse_participants(raw: &str) -> Result<Vec<String>> {
        let participants: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(ToString::to_string)
            .collect();

        if participants.is_empty() {
            return Err(anyhow!("Participant list cannot be empty"));
        }
        for participant in &participants {
            Self::validate_handle(participant)?;
        }

        Ok(participants)
    }

    /// Parse `YYYY-MM-DD` (midnight UTC) or an RFC 3339 timestamp
    pub fn parse_date(value: &str) -> Result<DateTime<Utc>> {
        let value = value.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
            return Ok(parsed.with_timezone(&Utc));
        }

        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
            .ok_or_else(|| anyhow!("Invalid date '{value}', use YYYY-MM-DD or RFC 3339"))
    }

    /// Validate date range
    pub fn validate_date_range(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Result<()> {
        if let (Some(start_date), Some(end_date)) = (start, end) {
            if start_date >= end_date {
                return Err(anyhow!("Start date must be before end date"));
            }

            let days = (end_date - start_date).num_days();
            if days > 365 * 10 {
                tracing::warn!(days, "Large date range may scan most of the archive");
            }
        }

        Ok(())
    }

    /// Validate the live-tail poll interval
    pub fn validate_poll_interval(interval: Duration) -> Result<()> {
        if interval < Duration::from_millis(10) {
            return Err(anyhow!("Poll interval too short (min 10 ms)"));
        }

        if interval > Duration::from_secs(3600) {
            return Err(anyhow!("Poll interval too long (max 1 hour)"));
        }

        Ok(())
    }

    /// Validate a send recipient: a handle or a chat guid like `iMessage;-;+15551234567`
    pub fn validate_recipient(recipient: &str) -> Result<()> {
        if recipient.trim().is_empty() {
            return Err(anyhow!("Recipient cannot be empty"));
        }

        if recipient.contains(['\0', '\r', '\n']) {
            return Err(anyhow!("Recipient contains invalid characters"));
        }

        Ok(())
    }

    /// Validate a file that is about to be sent
    pub fn validate_send_file(path: &Path) -> Result<()> {
        if path.to_string_lossy().is_empty() {
            return Err(anyhow!("File path cannot be empty"));
        }

        if !path.is_file() {
            return Err(anyhow!("File to send does not exist: {path:?}"));
        }

        Ok(())
    }

    /// Sanitize text input
    #[must_use]
    pub fn sanitize_text(text: &str) -> String {
        text.chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
            .collect::<String>()
            .trim()
            .to_string()
    }
}
