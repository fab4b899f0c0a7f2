// crates/campaign-lens-core/src/gaql.rs
// ============================================================================
// Module: Query Builders
// Description: Read-only advertising query statements and input validation.
// Purpose: Build fixed query text from validated identifiers and dates.
// Dependencies: thiserror, time
// ============================================================================

//! ## Overview
//! Every caller-supplied value is validated before it reaches query text:
//! identifiers must be ASCII digits and dates must be real `YYYY-MM-DD`
//! calendar dates with `start <= end`. Validated values are re-rendered from
//! their parsed form rather than spliced through.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;
use time::Date;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Accepted date layout.
const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Maximum identifier length accepted.
const MAX_ID_LENGTH: usize = 20;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Rejected query input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryInputError {
    /// Identifier is empty, too long or not numeric.
    #[error("{field} must be a numeric id, got {value:?}")]
    InvalidId {
        /// Argument name.
        field: &'static str,
        /// Offending value.
        value: String,
    },
    /// Date is not a strict `YYYY-MM-DD` calendar date.
    #[error("{field} must be a YYYY-MM-DD date, got {value:?}")]
    InvalidDate {
        /// Argument name.
        field: &'static str,
        /// Offending value.
        value: String,
    },
    /// Start date falls after end date.
    #[error("start_date {start} is after end_date {end}")]
    InvertedRange {
        /// Start date.
        start: String,
        /// End date.
        end: String,
    },
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Inclusive, validated date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    /// First day.
    start: Date,
    /// Last day.
    end: Date,
}

impl DateRange {
    /// Parses and orders a date range.
    ///
    /// # Errors
    ///
    /// Returns [`QueryInputError`] when either date is malformed or the range
    /// is inverted.
    pub fn parse(start: &str, end: &str) -> Result<Self, QueryInputError> {
        let start_date = parse_date("start_date", start)?;
        let end_date = parse_date("end_date", end)?;
        if start_date > end_date {
            return Err(QueryInputError::InvertedRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self {
            start: start_date,
            end: end_date,
        })
    }

    /// Returns the start date as `YYYY-MM-DD`.
    #[must_use]
    pub fn start(&self) -> String {
        render_date(self.start)
    }

    /// Returns the end date as `YYYY-MM-DD`.
    #[must_use]
    pub fn end(&self) -> String {
        render_date(self.end)
    }
}

/// Parses a strict `YYYY-MM-DD` date.
fn parse_date(field: &'static str, value: &str) -> Result<Date, QueryInputError> {
    let invalid = || QueryInputError::InvalidDate {
        field,
        value: value.to_string(),
    };
    if value.len() != 10 {
        return Err(invalid());
    }
    Date::parse(value, DATE_FORMAT).map_err(|_| invalid())
}

/// Renders a date as `YYYY-MM-DD`.
fn render_date(date: Date) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), u8::from(date.month()), date.day())
}

/// Validates a numeric identifier.
///
/// # Errors
///
/// Returns [`QueryInputError::InvalidId`] unless `value` is 1 to 20 ASCII digits.
pub fn validate_id(field: &'static str, value: &str) -> Result<String, QueryInputError> {
    if value.is_empty() || value.len() > MAX_ID_LENGTH || !value.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(QueryInputError::InvalidId {
            field,
            value: value.to_string(),
        });
    }
    Ok(value.to_string())
}

/// Normalizes a customer id written as `123-456-7890` and validates it.
///
/// # Errors
///
/// Returns [`QueryInputError::InvalidId`] when the stripped value is not numeric.
pub fn normalize_customer_id(value: &str) -> Result<String, QueryInputError> {
    let stripped: String = value.trim().chars().filter(|c| *c != '-').collect();
    validate_id("customer_id", &stripped)
}

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Minimal identity query used for connectivity checks.
#[must_use]
pub fn identity_query() -> String {
    "SELECT customer.id, customer.descriptive_name, customer.currency_code, customer.time_zone \
     FROM customer LIMIT 1"
        .to_string()
}

/// Campaign listing ordered by name.
#[must_use]
pub fn campaigns_query() -> String {
    "SELECT campaign.id, campaign.name, campaign.status, \
     campaign.advertising_channel_type, campaign_budget.amount_micros, \
     metrics.impressions, metrics.clicks, metrics.cost_micros, metrics.conversions \
     FROM campaign ORDER BY campaign.name"
        .to_string()
}

/// Daily metrics for one campaign over an inclusive range, newest first.
///
/// # Errors
///
/// Returns [`QueryInputError`] when the campaign id or range is invalid.
pub fn campaign_metrics_query(
    campaign_id: &str,
    start_date: &str,
    end_date: &str,
) -> Result<String, QueryInputError> {
    let campaign_id = validate_id("campaign_id", campaign_id)?;
    let range = DateRange::parse(start_date, end_date)?;
    Ok(format!(
        "SELECT segments.date, campaign.id, campaign.name, metrics.impressions, \
         metrics.clicks, metrics.ctr, metrics.average_cpc, metrics.cost_micros, \
         metrics.conversions, metrics.conversions_value \
         FROM campaign WHERE campaign.id = {campaign_id} \
         AND segments.date BETWEEN '{}' AND '{}' \
         ORDER BY segments.date DESC",
        range.start(),
        range.end()
    ))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only assertions.")]

    use super::QueryInputError;
    use super::campaign_metrics_query;
    use super::campaigns_query;
    use super::normalize_customer_id;

    #[test]
    fn metrics_query_filters_and_orders() {
        let query = campaign_metrics_query("123", "2024-01-01", "2024-01-31").unwrap();
        assert!(query.contains("campaign.id = 123"));
        assert!(query.contains("BETWEEN '2024-01-01' AND '2024-01-31'"));
        assert!(query.ends_with("ORDER BY segments.date DESC"));
    }

    #[test]
    fn campaigns_query_orders_by_name() {
        assert!(campaigns_query().ends_with("ORDER BY campaign.name"));
    }

    #[test]
    fn injected_campaign_id_is_rejected() {
        let err = campaign_metrics_query("1 OR 1=1", "2024-01-01", "2024-01-31").unwrap_err();
        assert!(matches!(err, QueryInputError::InvalidId { field: "campaign_id", .. }));
    }

    #[test]
    fn impossible_and_loose_dates_are_rejected() {
        for bad in ["2024-02-30", "2024-1-01", "2024-01-01' --", "yesterday"] {
            let err = campaign_metrics_query("1", bad, "2024-12-31").unwrap_err();
            assert!(matches!(err, QueryInputError::InvalidDate { field: "start_date", .. }), "{bad}");
        }
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = campaign_metrics_query("1", "2024-02-01", "2024-01-01").unwrap_err();
        assert!(matches!(err, QueryInputError::InvertedRange { .. }));
    }

    #[test]
    fn same_day_range_is_accepted() {
        assert!(campaign_metrics_query("1", "2024-02-29", "2024-02-29").is_ok());
    }

    #[test]
    fn customer_id_dashes_are_stripped() {
        assert_eq!(normalize_customer_id("123-456-7890").unwrap(), "1234567890");
        assert!(normalize_customer_id("abc").is_err());
    }
}
