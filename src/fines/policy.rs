//! Library policy: fine rates, thresholds and rental settings

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Process-wide library policy.
///
/// Loaded once from configuration and passed by value to the fine calculator,
/// the maintenance job and the services. Nothing mutates it at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct LibraryPolicy {
    /// Fine charged per day once the grace period is over
    pub daily_fine_rate: Decimal,
    /// Maximum accrued (daily) fine per item, lost-item charges excluded
    pub max_fine_per_item: Decimal,
    /// Days after the due date before fines start accruing
    pub grace_period_days: i64,
    /// Days after the due date after which an item is presumed lost
    pub lost_item_threshold_days: i64,
    /// Flat processing fee added to lost items
    pub lost_item_processing_fee: Decimal,
    /// Replacement cost used when neither the book nor the rental has one
    pub default_replacement_cost: Decimal,
    /// Unpaid total at which an account gets blocked
    pub account_block_threshold: Decimal,
    /// Rental duration used when the patron does not pick one
    pub default_rental_days: i64,
    /// Longest rental a patron may ask for
    pub max_rental_days: i64,
    /// Rental price per day
    pub rental_cost_per_day: Decimal,
}

impl Default for LibraryPolicy {
    fn default() -> Self {
        Self {
            daily_fine_rate: Decimal::new(50, 2),
            max_fine_per_item: Decimal::new(2500, 2),
            grace_period_days: 3,
            lost_item_threshold_days: 45,
            lost_item_processing_fee: Decimal::new(1500, 2),
            default_replacement_cost: Decimal::new(2500, 2),
            account_block_threshold: Decimal::new(5000, 2),
            default_rental_days: 14,
            max_rental_days: 30,
            rental_cost_per_day: Decimal::new(200, 2),
        }
    }
}

impl LibraryPolicy {
    /// Grace period end for a given due date
    pub fn grace_period_end(&self, due_date: DateTime<Utc>) -> DateTime<Utc> {
        due_date + Duration::days(self.grace_period_days)
    }

    /// Instant after which an unreturned item is considered lost
    pub fn lost_threshold_date(&self, due_date: DateTime<Utc>) -> DateTime<Utc> {
        due_date + Duration::days(self.lost_item_threshold_days)
    }

    /// Price of a rental of `days` days
    pub fn rental_cost(&self, days: i64) -> Decimal {
        self.rental_cost_per_day * Decimal::from(days)
    }

    /// Public subset of the policy shown to patrons
    pub fn fine_config(&self) -> FineConfig {
        FineConfig {
            daily_fine_rate: self.daily_fine_rate,
            grace_period_days: self.grace_period_days,
            max_fine_per_item: self.max_fine_per_item,
            lost_item_processing_fee: self.lost_item_processing_fee,
            account_block_threshold: self.account_block_threshold,
        }
    }
}

/// Fine settings exposed on the patron side
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FineConfig {
    pub daily_fine_rate: Decimal,
    pub grace_period_days: i64,
    pub max_fine_per_item: Decimal,
    pub lost_item_processing_fee: Decimal,
    pub account_block_threshold: Decimal,
}
