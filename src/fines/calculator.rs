//! Fine calculation.
//!
//! Every function here is pure: the evaluation instant and the policy are
//! passed in, nothing is read from the clock or the database. Handlers and the
//! maintenance job persist whatever they need from the results.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use utoipa::ToSchema;

use super::policy::LibraryPolicy;
use crate::models::{
    enums::TransactionStatus,
    transaction::{RentalRecord, Transaction},
};

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Round to cents the way NUMERIC(12, 2) columns store amounts
pub fn to_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Kind of a fine breakdown line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BreakdownKind {
    Overdue,
    Replacement,
    Processing,
}

/// One line of a fine breakdown
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BreakdownLine {
    #[serde(rename = "type")]
    pub kind: BreakdownKind,
    pub description: String,
    pub amount: Decimal,
}

/// Fine state of a single rental at a given instant
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FineDetails {
    pub days_overdue: i64,
    /// Accrued overdue fine, capped at the per-item maximum
    pub daily_fine: Decimal,
    pub total_fine: Decimal,
    pub is_in_grace_period: bool,
    pub grace_period_remaining: i64,
    pub is_capped: bool,
    pub is_lost: bool,
    pub replacement_cost: Decimal,
    pub processing_fee: Decimal,
    /// Waivers recorded on the rental, never more than the total
    pub waived_amount: Decimal,
    /// total_fine - waived_amount
    pub amount_due: Decimal,
    pub breakdown: Vec<BreakdownLine>,
}

impl FineDetails {
    fn empty(is_lost: bool) -> Self {
        Self {
            days_overdue: 0,
            daily_fine: Decimal::ZERO,
            total_fine: Decimal::ZERO,
            is_in_grace_period: false,
            grace_period_remaining: 0,
            is_capped: false,
            is_lost,
            replacement_cost: Decimal::ZERO,
            processing_fee: Decimal::ZERO,
            waived_amount: Decimal::ZERO,
            amount_due: Decimal::ZERO,
            breakdown: Vec::new(),
        }
    }
}

/// Whole days from `start` to `end`, rounded up (24h units, not calendar days)
pub fn days_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let ms = (end - start).num_milliseconds();
    let days = ms.div_euclid(MS_PER_DAY);
    if ms.rem_euclid(MS_PER_DAY) > 0 {
        days + 1
    } else {
        days
    }
}

/// Stored grace period end, or due date plus the policy's grace days
pub fn grace_period_end(transaction: &Transaction, policy: &LibraryPolicy) -> DateTime<Utc> {
    transaction
        .grace_period_end_date
        .unwrap_or_else(|| policy.grace_period_end(transaction.due_date))
}

/// Instant fines are evaluated at: accrual stops once the book is back
fn evaluation_instant(transaction: &Transaction, now: DateTime<Utc>) -> DateTime<Utc> {
    match transaction.return_date {
        Some(returned) if returned < now => returned,
        _ => now,
    }
}

/// Replacement cost of a lost item: book, then rental, then policy default
pub fn replacement_cost_for(
    book_cost: Option<Decimal>,
    transaction: &Transaction,
    policy: &LibraryPolicy,
) -> Decimal {
    let positive = |cost: Option<Decimal>| cost.filter(|c| *c > Decimal::ZERO);
    let cost = positive(book_cost)
        .or_else(|| positive(transaction.replacement_cost))
        .unwrap_or(policy.default_replacement_cost);
    to_cents(cost)
}

/// Days overdue past the grace period, 0 while not past it
pub fn calculate_days_overdue(
    transaction: &Transaction,
    policy: &LibraryPolicy,
    now: DateTime<Utc>,
) -> i64 {
    let at = evaluation_instant(transaction, now);
    if at <= transaction.due_date {
        return 0;
    }
    let grace_end = grace_period_end(transaction, policy);
    if at <= grace_end {
        return 0;
    }
    days_between(grace_end, at)
}

/// Past due but still inside the grace period
pub fn is_in_grace_period(
    transaction: &Transaction,
    policy: &LibraryPolicy,
    now: DateTime<Utc>,
) -> bool {
    let at = evaluation_instant(transaction, now);
    at > transaction.due_date && at <= grace_period_end(transaction, policy)
}

/// Compute the current fine of a rental.
///
/// `book_cost` is the rented book's replacement cost when known. Lost items
/// are charged the capped daily fine plus replacement and processing fees no
/// matter how many days actually elapsed.
pub fn calculate_fine(
    transaction: &Transaction,
    book_cost: Option<Decimal>,
    policy: &LibraryPolicy,
    now: DateTime<Utc>,
) -> FineDetails {
    let mut details = FineDetails::empty(transaction.is_lost);

    if transaction.status == TransactionStatus::Returned && transaction.fine_paid {
        return details;
    }

    let at = evaluation_instant(transaction, now);
    let grace_end = grace_period_end(transaction, policy);

    if transaction.is_lost {
        if at > grace_end {
            details.days_overdue = days_between(grace_end, at);
        }
        details.daily_fine = to_cents(policy.max_fine_per_item);
        details.is_capped = true;
        details.breakdown.push(BreakdownLine {
            kind: BreakdownKind::Overdue,
            description: "Maximum overdue fine (item lost)".to_string(),
            amount: details.daily_fine,
        });

        details.replacement_cost = replacement_cost_for(book_cost, transaction, policy);
        details.processing_fee = to_cents(policy.lost_item_processing_fee);
        details.breakdown.push(BreakdownLine {
            kind: BreakdownKind::Replacement,
            description: "Book replacement cost".to_string(),
            amount: details.replacement_cost,
        });
        details.breakdown.push(BreakdownLine {
            kind: BreakdownKind::Processing,
            description: "Processing fee".to_string(),
            amount: details.processing_fee,
        });
    } else {
        if at <= transaction.due_date {
            return details;
        }

        if at <= grace_end {
            details.is_in_grace_period = true;
            details.grace_period_remaining = days_between(at, grace_end);
            return details;
        }

        details.days_overdue = days_between(grace_end, at);
        let accrued = policy.daily_fine_rate * Decimal::from(details.days_overdue);
        details.daily_fine = to_cents(accrued);
        if accrued > policy.max_fine_per_item {
            details.daily_fine = to_cents(policy.max_fine_per_item);
            details.is_capped = true;
        }
        details.breakdown.push(BreakdownLine {
            kind: BreakdownKind::Overdue,
            description: format!(
                "{} days x ${:.2}/day",
                details.days_overdue, policy.daily_fine_rate
            ),
            amount: details.daily_fine,
        });
    }

    details.total_fine = details.daily_fine + details.replacement_cost + details.processing_fee;
    details.waived_amount = to_cents(transaction.fine_waived_amount)
        .min(details.total_fine)
        .max(Decimal::ZERO);
    details.amount_due = details.total_fine - details.waived_amount;
    details
}

/// Whether the maintenance job should declare this rental lost
pub fn should_mark_as_lost(
    transaction: &Transaction,
    policy: &LibraryPolicy,
    now: DateTime<Utc>,
) -> bool {
    if transaction.is_lost || !transaction.status.is_active() || transaction.return_date.is_some() {
        return false;
    }
    now > policy.lost_threshold_date(transaction.due_date)
}

/// Flat one-time charge applied when an item is declared lost
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LostItemCharges {
    pub capped_fine: Decimal,
    pub replacement_cost: Decimal,
    pub processing_fee: Decimal,
    pub total: Decimal,
}

/// Charges for a lost item: the fine cap plus replacement and processing fees
pub fn lost_item_charges(
    book_cost: Option<Decimal>,
    transaction: &Transaction,
    policy: &LibraryPolicy,
) -> LostItemCharges {
    let replacement_cost = replacement_cost_for(book_cost, transaction, policy);
    let capped_fine = to_cents(policy.max_fine_per_item);
    let processing_fee = to_cents(policy.lost_item_processing_fee);
    LostItemCharges {
        capped_fine,
        replacement_cost,
        processing_fee,
        total: capped_fine + replacement_cost + processing_fee,
    }
}

/// Changes the maintenance job writes back for an active rental
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverdueUpdate {
    pub status: Option<TransactionStatus>,
    pub fine_start_date: Option<DateTime<Utc>>,
    pub fine_amount: Option<Decimal>,
}

impl OverdueUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.fine_start_date.is_none() && self.fine_amount.is_none()
    }
}

/// Status / fine changes for an active rental at `now`.
///
/// Issued rentals become overdue once past the grace period; the start of
/// accrual is recorded once; the stored amount follows the calculator unless
/// the fine was already settled.
pub fn overdue_update(
    transaction: &Transaction,
    book_cost: Option<Decimal>,
    policy: &LibraryPolicy,
    now: DateTime<Utc>,
) -> OverdueUpdate {
    let details = calculate_fine(transaction, book_cost, policy, now);
    let mut update = OverdueUpdate::default();

    if details.days_overdue > 0 && transaction.status == TransactionStatus::Issued {
        update.status = Some(TransactionStatus::Overdue);
    }

    if details.days_overdue > 0 && transaction.fine_start_date.is_none() {
        update.fine_start_date = Some(grace_period_end(transaction, policy));
    }

    if !transaction.fine_paid && details.amount_due != transaction.fine_amount {
        update.fine_amount = Some(details.amount_due);
    }

    update
}

/// Amount a single rental currently owes.
///
/// Settled rentals owe nothing; returned and lost rentals owe their stored
/// amount; active rentals owe what the calculator says right now.
pub fn outstanding(
    transaction: &Transaction,
    book_cost: Option<Decimal>,
    policy: &LibraryPolicy,
    now: DateTime<Utc>,
) -> Decimal {
    if transaction.fine_paid {
        return Decimal::ZERO;
    }
    match transaction.status {
        TransactionStatus::Returned | TransactionStatus::Lost => transaction.fine_amount,
        TransactionStatus::Issued | TransactionStatus::Overdue => {
            calculate_fine(transaction, book_cost, policy, now).amount_due
        }
    }
}

/// Sum of what a user's rentals owe
pub fn unpaid_total(records: &[RentalRecord], policy: &LibraryPolicy, now: DateTime<Utc>) -> Decimal {
    records
        .iter()
        .map(|r| outstanding(&r.transaction, r.book_replacement_cost, policy, now))
        .sum()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::enums::PaymentStatus;
    use chrono::{Duration, TimeZone};

    pub(crate) fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap() + Duration::days(n)
    }

    /// Rental issued 14 days before day 0 and due on day 0
    pub(crate) fn rental(id: i32) -> Transaction {
        Transaction {
            id,
            user_id: 1,
            book_id: 1,
            issue_date: day(-14),
            due_date: day(0),
            return_date: None,
            rental_duration: 14,
            rental_cost: Decimal::from(28),
            payment_status: PaymentStatus::Paid,
            delivery_address: None,
            status: TransactionStatus::Issued,
            fine_amount: Decimal::ZERO,
            fine_paid: false,
            fine_payment_date: None,
            fine_payment_method: None,
            fine_start_date: None,
            grace_period_end_date: None,
            is_lost: false,
            lost_date: None,
            replacement_cost: None,
            fine_waived_amount: Decimal::ZERO,
            fine_waived_notes: None,
            fine_waived_by: None,
            created_at: day(-14),
            updated_at: day(-14),
        }
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_days_between_rounds_up_partial_days() {
        assert_eq!(days_between(day(0), day(7)), 7);
        assert_eq!(days_between(day(0), day(7) + Duration::milliseconds(1)), 8);
        assert_eq!(days_between(day(0), day(0) + Duration::hours(1)), 1);
        assert_eq!(days_between(day(0), day(0)), 0);
        assert_eq!(days_between(day(0), day(0) - Duration::hours(1)), 0);
        assert_eq!(days_between(day(0), day(-2)), -2);
    }

    #[test]
    fn test_no_fine_before_due_date() {
        let policy = LibraryPolicy::default();
        let fine = calculate_fine(&rental(1), None, &policy, day(-3));
        assert_eq!(fine.total_fine, Decimal::ZERO);
        assert!(!fine.is_in_grace_period);
        assert!(fine.breakdown.is_empty());

        let at_due = calculate_fine(&rental(1), None, &policy, day(0));
        assert_eq!(at_due.total_fine, Decimal::ZERO);
        assert!(!at_due.is_in_grace_period);
    }

    #[test]
    fn test_no_fine_inside_grace_period() {
        let policy = LibraryPolicy::default();
        let fine = calculate_fine(&rental(1), None, &policy, day(1) + Duration::hours(2));
        assert!(fine.is_in_grace_period);
        assert_eq!(fine.grace_period_remaining, 2);
        assert_eq!(fine.days_overdue, 0);
        assert_eq!(fine.total_fine, Decimal::ZERO);

        let at_grace_end = calculate_fine(&rental(1), None, &policy, day(3));
        assert!(at_grace_end.is_in_grace_period);
        assert_eq!(at_grace_end.total_fine, Decimal::ZERO);
    }

    #[test]
    fn test_accrues_daily_after_grace_period() {
        let policy = LibraryPolicy::default();
        let fine = calculate_fine(&rental(1), None, &policy, day(10));
        assert_eq!(fine.days_overdue, 7);
        assert_eq!(fine.daily_fine, dec("3.50"));
        assert_eq!(fine.total_fine, dec("3.50"));
        assert_eq!(fine.amount_due, dec("3.50"));
        assert!(!fine.is_capped);
        assert_eq!(fine.breakdown.len(), 1);
        assert_eq!(fine.breakdown[0].kind, BreakdownKind::Overdue);
        assert_eq!(fine.breakdown[0].description, "7 days x $0.50/day");
    }

    #[test]
    fn test_partial_day_counts_as_full_day() {
        let policy = LibraryPolicy::default();
        let fine = calculate_fine(&rental(1), None, &policy, day(3) + Duration::minutes(5));
        assert_eq!(fine.days_overdue, 1);
        assert_eq!(fine.daily_fine, dec("0.50"));
    }

    #[test]
    fn test_fine_is_capped() {
        let policy = LibraryPolicy::default();
        let fine = calculate_fine(&rental(1), None, &policy, day(123));
        assert_eq!(fine.days_overdue, 120);
        assert!(fine.is_capped);
        assert_eq!(fine.daily_fine, dec("25"));
        assert_eq!(fine.total_fine, dec("25"));
    }

    #[test]
    fn test_cap_is_not_flagged_when_exactly_reached() {
        let policy = LibraryPolicy::default();
        let fine = calculate_fine(&rental(1), None, &policy, day(53));
        assert_eq!(fine.days_overdue, 50);
        assert_eq!(fine.daily_fine, dec("25"));
        assert!(!fine.is_capped);
    }

    #[test]
    fn test_amounts_are_rounded_to_cents() {
        let policy = LibraryPolicy {
            daily_fine_rate: dec("0.333"),
            lost_item_processing_fee: dec("15.005"),
            ..LibraryPolicy::default()
        };
        let fine = calculate_fine(&rental(1), None, &policy, day(10));
        assert_eq!(fine.days_overdue, 7);
        assert_eq!(fine.daily_fine, dec("2.33"));
        assert_eq!(fine.amount_due, dec("2.33"));

        // 2.33 is what the sweep stores, so the next sweep has nothing to write
        let mut stored = rental(1);
        stored.status = TransactionStatus::Overdue;
        stored.fine_start_date = Some(day(3));
        stored.fine_amount = dec("2.33");
        assert!(overdue_update(&stored, None, &policy, day(10)).is_empty());

        let charges = lost_item_charges(Some(dec("19.999")), &rental(2), &policy);
        assert_eq!(charges.replacement_cost, dec("20.00"));
        assert_eq!(charges.processing_fee, dec("15.01"));
        assert_eq!(charges.total, dec("60.01"));
    }

    #[test]
    fn test_stored_grace_period_end_wins() {
        let policy = LibraryPolicy::default();
        let mut tx = rental(1);
        tx.grace_period_end_date = Some(day(5));
        let fine = calculate_fine(&tx, None, &policy, day(10));
        assert_eq!(fine.days_overdue, 5);
        assert_eq!(fine.daily_fine, dec("2.5"));
    }

    #[test]
    fn test_returned_and_paid_is_zero() {
        let policy = LibraryPolicy::default();
        let mut tx = rental(1);
        tx.status = TransactionStatus::Returned;
        tx.return_date = Some(day(10));
        tx.fine_paid = true;
        tx.fine_amount = dec("3.5");
        let fine = calculate_fine(&tx, None, &policy, day(40));
        assert_eq!(fine.total_fine, Decimal::ZERO);
    }

    #[test]
    fn test_accrual_stops_at_return_date() {
        let policy = LibraryPolicy::default();
        let mut tx = rental(1);
        tx.status = TransactionStatus::Returned;
        tx.return_date = Some(day(10));
        let fine = calculate_fine(&tx, None, &policy, day(40));
        assert_eq!(fine.days_overdue, 7);
        assert_eq!(fine.total_fine, dec("3.5"));
    }

    #[test]
    fn test_lost_item_is_flat_charge() {
        let policy = LibraryPolicy::default();
        let mut tx = rental(1);
        tx.is_lost = true;
        tx.status = TransactionStatus::Lost;

        for now in [day(-1), day(10), day(200)] {
            let fine = calculate_fine(&tx, Some(dec("40")), &policy, now);
            assert!(fine.is_lost);
            assert!(fine.is_capped);
            assert_eq!(fine.daily_fine, dec("25"));
            assert_eq!(fine.replacement_cost, dec("40"));
            assert_eq!(fine.processing_fee, dec("15"));
            assert_eq!(fine.total_fine, dec("80"));
            assert_eq!(fine.breakdown.len(), 3);
        }
    }

    #[test]
    fn test_replacement_cost_fallbacks() {
        let policy = LibraryPolicy::default();
        let mut tx = rental(1);
        assert_eq!(replacement_cost_for(None, &tx, &policy), dec("25"));
        tx.replacement_cost = Some(dec("12"));
        assert_eq!(replacement_cost_for(None, &tx, &policy), dec("12"));
        assert_eq!(replacement_cost_for(Some(Decimal::ZERO), &tx, &policy), dec("12"));
        assert_eq!(replacement_cost_for(Some(dec("30")), &tx, &policy), dec("30"));
    }

    #[test]
    fn test_waivers_reduce_amount_due() {
        let policy = LibraryPolicy::default();
        let mut tx = rental(1);
        tx.fine_waived_amount = dec("1.5");
        let fine = calculate_fine(&tx, None, &policy, day(10));
        assert_eq!(fine.total_fine, dec("3.5"));
        assert_eq!(fine.waived_amount, dec("1.5"));
        assert_eq!(fine.amount_due, dec("2"));

        tx.fine_waived_amount = dec("10");
        let fine = calculate_fine(&tx, None, &policy, day(10));
        assert_eq!(fine.amount_due, Decimal::ZERO);
    }

    #[test]
    fn test_should_mark_as_lost() {
        let policy = LibraryPolicy::default();
        let tx = rental(1);
        assert!(!should_mark_as_lost(&tx, &policy, day(45)));
        assert!(should_mark_as_lost(&tx, &policy, day(45) + Duration::seconds(1)));

        let mut returned = rental(2);
        returned.status = TransactionStatus::Returned;
        returned.return_date = Some(day(50));
        assert!(!should_mark_as_lost(&returned, &policy, day(60)));

        let mut lost = rental(3);
        lost.is_lost = true;
        lost.status = TransactionStatus::Lost;
        assert!(!should_mark_as_lost(&lost, &policy, day(60)));
    }

    #[test]
    fn test_lost_item_charges() {
        let policy = LibraryPolicy::default();
        let charges = lost_item_charges(None, &rental(1), &policy);
        assert_eq!(charges.capped_fine, dec("25"));
        assert_eq!(charges.replacement_cost, dec("25"));
        assert_eq!(charges.processing_fee, dec("15"));
        assert_eq!(charges.total, dec("65"));
    }

    #[test]
    fn test_overdue_update_transitions_issued_rental() {
        let policy = LibraryPolicy::default();
        let tx = rental(1);

        assert!(overdue_update(&tx, None, &policy, day(2)).is_empty());

        let update = overdue_update(&tx, None, &policy, day(10));
        assert_eq!(update.status, Some(TransactionStatus::Overdue));
        assert_eq!(update.fine_start_date, Some(day(3)));
        assert_eq!(update.fine_amount, Some(dec("3.5")));
    }

    #[test]
    fn test_overdue_update_only_writes_changes() {
        let policy = LibraryPolicy::default();
        let mut tx = rental(1);
        tx.status = TransactionStatus::Overdue;
        tx.fine_start_date = Some(day(3));
        tx.fine_amount = dec("3.5");
        assert!(overdue_update(&tx, None, &policy, day(10)).is_empty());

        let update = overdue_update(&tx, None, &policy, day(11));
        assert_eq!(update.status, None);
        assert_eq!(update.fine_start_date, None);
        assert_eq!(update.fine_amount, Some(dec("4")));
    }

    #[test]
    fn test_overdue_update_keeps_settled_amount() {
        let policy = LibraryPolicy::default();
        let mut tx = rental(1);
        tx.status = TransactionStatus::Overdue;
        tx.fine_start_date = Some(day(3));
        tx.fine_paid = true;
        tx.fine_amount = dec("2");
        assert!(overdue_update(&tx, None, &policy, day(20)).is_empty());
    }

    #[test]
    fn test_outstanding_by_status() {
        let policy = LibraryPolicy::default();

        let active = rental(1);
        assert_eq!(outstanding(&active, None, &policy, day(10)), dec("3.5"));

        let mut returned = rental(2);
        returned.status = TransactionStatus::Returned;
        returned.return_date = Some(day(8));
        returned.fine_amount = dec("2.5");
        assert_eq!(outstanding(&returned, None, &policy, day(30)), dec("2.5"));

        let mut paid = rental(3);
        paid.fine_paid = true;
        paid.fine_amount = dec("3");
        assert_eq!(outstanding(&paid, None, &policy, day(30)), Decimal::ZERO);
    }

    #[test]
    fn test_unpaid_total_sums_records() {
        let policy = LibraryPolicy::default();
        let mut lost = rental(2);
        lost.is_lost = true;
        lost.status = TransactionStatus::Lost;
        lost.fine_amount = dec("65");

        let records = vec![
            RentalRecord {
                transaction: rental(1),
                book_title: "Dune".to_string(),
                book_replacement_cost: None,
            },
            RentalRecord {
                transaction: lost,
                book_title: "Emma".to_string(),
                book_replacement_cost: Some(dec("30")),
            },
        ];
        assert_eq!(unpaid_total(&records, &policy, day(10)), dec("68.5"));
        assert_eq!(unpaid_total(&[], &policy, day(10)), Decimal::ZERO);
    }
}
