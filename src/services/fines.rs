//! Fine payment, waiver and reporting service

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::fine_job::{self, Recompute, UnpaidRefresh};
use crate::{
    error::{AppError, AppResult},
    fines::{calculator, policy::FineConfig, LibraryPolicy},
    models::{
        enums::{PaymentMethod, TransactionStatus},
        fine::{
            Debtor, FineEntry, FineHistory, FineReport, FineSummary, MarkLostResponse,
            PaidTransaction, PayAllResponse, PayFineResponse, ReportFine, ReportSummary,
            UserFines, WaiveFineRequest, WaiveFineResponse,
        },
        transaction::{RentalRecord, Transaction},
        user::UserShort,
    },
    repository::Repository,
};

const RECENTLY_PAID_LIMIT: i64 = 20;
const TOP_DEBTORS: usize = 10;

#[derive(Clone)]
pub struct FinesService {
    repository: Repository,
    policy: LibraryPolicy,
}

impl FinesService {
    pub fn new(repository: Repository, policy: LibraryPolicy) -> Self {
        Self { repository, policy }
    }

    pub fn config(&self) -> FineConfig {
        self.policy.fine_config()
    }

    async fn refresh(&self, user_id: i32, now: DateTime<Utc>, trigger: Recompute) -> AppResult<UnpaidRefresh> {
        fine_job::refresh_unpaid_total(&self.repository, user_id, &self.policy, now, trigger).await
    }

    /// A patron's fines split into unpaid and paid
    pub async fn user_fines(&self, user_id: i32) -> AppResult<UserFines> {
        let now = Utc::now();
        let user = self.repository.users.get_by_id(user_id).await?;
        let records = self.repository.transactions.user_records(user_id).await?;
        let refresh = self.refresh(user_id, now, Recompute::Sync).await?;

        let mut unpaid_fines = Vec::new();
        let mut paid_fines = Vec::new();
        for record in records {
            let Some(entry) = fine_entry(record, &self.policy, now) else {
                continue;
            };
            if entry.fine_paid {
                paid_fines.push(entry);
            } else {
                unpaid_fines.push(entry);
            }
        }

        Ok(UserFines {
            unpaid_fines,
            paid_fines,
            total_unpaid: refresh.total,
            account_blocked: user.is_blocked(),
            block_threshold: self.policy.account_block_threshold,
        })
    }

    /// Fine counters and policy for the patron dashboard
    pub async fn summary(&self, user_id: i32) -> AppResult<FineSummary> {
        let now = Utc::now();
        let user = self.repository.users.get_by_id(user_id).await?;
        let records = self.repository.transactions.user_records(user_id).await?;
        let refresh = self.refresh(user_id, now, Recompute::Sync).await?;

        let overdue_items = records
            .iter()
            .filter(|r| {
                r.transaction.status.is_active()
                    && calculator::calculate_days_overdue(&r.transaction, &self.policy, now) > 0
            })
            .count() as i64;
        let lost_items = records
            .iter()
            .filter(|r| r.transaction.status == TransactionStatus::Lost)
            .count() as i64;

        Ok(FineSummary {
            total_unpaid_fines: refresh.total,
            overdue_items,
            lost_items,
            is_blocked: user.is_blocked(),
            account_block_reason: user.account_block_reason,
            daily_fine_rate: self.policy.daily_fine_rate,
            grace_period_days: self.policy.grace_period_days,
            max_fine_per_item: self.policy.max_fine_per_item,
            block_threshold: self.policy.account_block_threshold,
        })
    }

    /// Payment history, newest first
    pub async fn history(&self, user_id: i32) -> AppResult<FineHistory> {
        let history = self.repository.users.fine_payments(user_id).await?;
        let total_paid = history
            .iter()
            .filter(|p| p.payment_method != PaymentMethod::Waived)
            .map(|p| p.amount)
            .sum();
        Ok(FineHistory { history, total_paid })
    }

    /// Settle the fine of one rental; the caller refreshes the user's total
    async fn settle(
        &self,
        record: &RentalRecord,
        method: PaymentMethod,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<Transaction> {
        let transaction = &record.transaction;
        let amount = payable_amount(record, &self.policy, now)?;

        let paid = self
            .repository
            .transactions
            .mark_fine_paid(transaction.id, amount, method, now)
            .await?;
        self.repository
            .users
            .record_fine_payment(transaction.user_id, transaction.id, amount, method, notes, now)
            .await?;

        tracing::info!(
            transaction_id = transaction.id,
            user_id = transaction.user_id,
            %amount,
            method = %method,
            "Fine paid"
        );
        Ok(paid)
    }

    async fn owned_record(&self, user_id: i32, transaction_id: i32) -> AppResult<RentalRecord> {
        let record = self.repository.transactions.get_record(transaction_id).await?;
        if record.transaction.user_id != user_id {
            return Err(AppError::NotFound(format!(
                "Transaction with id {} not found",
                transaction_id
            )));
        }
        Ok(record)
    }

    /// Patron pays one fine
    pub async fn pay_fine(
        &self,
        user_id: i32,
        transaction_id: i32,
        method: Option<PaymentMethod>,
    ) -> AppResult<PayFineResponse> {
        let method = patron_method(method)?;
        let now = Utc::now();
        let record = self.owned_record(user_id, transaction_id).await?;

        let paid = self.settle(&record, method, None, now).await?;
        let refresh = self.refresh(user_id, now, Recompute::Settlement).await?;

        Ok(PayFineResponse {
            success: true,
            message: format!("Fine of ${:.2} paid", paid.fine_amount),
            transaction_id: paid.id,
            fine_amount: paid.fine_amount,
            fine_paid: paid.fine_paid,
            fine_payment_date: paid.fine_payment_date,
            new_total_unpaid: refresh.total,
            account_status: refresh.account_status,
        })
    }

    /// Patron pays every fine that can be settled
    pub async fn pay_all(&self, user_id: i32, method: Option<PaymentMethod>) -> AppResult<PayAllResponse> {
        let method = patron_method(method)?;
        let now = Utc::now();
        let records = self.repository.transactions.user_records(user_id).await?;

        let payable: Vec<RentalRecord> = records
            .into_iter()
            .filter(|r| payable_amount(r, &self.policy, now).is_ok())
            .collect();
        if payable.is_empty() {
            return Err(AppError::BusinessRule("No fines to pay".to_string()));
        }

        let mut paid_transactions = Vec::with_capacity(payable.len());
        for record in &payable {
            let paid = self.settle(record, method, None, now).await?;
            paid_transactions.push(PaidTransaction {
                transaction_id: paid.id,
                book_title: record.book_title.clone(),
                amount: paid.fine_amount,
            });
        }
        let total_paid: Decimal = paid_transactions.iter().map(|p| p.amount).sum();
        let refresh = self.refresh(user_id, now, Recompute::Settlement).await?;

        Ok(PayAllResponse {
            success: true,
            message: format!("{} fines paid, ${:.2} in total", paid_transactions.len(), total_paid),
            paid_transactions,
            total_paid,
            new_total_unpaid: refresh.total,
            account_status: refresh.account_status,
        })
    }

    /// Administrator records a fine paid at the desk
    pub async fn admin_mark_paid(
        &self,
        admin_id: i32,
        transaction_id: i32,
        method: Option<PaymentMethod>,
    ) -> AppResult<PayFineResponse> {
        let method = method.unwrap_or(PaymentMethod::Cash);
        if method == PaymentMethod::Waived {
            return Err(AppError::Validation(
                "Use the waive endpoint to waive a fine".to_string(),
            ));
        }

        let now = Utc::now();
        let record = self.repository.transactions.get_record(transaction_id).await?;
        let notes = format!("Marked paid by administrator #{}", admin_id);
        let paid = self.settle(&record, method, Some(&notes), now).await?;
        let refresh = self
            .refresh(paid.user_id, now, Recompute::Settlement)
            .await?;

        Ok(PayFineResponse {
            success: true,
            message: format!("Fine of ${:.2} marked as paid", paid.fine_amount),
            transaction_id: paid.id,
            fine_amount: paid.fine_amount,
            fine_paid: paid.fine_paid,
            fine_payment_date: paid.fine_payment_date,
            new_total_unpaid: refresh.total,
            account_status: refresh.account_status,
        })
    }

    /// Waive all or part of what a rental currently owes
    pub async fn waive(
        &self,
        admin_id: i32,
        transaction_id: i32,
        request: WaiveFineRequest,
    ) -> AppResult<WaiveFineResponse> {
        let now = Utc::now();
        let record = self.repository.transactions.get_record(transaction_id).await?;
        let transaction = &record.transaction;
        if transaction.fine_paid {
            return Err(AppError::FineAlreadyPaid(
                "Fine has already been paid".to_string(),
            ));
        }

        let original_fine = calculator::outstanding(
            transaction,
            record.book_replacement_cost,
            &self.policy,
            now,
        );
        let plan = plan_waiver(original_fine, &request)?;
        let waived_total = transaction.fine_waived_amount + plan.waived;
        let notes = request.notes.as_deref().map(str::trim).filter(|n| !n.is_empty());

        let updated = self
            .repository
            .transactions
            .apply_waiver(
                transaction.id,
                waived_total,
                notes,
                admin_id,
                plan.remaining,
                plan.settled,
                now,
            )
            .await?;
        self.repository
            .users
            .record_fine_payment(
                transaction.user_id,
                transaction.id,
                plan.waived,
                PaymentMethod::Waived,
                notes,
                now,
            )
            .await?;
        self.refresh(transaction.user_id, now, Recompute::Settlement)
            .await?;

        tracing::info!(
            transaction_id,
            admin_id,
            waived = %plan.waived,
            remaining = %plan.remaining,
            "Fine waived"
        );

        Ok(WaiveFineResponse {
            success: true,
            message: if plan.settled {
                "Fine waived".to_string()
            } else {
                format!("${:.2} waived, ${:.2} remaining", plan.waived, plan.remaining)
            },
            transaction: updated,
            original_fine,
            waived: plan.waived,
            remaining: plan.remaining,
        })
    }

    /// Administrator declares a rental lost
    pub async fn mark_lost(&self, transaction_id: i32) -> AppResult<MarkLostResponse> {
        let now = Utc::now();
        let record = self.repository.transactions.get_record(transaction_id).await?;
        let transaction = &record.transaction;
        if !transaction.status.is_active() {
            return Err(AppError::BusinessRule(
                "Only rentals still out can be marked as lost".to_string(),
            ));
        }

        let charges =
            calculator::lost_item_charges(record.book_replacement_cost, transaction, &self.policy);
        let due = charges.total - transaction.fine_waived_amount.min(charges.total);
        let lost = self
            .repository
            .transactions
            .mark_lost(transaction.id, now, charges.replacement_cost, due)
            .await?;
        self.refresh(lost.user_id, now, Recompute::FineAdded).await?;

        tracing::info!(transaction_id, total = %charges.total, "Item marked as lost");
        Ok(MarkLostResponse {
            success: true,
            message: format!("Item marked as lost, ${:.2} charged", due),
            transaction: lost,
            charges,
        })
    }

    /// Outstanding and recently collected fines across all users
    pub async fn report(&self) -> AppResult<FineReport> {
        let unpaid_fines = self.repository.transactions.report_unpaid().await?;
        let recently_paid = self
            .repository
            .transactions
            .report_recently_paid(RECENTLY_PAID_LIMIT)
            .await?;
        let total_collected = self.repository.transactions.total_collected().await?;

        let mut top_debtors = debtors(&unpaid_fines);
        let summary = ReportSummary {
            total_unpaid_fines: unpaid_fines.iter().map(|f| f.fine_amount).sum(),
            total_collected,
            unpaid_count: unpaid_fines.len() as i64,
            users_with_fines: top_debtors.len() as i64,
        };
        top_debtors.truncate(TOP_DEBTORS);

        Ok(FineReport {
            unpaid_fines,
            recently_paid,
            top_debtors,
            summary,
        })
    }
}

/// What settling a rental's fine charges at `now`.
///
/// Rentals still out are charged the fine accrued so far; returned and lost
/// rentals their stored amount.
fn payable_amount(
    record: &RentalRecord,
    policy: &LibraryPolicy,
    now: DateTime<Utc>,
) -> AppResult<Decimal> {
    let transaction = &record.transaction;
    if transaction.fine_paid {
        return Err(AppError::FineAlreadyPaid(
            "Fine has already been paid".to_string(),
        ));
    }

    let amount = calculator::outstanding(transaction, record.book_replacement_cost, policy, now);
    if amount <= Decimal::ZERO {
        return Err(AppError::BusinessRule("No fine to pay".to_string()));
    }
    Ok(amount)
}

/// Patrons pay online unless they say otherwise, and cannot waive
fn patron_method(method: Option<PaymentMethod>) -> AppResult<PaymentMethod> {
    match method.unwrap_or(PaymentMethod::Online) {
        PaymentMethod::Waived => Err(AppError::Validation(
            "Invalid payment method".to_string(),
        )),
        method => Ok(method),
    }
}

/// Fine page entry, or None for rentals that never carried a fine
fn fine_entry(record: RentalRecord, policy: &LibraryPolicy, now: DateTime<Utc>) -> Option<FineEntry> {
    let transaction = record.transaction;
    let details = calculator::calculate_fine(&transaction, record.book_replacement_cost, policy, now);

    let fine_amount = if transaction.fine_paid {
        transaction.fine_amount
    } else {
        calculator::outstanding(&transaction, record.book_replacement_cost, policy, now)
    };
    let settled_by_waiver = transaction.fine_payment_method == Some(PaymentMethod::Waived);
    if fine_amount <= Decimal::ZERO && !settled_by_waiver {
        return None;
    }

    Some(FineEntry {
        transaction_id: transaction.id,
        book_id: transaction.book_id,
        book_title: record.book_title,
        issue_date: transaction.issue_date,
        due_date: transaction.due_date,
        return_date: transaction.return_date,
        grace_period_end_date: transaction.grace_period_end_date,
        status: transaction.status,
        is_lost: transaction.is_lost,
        lost_date: transaction.lost_date,
        fine_amount,
        fine_paid: transaction.fine_paid,
        fine_payment_date: transaction.fine_payment_date,
        currently_accruing: transaction.status.is_active() && details.days_overdue > 0,
        fine_details: details,
    })
}

#[derive(Debug, PartialEq)]
struct WaiverPlan {
    waived: Decimal,
    remaining: Decimal,
    settled: bool,
}

/// Amount to waive from what is currently owed
fn plan_waiver(owed: Decimal, request: &WaiveFineRequest) -> AppResult<WaiverPlan> {
    if owed <= Decimal::ZERO {
        return Err(AppError::BusinessRule("No fine to waive".to_string()));
    }

    let waived = if request.waive_all {
        owed
    } else {
        match request.waive_amount {
            Some(amount) if amount > Decimal::ZERO => amount.min(owed),
            _ => {
                return Err(AppError::Validation(
                    "Provide a positive waive_amount or set waive_all".to_string(),
                ))
            }
        }
    };

    let remaining = owed - waived;
    Ok(WaiverPlan {
        waived,
        remaining,
        settled: request.waive_all || remaining <= Decimal::ZERO,
    })
}

/// Unpaid fines grouped by user, largest total first
fn debtors(unpaid: &[ReportFine]) -> Vec<Debtor> {
    let mut by_user: HashMap<i32, Debtor> = HashMap::new();
    for fine in unpaid {
        let debtor = by_user.entry(fine.user_id).or_insert_with(|| Debtor {
            user: UserShort {
                id: fine.user_id,
                name: fine.user_name.clone(),
                email: fine.user_email.clone(),
                account_status: fine.account_status,
            },
            total_fines: Decimal::ZERO,
            fine_count: 0,
        });
        debtor.total_fines += fine.fine_amount;
        debtor.fine_count += 1;
    }

    let mut debtors: Vec<Debtor> = by_user.into_values().collect();
    debtors.sort_by(|a, b| b.total_fines.cmp(&a.total_fines).then(a.user.id.cmp(&b.user.id)));
    debtors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fines::calculator::tests::{day, rental};
    use crate::models::enums::AccountStatus;

    fn waive(amount: Option<i64>, all: bool) -> WaiveFineRequest {
        WaiveFineRequest {
            waive_amount: amount.map(Decimal::from),
            waive_all: all,
            notes: None,
        }
    }

    #[test]
    fn test_waive_all_settles() {
        let plan = plan_waiver(Decimal::from(12), &waive(None, true)).unwrap();
        assert_eq!(plan.waived, Decimal::from(12));
        assert_eq!(plan.remaining, Decimal::ZERO);
        assert!(plan.settled);
    }

    #[test]
    fn test_partial_waiver_is_clamped() {
        let partial = plan_waiver(Decimal::from(12), &waive(Some(5), false)).unwrap();
        assert_eq!(partial.remaining, Decimal::from(7));
        assert!(!partial.settled);

        let over = plan_waiver(Decimal::from(12), &waive(Some(40), false)).unwrap();
        assert_eq!(over.waived, Decimal::from(12));
        assert!(over.settled);
    }

    #[test]
    fn test_waiver_rejects_bad_requests() {
        assert!(matches!(
            plan_waiver(Decimal::ZERO, &waive(None, true)),
            Err(AppError::BusinessRule(_))
        ));
        assert!(matches!(
            plan_waiver(Decimal::from(3), &waive(Some(0), false)),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            plan_waiver(Decimal::from(3), &waive(None, false)),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_patron_cannot_pay_by_waiver() {
        assert_eq!(patron_method(None).unwrap(), PaymentMethod::Online);
        assert_eq!(patron_method(Some(PaymentMethod::Card)).unwrap(), PaymentMethod::Card);
        assert!(patron_method(Some(PaymentMethod::Waived)).is_err());
    }

    fn record(transaction: Transaction) -> RentalRecord {
        RentalRecord {
            transaction,
            book_title: "Solaris".to_string(),
            book_replacement_cost: None,
        }
    }

    #[test]
    fn test_fine_entry_skips_rentals_without_fines() {
        let policy = LibraryPolicy::default();
        assert!(fine_entry(record(rental(1)), &policy, day(2)).is_none());

        let entry = fine_entry(record(rental(1)), &policy, day(10)).unwrap();
        assert_eq!(entry.fine_amount, Decimal::new(350, 2));
        assert!(entry.currently_accruing);
    }

    #[test]
    fn test_fine_entry_keeps_settled_amount() {
        let policy = LibraryPolicy::default();
        let mut paid = rental(1);
        paid.status = TransactionStatus::Lost;
        paid.is_lost = true;
        paid.fine_amount = Decimal::from(65);
        paid.fine_paid = true;
        paid.fine_payment_method = Some(PaymentMethod::Cash);

        let entry = fine_entry(record(paid), &policy, day(60)).unwrap();
        assert_eq!(entry.fine_amount, Decimal::from(65));
        assert!(!entry.currently_accruing);
    }

    #[test]
    fn test_rental_still_out_pays_fine_accrued_so_far() {
        let policy = LibraryPolicy::default();
        let mut overdue = rental(1);
        overdue.status = TransactionStatus::Overdue;
        overdue.fine_start_date = Some(day(3));
        overdue.fine_amount = Decimal::new(350, 2);

        // two more days accrued since the last sweep stored 3.50
        let record = record(overdue);
        let amount = payable_amount(&record, &policy, day(12)).unwrap();
        let expected = calculator::calculate_fine(&record.transaction, None, &policy, day(12));
        assert_eq!(amount, expected.amount_due);
        assert_eq!(amount, Decimal::new(450, 2));
    }

    #[test]
    fn test_payable_amount_refusals() {
        let policy = LibraryPolicy::default();

        let mut paid = rental(1);
        paid.status = TransactionStatus::Returned;
        paid.return_date = Some(day(10));
        paid.fine_amount = Decimal::new(350, 2);
        paid.fine_paid = true;
        assert!(matches!(
            payable_amount(&record(paid), &policy, day(20)),
            Err(AppError::FineAlreadyPaid(_))
        ));

        // inside the grace period nothing is owed yet
        assert!(matches!(
            payable_amount(&record(rental(2)), &policy, day(2)),
            Err(AppError::BusinessRule(_))
        ));

        let mut returned = rental(3);
        returned.status = TransactionStatus::Returned;
        returned.return_date = Some(day(10));
        returned.fine_amount = Decimal::new(350, 2);
        assert_eq!(
            payable_amount(&record(returned), &policy, day(40)).unwrap(),
            Decimal::new(350, 2)
        );
    }

    fn report_fine(user_id: i32, amount: i64) -> ReportFine {
        ReportFine {
            transaction_id: user_id * 100 + amount as i32,
            user_id,
            user_name: format!("User {}", user_id),
            user_email: format!("user{}@example.org", user_id),
            account_status: AccountStatus::Active,
            book_title: "Solaris".to_string(),
            status: TransactionStatus::Returned,
            fine_amount: Decimal::from(amount),
            fine_payment_date: None,
            fine_payment_method: None,
        }
    }

    #[test]
    fn test_debtors_grouped_and_sorted() {
        let unpaid = vec![
            report_fine(1, 10),
            report_fine(2, 30),
            report_fine(1, 25),
            report_fine(3, 5),
        ];
        let debtors = debtors(&unpaid);
        assert_eq!(debtors.len(), 3);
        assert_eq!(debtors[0].user.id, 1);
        assert_eq!(debtors[0].total_fines, Decimal::from(35));
        assert_eq!(debtors[0].fine_count, 2);
        assert_eq!(debtors[1].user.id, 2);
        assert_eq!(debtors[2].user.id, 3);
    }
}
