//! Rental (transaction) service

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use super::fine_job::{self, Recompute};
use crate::{
    error::{AppError, AppResult},
    fines::{calculator, LibraryPolicy},
    models::{
        enums::{PaymentStatus, TransactionStatus},
        transaction::{NewTransaction, RentBook, RentalRecord, Transaction, TransactionView},
        user::User,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct RentalsService {
    repository: Repository,
    policy: LibraryPolicy,
}

/// Listing view of a rental with what it owes at `now`
pub(crate) fn transaction_view(
    transaction: Transaction,
    book_title: String,
    book_cost: Option<Decimal>,
    policy: &LibraryPolicy,
    now: DateTime<Utc>,
) -> TransactionView {
    let current_fine = calculator::outstanding(&transaction, book_cost, policy, now);
    let days_overdue = calculator::calculate_days_overdue(&transaction, policy, now);
    TransactionView {
        transaction,
        book_title,
        user_name: None,
        user_email: None,
        current_fine,
        days_overdue,
    }
}

/// Shipping address taken from the membership form
fn delivery_address(user: &User) -> Option<String> {
    let details = user.membership_details.as_ref()?;
    let parts: Vec<&str> = [&details.address, &details.city, &details.postal_code]
        .into_iter()
        .filter_map(|p| p.as_deref())
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

/// Account checks done before anything about the book, in this order:
/// blocked, not a member, unpaid fines
fn check_can_rent(user: &User, unpaid: Decimal) -> AppResult<()> {
    if user.is_blocked() {
        return Err(AppError::AccountBlocked(
            user.account_block_reason
                .clone()
                .unwrap_or_else(|| "Your account is blocked".to_string()),
        ));
    }
    if !user.is_member {
        return Err(AppError::MembershipRequired(
            "Submit the membership form before renting".to_string(),
        ));
    }
    if unpaid > Decimal::ZERO {
        return Err(AppError::BusinessRule(format!(
            "You have ${:.2} in unpaid fines, pay them before renting",
            unpaid
        )));
    }
    Ok(())
}

/// Rental length asked for, or the default, within the allowed range
fn rental_days(requested: Option<i64>, policy: &LibraryPolicy) -> AppResult<i64> {
    let days = requested.unwrap_or(policy.default_rental_days);
    if days < 1 || days > policy.max_rental_days {
        return Err(AppError::Validation(format!(
            "Rental duration must be between 1 and {} days",
            policy.max_rental_days
        )));
    }
    Ok(days)
}

impl RentalsService {
    pub fn new(repository: Repository, policy: LibraryPolicy) -> Self {
        Self { repository, policy }
    }

    /// Rent a book
    pub async fn rent(&self, user_id: i32, request: RentBook) -> AppResult<TransactionView> {
        let now = Utc::now();
        let user = self.repository.users.get_by_id(user_id).await?;

        let unpaid = fine_job::refresh_unpaid_total(
            &self.repository,
            user_id,
            &self.policy,
            now,
            Recompute::Sync,
        )
        .await?
        .total;
        check_can_rent(&user, unpaid)?;

        let days = rental_days(request.rental_duration, &self.policy)?;
        let book = self.repository.books.get_by_id(request.book_id).await?;

        if self
            .repository
            .transactions
            .find_active(user_id, book.id)
            .await?
            .is_some()
        {
            return Err(AppError::BusinessRule(
                "You are already renting this book".to_string(),
            ));
        }

        if !self.repository.books.take_copy(book.id).await? {
            return Err(AppError::BookUnavailable(format!(
                "No copy of \"{}\" is available",
                book.title
            )));
        }

        let due_date = now + Duration::days(days);
        let rental = NewTransaction {
            user_id,
            book_id: book.id,
            issue_date: now,
            due_date,
            grace_period_end_date: self.policy.grace_period_end(due_date),
            rental_duration: days as i32,
            rental_cost: self.policy.rental_cost(days),
            delivery_address: delivery_address(&user),
        };

        let transaction = match self.repository.transactions.create(&rental).await {
            Ok(transaction) => transaction,
            Err(e) => {
                self.repository.books.return_copy(book.id).await?;
                return Err(e);
            }
        };

        tracing::info!(
            transaction_id = transaction.id,
            user_id,
            book_id = book.id,
            days,
            "Book rented"
        );
        Ok(transaction_view(transaction, book.title, Some(book.replacement_cost), &self.policy, now))
    }

    /// Patron returns one of their rentals by book
    pub async fn return_book(&self, user_id: i32, book_id: i32) -> AppResult<TransactionView> {
        let transaction = self
            .repository
            .transactions
            .find_active(user_id, book_id)
            .await?
            .ok_or_else(|| AppError::NotFound("No active rental found for this book".to_string()))?;

        let record = self.repository.transactions.get_record(transaction.id).await?;
        self.close(record).await
    }

    /// Administrator marks a rental returned
    pub async fn admin_return(&self, transaction_id: i32) -> AppResult<TransactionView> {
        let record = self.repository.transactions.get_record(transaction_id).await?;
        match record.transaction.status {
            TransactionStatus::Returned => Err(AppError::BusinessRule(
                "Transaction is already returned".to_string(),
            )),
            TransactionStatus::Lost => Err(AppError::BusinessRule(
                "Lost items cannot be returned".to_string(),
            )),
            TransactionStatus::Issued | TransactionStatus::Overdue => self.close(record).await,
        }
    }

    /// Freeze the fine at return time and put the copy back
    async fn close(&self, record: RentalRecord) -> AppResult<TransactionView> {
        let now = Utc::now();
        let transaction = &record.transaction;
        let details =
            calculator::calculate_fine(transaction, record.book_replacement_cost, &self.policy, now);
        let fine_start_date = (details.days_overdue > 0)
            .then(|| calculator::grace_period_end(transaction, &self.policy));

        let returned = self
            .repository
            .transactions
            .mark_returned(transaction.id, now, details.amount_due, fine_start_date)
            .await?;
        self.repository.books.return_copy(returned.book_id).await?;

        fine_job::refresh_unpaid_total(
            &self.repository,
            returned.user_id,
            &self.policy,
            now,
            Recompute::FineAdded,
        )
        .await?;

        tracing::info!(
            transaction_id = returned.id,
            fine = %returned.fine_amount,
            "Book returned"
        );
        Ok(transaction_view(
            returned,
            record.book_title,
            record.book_replacement_cost,
            &self.policy,
            now,
        ))
    }

    /// Pay the rental fee of one of the patron's rentals
    pub async fn pay_rental(&self, user_id: i32, transaction_id: i32) -> AppResult<TransactionView> {
        let record = self.repository.transactions.get_record(transaction_id).await?;
        if record.transaction.user_id != user_id {
            return Err(AppError::NotFound(format!(
                "Transaction with id {} not found",
                transaction_id
            )));
        }
        if record.transaction.payment_status != PaymentStatus::Pending {
            return Err(AppError::BusinessRule(
                "Rental fee is already settled".to_string(),
            ));
        }

        let paid = self
            .repository
            .transactions
            .mark_rental_paid(transaction_id)
            .await?;
        tracing::info!(transaction_id, "Rental fee paid");
        Ok(transaction_view(
            paid,
            record.book_title,
            record.book_replacement_cost,
            &self.policy,
            Utc::now(),
        ))
    }

    /// Rentals of a patron with their current fine
    pub async fn my_transactions(&self, user_id: i32) -> AppResult<Vec<TransactionView>> {
        let now = Utc::now();
        let records = self.repository.transactions.user_records(user_id).await?;
        Ok(records
            .into_iter()
            .map(|r| {
                transaction_view(
                    r.transaction,
                    r.book_title,
                    r.book_replacement_cost,
                    &self.policy,
                    now,
                )
            })
            .collect())
    }

    /// Every rental with its owner and current fine
    pub async fn all_transactions(&self) -> AppResult<Vec<TransactionView>> {
        let now = Utc::now();
        let records = self.repository.transactions.all_records().await?;
        Ok(records
            .into_iter()
            .map(|r| {
                let mut view = transaction_view(
                    r.transaction,
                    r.book_title,
                    r.book_replacement_cost,
                    &self.policy,
                    now,
                );
                view.user_name = Some(r.user_name);
                view.user_email = Some(r.user_email);
                view
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fines::calculator::tests::{day, rental};
    use crate::models::{
        enums::{AccountStatus, UserRole},
        user::MembershipDetails,
    };

    #[test]
    fn test_rental_days_bounds() {
        let policy = LibraryPolicy::default();
        assert_eq!(rental_days(None, &policy).unwrap(), 14);
        assert_eq!(rental_days(Some(30), &policy).unwrap(), 30);
        assert!(matches!(rental_days(Some(31), &policy), Err(AppError::Validation(_))));
        assert!(matches!(rental_days(Some(0), &policy), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_view_reports_current_fine() {
        let policy = LibraryPolicy::default();
        let view = transaction_view(rental(1), "Dune".to_string(), None, &policy, day(10));
        assert_eq!(view.current_fine, Decimal::new(350, 2));
        assert_eq!(view.days_overdue, 7);
        assert!(view.user_name.is_none());
    }

    fn member() -> User {
        User {
            id: 1,
            name: "Reader".to_string(),
            email: "reader@example.org".to_string(),
            password: String::new(),
            role: UserRole::User,
            is_member: true,
            membership_details: None,
            account_status: AccountStatus::Active,
            account_block_reason: None,
            account_block_date: None,
            total_unpaid_fines: Decimal::ZERO,
            created_at: day(0),
            updated_at: day(0),
        }
    }

    #[test]
    fn test_member_in_good_standing_can_rent() {
        assert!(check_can_rent(&member(), Decimal::ZERO).is_ok());
    }

    #[test]
    fn test_blocked_account_cannot_rent() {
        let mut user = member();
        user.account_status = AccountStatus::Blocked;
        user.account_block_reason = Some("Unpaid fines exceed $50.00".to_string());

        match check_can_rent(&user, Decimal::ZERO) {
            Err(AppError::AccountBlocked(reason)) => {
                assert_eq!(reason, "Unpaid fines exceed $50.00")
            }
            other => panic!("expected AccountBlocked, got {:?}", other),
        }

        // blocked wins over every other refusal
        user.is_member = false;
        assert!(matches!(
            check_can_rent(&user, Decimal::from(60)),
            Err(AppError::AccountBlocked(_))
        ));
    }

    #[test]
    fn test_rent_refusal_order() {
        let mut user = member();
        user.is_member = false;
        assert!(matches!(
            check_can_rent(&user, Decimal::from(5)),
            Err(AppError::MembershipRequired(_))
        ));

        assert!(matches!(
            check_can_rent(&member(), Decimal::new(50, 2)),
            Err(AppError::BusinessRule(_))
        ));
    }

    #[test]
    fn test_delivery_address_joins_membership_fields() {
        let mut user = member();
        assert_eq!(delivery_address(&user), None);

        user.membership_details = Some(MembershipDetails {
            address: Some("12 Canal Road".to_string()),
            city: Some("Lahore".to_string()),
            postal_code: Some(" ".to_string()),
            ..Default::default()
        });
        assert_eq!(delivery_address(&user).as_deref(), Some("12 Canal Road, Lahore"));
    }
}
