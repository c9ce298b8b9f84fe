//! Fine maintenance job
//!
//! Sweeps every active rental, moves overdue and lost items along their
//! lifecycle and blocks accounts whose unpaid total reaches the threshold.
//! Storage goes through [`FineLedger`] so the sweeps can be exercised against
//! a mock. Per-record failures are collected in the run report and never stop
//! the batch.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::{
    config::JobsConfig,
    error::AppResult,
    fines::{
        blocking::{self, BlockDecision},
        calculator::{self, OverdueUpdate},
        LibraryPolicy,
    },
    models::{
        enums::{AccountStatus, UserRole},
        transaction::{RentalRecord, Transaction},
        user::User,
    },
};

/// Storage operations the fine job needs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FineLedger: Send + Sync {
    /// Rentals still out (issued or overdue, not returned)
    async fn active_rentals(&self) -> AppResult<Vec<RentalRecord>>;

    async fn update_overdue(&self, transaction_id: i32, update: &OverdueUpdate) -> AppResult<()>;

    async fn mark_lost(
        &self,
        transaction_id: i32,
        lost_date: DateTime<Utc>,
        replacement_cost: Decimal,
        fine_amount: Decimal,
    ) -> AppResult<Transaction>;

    /// Patrons whose account is active
    async fn active_patrons(&self) -> AppResult<Vec<User>>;

    async fn user(&self, user_id: i32) -> AppResult<User>;

    /// Every rental of a user, settled ones included
    async fn user_rentals(&self, user_id: i32) -> AppResult<Vec<RentalRecord>>;

    async fn store_unpaid_total(&self, user_id: i32, total: Decimal) -> AppResult<()>;

    async fn block_user(&self, user_id: i32, reason: &str, date: DateTime<Utc>) -> AppResult<()>;

    async fn unblock_user(&self, user_id: i32) -> AppResult<()>;
}

/// What caused an unpaid total recompute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recompute {
    /// Fines were added: may block, never unblocks
    FineAdded,
    /// A payment or waiver: may unblock, never blocks
    Settlement,
    /// Display refresh: only the cached total changes
    Sync,
}

/// Outcome of an unpaid total recompute
#[derive(Debug, Clone, PartialEq)]
pub struct UnpaidRefresh {
    pub total: Decimal,
    pub decision: BlockDecision,
    pub account_status: AccountStatus,
}

/// Recompute and store a user's unpaid total, then apply the blocking policy.
///
/// Administrators are never blocked or unblocked automatically.
pub async fn refresh_unpaid_total<L: FineLedger + ?Sized>(
    ledger: &L,
    user_id: i32,
    policy: &LibraryPolicy,
    now: DateTime<Utc>,
    trigger: Recompute,
) -> AppResult<UnpaidRefresh> {
    let user = ledger.user(user_id).await?;
    let rentals = ledger.user_rentals(user_id).await?;
    let total = calculator::unpaid_total(&rentals, policy, now);

    if total != user.total_unpaid_fines {
        ledger.store_unpaid_total(user_id, total).await?;
    }

    let decision = match (user.role, trigger) {
        (UserRole::Admin, _) | (_, Recompute::Sync) => BlockDecision::Keep,
        (_, Recompute::FineAdded) => blocking::after_fine_added(user.account_status, total, policy),
        (_, Recompute::Settlement) => {
            blocking::after_settlement(user.account_status, total, policy)
        }
    };

    let account_status = match decision {
        BlockDecision::Block => {
            ledger
                .block_user(user_id, &blocking::block_reason(policy), now)
                .await?;
            info!(user_id, %total, "Account blocked for unpaid fines");
            AccountStatus::Blocked
        }
        BlockDecision::Unblock => {
            ledger.unblock_user(user_id).await?;
            info!(user_id, %total, "Account unblocked");
            AccountStatus::Active
        }
        BlockDecision::Keep => user.account_status,
    };

    Ok(UnpaidRefresh {
        total,
        decision,
        account_status,
    })
}

/// Failure on a single record
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i32>,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct OverdueSweep {
    pub processed: usize,
    pub updated: usize,
    pub errors: Vec<JobError>,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct LostSweep {
    pub processed: usize,
    pub marked_lost: usize,
    pub errors: Vec<JobError>,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct BlockSweep {
    pub processed: usize,
    pub blocked: usize,
    pub errors: Vec<JobError>,
}

/// Report of a full maintenance run
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FineJobReport {
    pub ran_at: DateTime<Utc>,
    pub overdue: OverdueSweep,
    pub lost: LostSweep,
    pub blocked: BlockSweep,
}

/// The three maintenance sweeps over a ledger
#[derive(Clone)]
pub struct FineJob<L> {
    ledger: L,
    policy: LibraryPolicy,
}

impl<L: FineLedger> FineJob<L> {
    pub fn new(ledger: L, policy: LibraryPolicy) -> Self {
        Self { ledger, policy }
    }

    /// Move issued rentals past their grace period to overdue and refresh stored fines
    pub async fn update_overdue_fines(&self, now: DateTime<Utc>) -> AppResult<OverdueSweep> {
        let mut sweep = OverdueSweep::default();

        for record in self.ledger.active_rentals().await? {
            sweep.processed += 1;
            let transaction = &record.transaction;
            let update = calculator::overdue_update(
                transaction,
                record.book_replacement_cost,
                &self.policy,
                now,
            );
            if update.is_empty() {
                continue;
            }

            match self.ledger.update_overdue(transaction.id, &update).await {
                Ok(()) => sweep.updated += 1,
                Err(e) => {
                    warn!(transaction_id = transaction.id, error = %e, "Failed to update overdue fine");
                    sweep.errors.push(JobError {
                        transaction_id: Some(transaction.id),
                        user_id: Some(transaction.user_id),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(sweep)
    }

    /// Declare rentals lost once past the lost-item threshold
    pub async fn mark_lost_items(&self, now: DateTime<Utc>) -> AppResult<LostSweep> {
        let mut sweep = LostSweep::default();

        for record in self.ledger.active_rentals().await? {
            sweep.processed += 1;
            let transaction = &record.transaction;
            if !calculator::should_mark_as_lost(transaction, &self.policy, now) {
                continue;
            }

            let charges = calculator::lost_item_charges(
                record.book_replacement_cost,
                transaction,
                &self.policy,
            );
            let due = charges.total - transaction.fine_waived_amount.min(charges.total);

            if let Err(e) = self
                .ledger
                .mark_lost(transaction.id, now, charges.replacement_cost, due)
                .await
            {
                warn!(transaction_id = transaction.id, error = %e, "Failed to mark item as lost");
                sweep.errors.push(JobError {
                    transaction_id: Some(transaction.id),
                    user_id: Some(transaction.user_id),
                    error: e.to_string(),
                });
                continue;
            }
            sweep.marked_lost += 1;
            info!(
                transaction_id = transaction.id,
                user_id = transaction.user_id,
                total = %charges.total,
                "Item marked as lost"
            );

            // the item stays lost even when the owner's total cannot be refreshed
            if let Err(e) = refresh_unpaid_total(
                &self.ledger,
                transaction.user_id,
                &self.policy,
                now,
                Recompute::FineAdded,
            )
            .await
            {
                warn!(user_id = transaction.user_id, error = %e, "Failed to refresh unpaid fines");
                sweep.errors.push(JobError {
                    transaction_id: Some(transaction.id),
                    user_id: Some(transaction.user_id),
                    error: e.to_string(),
                });
            }
        }

        Ok(sweep)
    }

    /// Refresh every active patron's unpaid total and block those over the threshold
    pub async fn block_accounts_with_high_fines(&self, now: DateTime<Utc>) -> AppResult<BlockSweep> {
        let mut sweep = BlockSweep::default();

        for user in self.ledger.active_patrons().await? {
            sweep.processed += 1;
            match refresh_unpaid_total(&self.ledger, user.id, &self.policy, now, Recompute::FineAdded)
                .await
            {
                Ok(refresh) if refresh.decision == BlockDecision::Block => sweep.blocked += 1,
                Ok(_) => {}
                Err(e) => {
                    warn!(user_id = user.id, error = %e, "Failed to refresh unpaid fines");
                    sweep.errors.push(JobError {
                        transaction_id: None,
                        user_id: Some(user.id),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(sweep)
    }

    /// Run the three sweeps in order
    pub async fn run_all(&self, now: DateTime<Utc>) -> AppResult<FineJobReport> {
        let overdue = self.update_overdue_fines(now).await?;
        let lost = self.mark_lost_items(now).await?;
        let blocked = self.block_accounts_with_high_fines(now).await?;

        info!(
            overdue_processed = overdue.processed,
            overdue_updated = overdue.updated,
            marked_lost = lost.marked_lost,
            blocked = blocked.blocked,
            errors = overdue.errors.len() + lost.errors.len() + blocked.errors.len(),
            "Fine maintenance run completed"
        );

        Ok(FineJobReport {
            ran_at: now,
            overdue,
            lost,
            blocked,
        })
    }
}

/// Runs the fine job on a fixed interval in a background task
pub struct FineJobScheduler<L> {
    job: FineJob<L>,
    config: JobsConfig,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl<L: FineLedger + Clone + 'static> FineJobScheduler<L> {
    pub fn new(job: FineJob<L>, config: JobsConfig) -> Self {
        Self {
            job,
            config,
            shutdown_tx: None,
            handle: None,
        }
    }

    /// Start the background task
    pub fn start(&mut self) {
        if !self.config.enabled {
            info!("Fine maintenance job is disabled");
            return;
        }

        let (tx, mut rx) = mpsc::channel::<()>(1);
        self.shutdown_tx = Some(tx);

        let job = self.job.clone();
        let period = Duration::from_secs(self.config.fine_sweep_interval_secs.max(1));
        let run_on_startup = self.config.run_on_startup;

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            if !run_on_startup {
                // the first tick completes immediately
                ticker.tick().await;
            }

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = job.run_all(Utc::now()).await {
                            error!(error = %e, "Fine maintenance run failed");
                        }
                    }
                    _ = rx.recv() => {
                        info!("Fine maintenance job shutting down");
                        break;
                    }
                }
            }
        });
        self.handle = Some(handle);

        info!(
            interval_secs = period.as_secs(),
            "Fine maintenance job scheduled"
        );
    }

    /// Stop the background task, letting a run in progress finish
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            if tx.send(()).await.is_err() {
                warn!("Fine maintenance job already stopped");
            }
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "Fine maintenance job panicked");
            }
        }
    }
}
