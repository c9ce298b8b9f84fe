//! Account blocking policy

use rust_decimal::Decimal;

use super::policy::LibraryPolicy;
use crate::models::enums::AccountStatus;

/// Blocks at or above the threshold
pub fn should_block(total_unpaid_fines: Decimal, policy: &LibraryPolicy) -> bool {
    total_unpaid_fines >= policy.account_block_threshold
}

/// Reason recorded on accounts blocked for unpaid fines
pub fn block_reason(policy: &LibraryPolicy) -> String {
    format!("Unpaid fines exceed ${}", policy.account_block_threshold)
}

/// What a recompute of the unpaid total means for the account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockDecision {
    Block,
    Unblock,
    Keep,
}

/// Decision after fines were added (maintenance job, lost item): never unblocks
pub fn after_fine_added(
    status: AccountStatus,
    total_unpaid_fines: Decimal,
    policy: &LibraryPolicy,
) -> BlockDecision {
    if status == AccountStatus::Active && should_block(total_unpaid_fines, policy) {
        BlockDecision::Block
    } else {
        BlockDecision::Keep
    }
}

/// Decision after a payment or waiver: lifts a block once under the threshold
pub fn after_settlement(
    status: AccountStatus,
    total_unpaid_fines: Decimal,
    policy: &LibraryPolicy,
) -> BlockDecision {
    if status == AccountStatus::Blocked && !should_block(total_unpaid_fines, policy) {
        BlockDecision::Unblock
    } else {
        BlockDecision::Keep
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_at_exactly_threshold() {
        let policy = LibraryPolicy::default();
        assert!(should_block(Decimal::from(50), &policy));
        assert!(!should_block(Decimal::new(4999, 2), &policy));
    }

    #[test]
    fn test_should_block_is_monotonic() {
        let policy = LibraryPolicy::default();
        let mut previous = false;
        for cents in (0..10_000).step_by(250) {
            let blocked = should_block(Decimal::new(cents, 2), &policy);
            assert!(blocked || !previous);
            previous = blocked;
        }
        assert!(previous);
    }

    #[test]
    fn test_fine_added_never_unblocks() {
        let policy = LibraryPolicy::default();
        assert_eq!(
            after_fine_added(AccountStatus::Active, Decimal::from(60), &policy),
            BlockDecision::Block
        );
        assert_eq!(
            after_fine_added(AccountStatus::Active, Decimal::from(10), &policy),
            BlockDecision::Keep
        );
        assert_eq!(
            after_fine_added(AccountStatus::Blocked, Decimal::ZERO, &policy),
            BlockDecision::Keep
        );
        assert_eq!(
            after_fine_added(AccountStatus::Suspended, Decimal::from(60), &policy),
            BlockDecision::Keep
        );
    }

    #[test]
    fn test_settlement_unblocks_below_threshold() {
        let policy = LibraryPolicy::default();
        assert_eq!(
            after_settlement(AccountStatus::Blocked, Decimal::from(20), &policy),
            BlockDecision::Unblock
        );
        assert_eq!(
            after_settlement(AccountStatus::Blocked, Decimal::from(50), &policy),
            BlockDecision::Keep
        );
        assert_eq!(
            after_settlement(AccountStatus::Active, Decimal::ZERO, &policy),
            BlockDecision::Keep
        );
    }

    #[test]
    fn test_block_reason_mentions_threshold() {
        let policy = LibraryPolicy::default();
        assert_eq!(block_reason(&policy), "Unpaid fines exceed $50.00");
    }
}
