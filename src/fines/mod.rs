//! Fine policy, calculation and account blocking rules

pub mod blocking;
pub mod calculator;
pub mod policy;

pub use blocking::{should_block, BlockDecision};
pub use calculator::{calculate_fine, FineDetails, LostItemCharges, OverdueUpdate};
pub use policy::LibraryPolicy;
