//! Data models for Bookrent

pub mod book;
pub mod enums;
pub mod fine;
pub mod transaction;
pub mod user;

// Re-export commonly used types
pub use book::Book;
pub use enums::{AccountStatus, PaymentMethod, PaymentStatus, TransactionStatus, UserRole};
pub use transaction::{RentalRecord, Transaction};
pub use user::{User, UserShort};
