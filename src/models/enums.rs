//! Shared domain enums stored as lowercase text columns

use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, Postgres};
use utoipa::ToSchema;

/// Declares a string-backed enum with serde, Display/FromStr and SQLx text conversions.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($name), s)),
                }
            }
        }

        impl sqlx::Type<Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <&str as sqlx::Type<Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <&str as sqlx::Type<Postgres>>::compatible(ty)
            }
        }

        impl<'r> Decode<'r, Postgres> for $name {
            fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
                let s: &str = Decode::<Postgres>::decode(value)?;
                s.parse().map_err(|e: String| e.into())
            }
        }

        impl Encode<'_, Postgres> for $name {
            fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
                <&str as Encode<Postgres>>::encode_by_ref(&self.as_str(), buf)
            }
        }
    };
}

text_enum! {
    /// Lifecycle of a rental
    TransactionStatus {
        Issued => "issued",
        Overdue => "overdue",
        Returned => "returned",
        Lost => "lost",
    }
}

impl TransactionStatus {
    /// Book still out with the patron
    pub fn is_active(&self) -> bool {
        matches!(self, TransactionStatus::Issued | TransactionStatus::Overdue)
    }
}

text_enum! {
    /// Payment state of the rental fee (not the fine)
    PaymentStatus {
        Pending => "pending",
        Paid => "paid",
        Refunded => "refunded",
    }
}

text_enum! {
    /// How a fine was settled
    PaymentMethod {
        Online => "online",
        Cash => "cash",
        Card => "card",
        /// Cleared by an administrator waiver
        Waived => "waived",
    }
}

text_enum! {
    /// Account standing of a user
    AccountStatus {
        Active => "active",
        Blocked => "blocked",
        Suspended => "suspended",
    }
}

text_enum! {
    /// User role
    UserRole {
        User => "user",
        Admin => "admin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("Overdue".parse::<TransactionStatus>(), Ok(TransactionStatus::Overdue));
        assert_eq!("CASH".parse::<PaymentMethod>(), Ok(PaymentMethod::Cash));
        assert!("misplaced".parse::<TransactionStatus>().is_err());
    }

    #[test]
    fn test_serde_uses_lowercase() {
        let json = serde_json::to_string(&AccountStatus::Blocked).unwrap();
        assert_eq!(json, "\"blocked\"");
        let role: UserRole = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, UserRole::Admin);
    }

    #[test]
    fn test_active_statuses() {
        assert!(TransactionStatus::Issued.is_active());
        assert!(TransactionStatus::Overdue.is_active());
        assert!(!TransactionStatus::Returned.is_active());
        assert!(!TransactionStatus::Lost.is_active());
    }
}
