//! Atomic item kinds for the Metapath engine.
//!
//! Every kind defines a lexical parse ([`AtomicType::parse_value`]), a
//! canonical string form ([`AtomicItem::as_string`]), an ordering where one
//! exists ([`AtomicItem::compare`]) and the casting rules between kinds
//! ([`AtomicItem::cast`]).

pub mod atomic;
pub mod atomic_type;
pub mod error;
pub mod temporal;

pub use atomic::AtomicItem;
pub use atomic_type::AtomicType;
pub use error::ValueError;
pub use temporal::{Date, DateTime, DayTimeDuration, YearMonthDuration};

pub use rust_decimal::Decimal;
