//! Typed per-entity records, validated at the local-store boundary.

mod balance;
mod card;
mod entry;
mod limits;
mod note;

pub use balance::{balances_from_map, balances_to_map, BankBalance};
pub use card::CustomCard;
pub use entry::{Entry, EntryStatus, EntryType};
pub use limits::LimitSettings;
pub use note::Note;
