pub mod amount;
pub mod error;
pub mod transaction;

pub use amount::{canonicalize, format_canonical, AMOUNT_SCALE};
pub use error::TransactionError;
pub use transaction::Transaction;
