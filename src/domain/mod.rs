mod account;
mod customer;
mod loan;
pub(crate) mod money;
pub mod numbers;
mod reserve;
mod transaction;

pub use account::*;
pub use customer::*;
pub use loan::*;
pub use money::*;
pub use reserve::*;
pub use transaction::*;
