pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod io;
pub mod storage;

pub use application::Engine;
pub use config::BankConfig;
pub use domain::*;
pub use storage::Repository;
