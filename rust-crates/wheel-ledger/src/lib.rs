use tracing_subscriber::EnvFilter;

pub mod account;

pub mod audit;

pub mod config;

pub mod error;

pub mod ledger;

pub mod prize_table;

pub mod referral;

pub mod registration;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Install a fmt subscriber honouring `RUST_LOG`, defaulting to `info`.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
