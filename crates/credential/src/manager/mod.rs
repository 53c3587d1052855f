//! The credential manager service: stores, cache, configuration

mod cache;
pub mod config;
mod manager;

pub use config::CredentialConfig;
pub use manager::CredentialManager;
pub(crate) use manager::ManagerInner;
