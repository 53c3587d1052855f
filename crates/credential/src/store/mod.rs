//! Encrypted store containers and their on-disk lifecycle

pub mod bootstrap;
pub mod container;
pub mod file;
pub mod pkcs12;

pub use bootstrap::{SeedOutcome, SeedReport};
pub use container::{KeyedContainer, StoreEntry};
pub use file::StoreFile;
