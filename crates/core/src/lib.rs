pub mod check;
pub mod config;
pub mod error;
pub mod lookup;

pub use check::{Check, CheckEvent, EventKind};
pub use config::NotifyConfig;
pub use error::*;
pub use lookup::{CheckLookup, MemoryCheckStore};
