//! KV Core - storage contract
//!
//! Contains:
//! - Store: the operation set every backend implements
//! - KvError: the error taxonomy shared by all backends
//! - StoreConfig: backend selection and JSON-file options

mod config;
mod error;
mod store;

pub use config::*;
pub use error::*;
pub use store::*;
