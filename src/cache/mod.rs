//! Cache module for storing computed payloads on disk
//!
//! Keys resolve to JSON files under a cache root (`path`), freshness is judged
//! from file modification times (`validity`), files are read and written by
//! `store`, and `manager` ties them together into the read-through `Cache`.

mod manager;
pub mod path;
pub mod store;
pub mod validity;


pub use manager::{
    env_bypass_probe, exit_fatal_hook, BoxError, BypassProbe, Cache, FatalHook, Produced,
};
pub use path::resolve;
pub use store::StoreError;
