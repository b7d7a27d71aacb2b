//! azrm - Azure Resource Manager provider plugin
//!
//! Builds one authenticated client per ARM service family from a single
//! service principal credential set, and maps declarative resource state
//! onto the remote API through per-type CRUD adapters.

pub mod arm;
pub mod config;
pub mod error;
pub mod resource;
