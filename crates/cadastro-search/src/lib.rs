//! Search-as-you-type for the patient registry.
//!
//! This crate turns keystrokes into [`SearchQuery`](cadastro_core::SearchQuery)
//! values, parses patient payloads returned by a remote registry, and keeps
//! a debounced search session where only the newest lookup wins.

pub mod query;
pub mod response;
pub mod session;

pub use query::*;
pub use response::*;
pub use session::*;
