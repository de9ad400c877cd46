//! engine-link (workspace facade crate).
//!
//! Re-exports the workspace crates under one roof so tools and tests can use
//! `engine_link::{adapter,core,protocol,types}` while the implementation lives
//! in dedicated crates under `crates/`.

pub use engine_link_adapter as adapter;
pub use engine_link_core as core;
pub use engine_link_protocol as protocol;
pub use engine_link_types as types;
