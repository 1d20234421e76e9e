//! Blockstack (workspace facade crate).
//!
//! Re-exports the member crates under short paths:
//! `blockstack::{types, core, replay, engine, adapter}`.

pub use blockstack_adapter as adapter;
pub use blockstack_core as core;
pub use blockstack_engine as engine;
pub use blockstack_replay as replay;
pub use blockstack_types as types;
