//! Workspace facade crate.
//!
//! Re-exports the workspace crates so host applications can depend on
//! `medialib-workspace` alone instead of wiring each crate individually.

pub use bridge_traits;
pub use core_library;
pub use core_runtime;
