//! Vesper modules - namespaces and global bindings for the Vesper runtime.
//!
//! A module maps interned names to binding cells and carries an ordered
//! list of `using` edges. The subsystem resolves `module.name` lookups,
//! enforces assignment and constant rules, transfers ownership on import,
//! and reports conflicts and deprecations through a pluggable diagnostic
//! sink.
//!
//! # Architecture
//!
//! - [`Runtime`]: process-wide state (core/root/base handles, interner,
//!   deprecation mode, deferred-init queue) and the host-facing operations
//! - [`Module`]: per-module binding table, `using` list, scalar options
//! - [`Binding`]: one name → value cell; canonical, alias, or unresolved
//! - Resolution walks the own table, then `usings` last-to-first, and pins
//!   every successful `using` lookup as a local alias cell
//!
//! # Concurrency
//!
//! One mutex per module guards its table and `using` list; binding scalars
//! are atomics. No operation holds two module locks at once: cross-module
//! resolution snapshots the `using` list and re-validates slots after
//! re-acquisition, so cyclic `using` graphs cannot deadlock, and the frame
//! stack carried down the recursion keeps them from looping.

mod assign;
mod binding;
mod deprecation;
mod diagnostics;
pub mod errors;
mod import;
mod introspect;
mod module;
mod resolve;
mod runtime;
mod table;
mod value;

pub use binding::{
    Binding, BindingOwner, BindingRef, GlobalRef, DEPRECATED_MOVED, DEPRECATED_NONE,
    DEPRECATED_RENAMED,
};
pub use diagnostics::{
    buffer_sink, silent_sink, stderr_sink, BufferSink, DiagnosticSink, SharedSink, StderrSink,
};
pub use errors::{ModuleError, ModuleResult};
pub use module::{is_submodule, same_module, BuildId, Module, ModuleRef, Uuid128};
pub use resolve::eq_bindings;
pub use runtime::{DepWarnMode, Runtime, SourceLoc};
pub use table::BindingTable;
pub use value::{FunctionValue, TypeTag, Value};

// Re-export the name types most callers need alongside the modules API.
pub use vesper_ir::{Name, SharedInterner, StringInterner};
