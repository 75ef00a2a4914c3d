//! Vesper IR - interned names shared across the Vesper runtime.
//!
//! Global names in Vesper are interned once and compared by identity. The
//! interner also records a 64-bit hash per name at intern time, so consumers
//! (module tables, method tables) never re-hash identifier text.

mod interner;
mod name;

pub use interner::{InternError, SharedInterner, StringInterner};
pub use name::{bitmix, Name};
