//! Sharded string interner with per-name precomputed hashes.
//!
//! Interning is O(1) with thread-safe concurrent access via per-shard
//! locking. Each interned name stores its full 64-bit hash next to the
//! text, so name hashing after interning is a table read, never a rehash.
//! Shards assemble striped global slots (entry index times the shard
//! count, plus the shard index), so a [`Name`] carries its own address
//! and no cross-shard coordination is needed to keep slots unique.

use crate::Name;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHasher};
use std::hash::Hasher;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Per-shard storage for interned strings.
struct InternShard {
    /// Map from string content to its assembled name.
    map: FxHashMap<&'static str, Name>,
    /// Interned text plus its precomputed hash, indexed by entry.
    entries: Vec<(&'static str, u64)>,
}

impl InternShard {
    fn new() -> Self {
        Self {
            map: FxHashMap::default(),
            entries: Vec::with_capacity(64),
        }
    }

    fn with_empty() -> Self {
        let mut shard = Self::new();
        // The empty string hashes to 0, so it lands in shard 0; its entry
        // 0 assembles to slot 0, which is Name::EMPTY.
        let empty: &'static str = "";
        shard.map.insert(empty, Name::EMPTY);
        shard.entries.push((empty, full_hash(empty)));
        shard
    }
}

/// Error when interning a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternError {
    /// Shard exceeded the slot space.
    ShardOverflow { shard_idx: usize, count: usize },
}

impl std::fmt::Display for InternError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InternError::ShardOverflow { shard_idx, count } => write!(
                f,
                "interner shard {shard_idx} exceeded capacity: {count} strings, max slot is {}",
                Name::MAX_SLOT
            ),
        }
    }
}

impl std::error::Error for InternError {}

/// Full 64-bit hash of identifier text, computed once at intern time.
fn full_hash(s: &str) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(s.as_bytes());
    hasher.finish()
}

/// Sharded string interner for concurrent access.
///
/// Interned strings are leaked; a [`Name`] and its text live for the rest
/// of the process. The shard of a name is the low bits of its hash, so a
/// single hash computation serves placement, the stored per-name hash,
/// and later equality-free lookups. Names of generated identifiers
/// (starting with `#`) come back with their hidden flag set.
pub struct StringInterner {
    shards: [RwLock<InternShard>; Name::NUM_SHARDS],
    /// Total count of interned strings across all shards (O(1) `len()`).
    total_count: AtomicUsize,
}

impl StringInterner {
    /// Create a new interner.
    pub fn new() -> Self {
        let shards = std::array::from_fn(|i| {
            if i == 0 {
                RwLock::new(InternShard::with_empty())
            } else {
                RwLock::new(InternShard::new())
            }
        });
        Self {
            shards,
            total_count: AtomicUsize::new(1),
        }
    }

    /// Try to intern a string, returning its [`Name`] or an error on
    /// slot-space exhaustion.
    pub fn try_intern(&self, s: &str) -> Result<Name, InternError> {
        let hash = full_hash(s);
        let shard_idx = (hash as usize) % Name::NUM_SHARDS;
        let shard = &self.shards[shard_idx];

        // Fast path: already interned
        {
            let guard = shard.read();
            if let Some(&name) = guard.map.get(s) {
                return Ok(name);
            }
        }

        let mut guard = shard.write();

        // Double-check after acquiring write lock
        if let Some(&name) = guard.map.get(s) {
            return Ok(name);
        }

        let entry_idx = guard.entries.len();
        let slot = entry_idx
            .checked_mul(Name::NUM_SHARDS)
            .and_then(|v| v.checked_add(shard_idx))
            .filter(|v| *v <= Name::MAX_SLOT as usize)
            .ok_or(InternError::ShardOverflow {
                shard_idx,
                count: entry_idx,
            })?;
        let name = Name::from_parts(slot as u32, s.starts_with('#'));

        // Leak the string to get 'static lifetime
        let leaked: &'static str = Box::leak(s.to_owned().into_boxed_str());
        guard.entries.push((leaked, hash));
        guard.map.insert(leaked, name);
        self.total_count.fetch_add(1, Ordering::Relaxed);

        Ok(name)
    }

    /// Intern a string, returning its [`Name`].
    ///
    /// # Panics
    /// Panics if a shard exhausts the slot space. Use
    /// [`StringInterner::try_intern`] for fallible interning.
    #[inline]
    pub fn intern(&self, s: &str) -> Name {
        match self.try_intern(s) {
            Ok(name) => name,
            Err(e) => panic!("{e}"),
        }
    }

    /// Look up the text for a name.
    ///
    /// The returned reference is `'static`: interned strings are never
    /// deallocated.
    pub fn lookup(&self, name: Name) -> &'static str {
        let guard = self.shards[name.shard()].read();
        guard.entries[name.entry()].0
    }

    /// Precomputed 64-bit hash of a name's text.
    pub fn hash_of(&self, name: Name) -> u64 {
        let guard = self.shards[name.shard()].read();
        guard.entries[name.entry()].1
    }

    /// Get the number of interned strings (O(1)).
    pub fn len(&self) -> usize {
        self.total_count.load(Ordering::Relaxed)
    }

    /// Check if the interner is empty (only has the empty string).
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared interner handle for cross-thread use.
///
/// The runtime owns one interner; subsystems clone this handle instead of
/// passing `Arc<StringInterner>` around directly.
#[derive(Clone)]
pub struct SharedInterner(Arc<StringInterner>);

impl SharedInterner {
    /// Create a new shared interner.
    pub fn new() -> Self {
        SharedInterner(Arc::new(StringInterner::new()))
    }
}

impl Default for SharedInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for SharedInterner {
    type Target = StringInterner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
