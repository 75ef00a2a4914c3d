//! Module records.
//!
//! A module is a named namespace of global bindings plus an ordered list of
//! `using` edges. One mutex per module serializes mutation of the binding
//! table and the `using` list; scalar fields are atomics and readable
//! without the lock.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};
use smallvec::SmallVec;
use vesper_ir::Name;

use crate::table::BindingTable;

/// Shared handle to a module. Modules are immortal once created: handles
/// are held by the runtime, parent links, `using` edges, and alias cells,
/// and the subsystem never frees them.
pub type ModuleRef = Arc<Module>;

/// 128-bit build identity.
///
/// The low half comes from the monotonic clock plus a process-wide counter
/// and is never zero; the high half is all-ones until a serializer
/// finalizes it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BuildId {
    pub lo: u64,
    pub hi: u64,
}

/// Externally assigned 128-bit identity, default all-zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Uuid128 {
    pub lo: u64,
    pub hi: u64,
}

/// State guarded by the per-module mutex.
pub(crate) struct ModuleState {
    pub(crate) bindings: BindingTable,
    /// Ordered `using` edges, most recently added last. Duplicates are
    /// forbidden.
    pub(crate) usings: SmallVec<[ModuleRef; 4]>,
}

/// A named namespace of global bindings.
pub struct Module {
    name: Name,
    /// `None` for roots (the record is its own parent).
    parent: Option<ModuleRef>,
    /// Identity hash mixed from the name hash and the parent hash.
    hash: u64,
    state: Mutex<ModuleState>,
    /// Monotonic counter for uniquifying generated symbols.
    counter: AtomicU32,
    build_id: BuildId,
    uuid: RwLock<Uuid128>,
    istopmod: AtomicBool,
    // Scalar options: -1 means "inherit from parent".
    optlevel: AtomicI32,
    compile: AtomicI32,
    infer: AtomicI32,
    max_methods: AtomicI32,
    /// 0 or -1; forced to -1 when inference is disabled.
    nospecialize: AtomicI32,
}

impl Module {
    pub(crate) fn new(name: Name, parent: Option<ModuleRef>, hash: u64, build_id: BuildId) -> ModuleRef {
        Arc::new(Module {
            name,
            parent,
            hash,
            state: Mutex::new(ModuleState {
                bindings: BindingTable::new(),
                usings: SmallVec::new(),
            }),
            counter: AtomicU32::new(1),
            build_id,
            uuid: RwLock::new(Uuid128::default()),
            istopmod: AtomicBool::new(false),
            optlevel: AtomicI32::new(-1),
            compile: AtomicI32::new(-1),
            infer: AtomicI32::new(-1),
            max_methods: AtomicI32::new(-1),
            nospecialize: AtomicI32::new(0),
        })
    }

    /// The module's interned name.
    pub fn name(&self) -> Name {
        self.name
    }

    /// Parent module; `None` for roots.
    pub fn parent(&self) -> Option<&ModuleRef> {
        self.parent.as_ref()
    }

    /// Identity hash (stable across the module's lifetime).
    pub fn identity_hash(&self) -> u64 {
        self.hash
    }

    /// Build identity assigned at construction.
    pub fn build_id(&self) -> BuildId {
        self.build_id
    }

    /// Externally assigned identity.
    pub fn uuid(&self) -> Uuid128 {
        *self.uuid.read()
    }

    pub fn set_uuid(&self, uuid: Uuid128) {
        *self.uuid.write() = uuid;
    }

    pub fn istopmod(&self) -> bool {
        self.istopmod.load(Ordering::Relaxed)
    }

    pub(crate) fn mark_istopmod(&self) {
        self.istopmod.store(true, Ordering::Release);
    }

    /// Next value of the per-module symbol counter.
    pub fn next_counter(&self) -> u32 {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ModuleState> {
        self.state.lock()
    }

    // Raw option accessors. Inheritance lives on the runtime, which knows
    // where the walk stops.

    pub(crate) fn optlevel_raw(&self) -> i32 {
        self.optlevel.load(Ordering::Relaxed)
    }

    pub(crate) fn set_optlevel_raw(&self, lvl: i32) {
        self.optlevel.store(lvl, Ordering::Relaxed);
    }

    pub(crate) fn compile_raw(&self) -> i32 {
        self.compile.load(Ordering::Relaxed)
    }

    pub(crate) fn set_compile_raw(&self, value: i32) {
        self.compile.store(value, Ordering::Relaxed);
    }

    pub(crate) fn infer_raw(&self) -> i32 {
        self.infer.load(Ordering::Relaxed)
    }

    pub(crate) fn set_infer_raw(&self, value: i32) {
        self.infer.store(value, Ordering::Relaxed);
    }

    pub(crate) fn max_methods_raw(&self) -> i32 {
        self.max_methods.load(Ordering::Relaxed)
    }

    pub(crate) fn set_max_methods_raw(&self, value: i32) {
        self.max_methods.store(value, Ordering::Relaxed);
    }

    /// Current specialization suppression: 0 or -1.
    pub fn nospecialize(&self) -> i32 {
        self.nospecialize.load(Ordering::Relaxed)
    }

    pub(crate) fn set_nospecialize_raw(&self, value: i32) {
        self.nospecialize.store(value, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("build_id", &self.build_id)
            .finish_non_exhaustive()
    }
}

/// Identity comparison of module handles.
#[inline]
pub fn same_module(a: &ModuleRef, b: &ModuleRef) -> bool {
    Arc::ptr_eq(a, b)
}

/// Does `ancestor` appear on `child`'s parent chain (including `child`
/// itself)? Reflexive and transitive.
pub fn is_submodule(child: &ModuleRef, ancestor: &ModuleRef) -> bool {
    let mut cur = child.clone();
    loop {
        if same_module(&cur, ancestor) {
            return true;
        }
        match cur.parent() {
            Some(p) => cur = p.clone(),
            None => return false,
        }
    }
}
