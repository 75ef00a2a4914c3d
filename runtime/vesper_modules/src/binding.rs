//! Per-name binding cells.
//!
//! A binding is the mutable cell behind `module.name`. The cell is either
//! canonical (it holds the value), an alias forwarding to a canonical cell
//! in some other module (the result of `import` or `using` materialization),
//! or unresolved (created by `export` or a global-ref request before any
//! definition was seen).
//!
//! Owner chains are one hop by construction: an alias always targets a
//! canonical binding, never another alias.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use vesper_ir::Name;

use crate::module::ModuleRef;
use crate::value::{TypeTag, Value};

/// Shared handle to a binding cell.
pub type BindingRef = Arc<Binding>;

/// Deprecation level of a binding.
pub const DEPRECATED_NONE: u8 = 0;
/// Deprecated because the name was renamed.
pub const DEPRECATED_RENAMED: u8 = 1;
/// Deprecated because the definition moved to another package.
pub const DEPRECATED_MOVED: u8 = 2;

/// Who holds the value for a cell.
#[derive(Clone, Debug, Default)]
pub enum BindingOwner {
    /// The cell exists (export or reservation) but no definition was found.
    #[default]
    Unresolved,
    /// This cell is the authoritative location of the value.
    Canonical,
    /// Forward to the canonical cell in another module.
    Alias(BindingRef),
}

/// A `(module, name, binding)` triple handed to the evaluator.
///
/// Compiled code keeps these so it can re-resolve a binding after owner
/// changes without re-hashing the name.
#[derive(Clone)]
pub struct GlobalRef {
    pub module: ModuleRef,
    pub name: Name,
    pub binding: BindingRef,
}

/// A mutable name → value cell inside one module.
///
/// Scalar flags are atomics and may be read without the module lock;
/// mutation of `owner` happens only under the owning module's lock, so
/// readers can tolerate a stale "not yet owned" view and retry resolution.
pub struct Binding {
    /// Module whose table holds this cell.
    home: ModuleRef,
    /// Name this cell is filed under in `home`.
    name: Name,
    value: RwLock<Option<Value>>,
    declared_ty: RwLock<Option<TypeTag>>,
    owner: RwLock<BindingOwner>,
    constp: AtomicBool,
    exportp: AtomicBool,
    imported: AtomicBool,
    deprecated: AtomicU8,
}

impl Binding {
    /// Create an unresolved cell filed under `name` in `home`.
    pub(crate) fn new(home: &ModuleRef, name: Name) -> BindingRef {
        Arc::new(Binding {
            home: home.clone(),
            name,
            value: RwLock::new(None),
            declared_ty: RwLock::new(None),
            owner: RwLock::new(BindingOwner::Unresolved),
            constp: AtomicBool::new(false),
            exportp: AtomicBool::new(false),
            imported: AtomicBool::new(false),
            deprecated: AtomicU8::new(DEPRECATED_NONE),
        })
    }

    /// Create a canonical (self-owned) cell.
    pub(crate) fn new_canonical(home: &ModuleRef, name: Name) -> BindingRef {
        let b = Binding::new(home, name);
        *b.owner.write() = BindingOwner::Canonical;
        b
    }

    /// The module whose table holds this cell.
    pub fn home_module(&self) -> &ModuleRef {
        &self.home
    }

    /// The name this cell is filed under.
    pub fn name(&self) -> Name {
        self.name
    }

    /// The evaluator-facing `(module, name, binding)` triple for this cell.
    pub(crate) fn globalref(self: &Arc<Self>) -> GlobalRef {
        GlobalRef {
            module: self.home.clone(),
            name: self.name,
            binding: Arc::clone(self),
        }
    }

    /// Snapshot of the current value.
    pub fn value(&self) -> Option<Value> {
        self.value.read().clone()
    }

    /// Unconditional store.
    pub(crate) fn store_value(&self, v: Value) {
        *self.value.write() = Some(v);
    }

    /// First-write-wins store. Returns `false` when a value was already
    /// present.
    pub(crate) fn init_value(&self, v: Value) -> bool {
        let mut slot = self.value.write();
        if slot.is_none() {
            *slot = Some(v);
            true
        } else {
            false
        }
    }

    pub(crate) fn value_slot(&self) -> &RwLock<Option<Value>> {
        &self.value
    }

    /// Declared type of this cell, if any.
    pub fn declared_type(&self) -> Option<TypeTag> {
        *self.declared_ty.read()
    }

    /// Promote an unset declared type to `Any`. Returns the previously
    /// declared type, or `None` when this call performed the promotion.
    pub(crate) fn promote_declared_type(&self) -> Option<TypeTag> {
        let mut ty = self.declared_ty.write();
        match *ty {
            None => {
                *ty = Some(TypeTag::Any);
                None
            }
            prev => prev,
        }
    }

    /// Declare a type for this cell. First declaration wins; returns
    /// `false` when a type (possibly the `Any` promotion) was already set.
    pub(crate) fn init_declared_type(&self, ty: TypeTag) -> bool {
        let mut slot = self.declared_ty.write();
        if slot.is_none() {
            *slot = Some(ty);
            true
        } else {
            false
        }
    }

    /// Snapshot of the owner field.
    pub fn owner(&self) -> BindingOwner {
        self.owner.read().clone()
    }

    /// Does this cell hold its own value?
    pub fn is_canonical(&self) -> bool {
        matches!(*self.owner.read(), BindingOwner::Canonical)
    }

    /// Has resolution decided an owner for this cell?
    pub fn is_resolved(&self) -> bool {
        !matches!(*self.owner.read(), BindingOwner::Unresolved)
    }

    /// Claim an unresolved cell as canonical. Returns `true` when this call
    /// performed the transition. Callers hold the home module's lock.
    pub(crate) fn claim_ownership(&self) -> bool {
        let mut owner = self.owner.write();
        if matches!(*owner, BindingOwner::Unresolved) {
            *owner = BindingOwner::Canonical;
            true
        } else {
            false
        }
    }

    /// Point this cell at a canonical binding in another module. Callers
    /// hold the home module's lock.
    pub(crate) fn set_owner_alias(&self, target: BindingRef) {
        debug_assert!(target.is_canonical());
        *self.owner.write() = BindingOwner::Alias(target);
    }

    /// Constant flag. Monotonic: never cleared once set.
    pub fn is_const(&self) -> bool {
        self.constp.load(Ordering::Relaxed)
    }

    /// Set the constant flag unconditionally.
    pub(crate) fn set_const(&self) {
        self.constp.store(true, Ordering::Release);
    }

    /// Compare-and-swap the constant flag. Returns `true` when this call
    /// won the transition.
    pub(crate) fn try_mark_const(&self) -> bool {
        self.constp
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Export flag: visible to modules `using` the home module.
    pub fn is_exported(&self) -> bool {
        self.exportp.load(Ordering::Relaxed)
    }

    pub(crate) fn set_exported(&self) {
        self.exportp.store(true, Ordering::Release);
    }

    /// Was this cell produced by an explicit `import`?
    pub fn is_imported(&self) -> bool {
        self.imported.load(Ordering::Relaxed)
    }

    pub(crate) fn set_imported(&self, imported: bool) {
        self.imported.store(imported, Ordering::Release);
    }

    /// Deprecation level: 0 none, 1 renamed, 2 moved.
    pub fn deprecation(&self) -> u8 {
        self.deprecated.load(Ordering::Relaxed)
    }

    /// Is this binding deprecated at any level?
    pub fn is_deprecated(&self) -> bool {
        self.deprecation() != DEPRECATED_NONE
    }

    pub(crate) fn set_deprecation(&self, flag: u8) {
        self.deprecated.store(flag, Ordering::Release);
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("name", &self.name)
            .field("owner", &*self.owner.read())
            .field("constp", &self.is_const())
            .field("exportp", &self.is_exported())
            .field("imported", &self.is_imported())
            .field("deprecated", &self.deprecation())
            .finish_non_exhaustive()
    }
}
