//! Binding resolution.
//!
//! Resolution answers "which cell holds the value of `module.name`": first
//! the module's own table, then, for unresolved names, a last-to-first walk
//! of its `using` list that recurses into foreign modules. A successful
//! `using` lookup materializes a local alias cell, pinning the decision for
//! good; an ambiguous one pins a placeholder and warns once.
//!
//! Lock discipline: the resolver never holds two module locks at once. The
//! `using` list is snapshotted under the owning module's lock and the walk
//! runs on the snapshot; every table access re-acquires the relevant lock
//! and re-validates the slot. Cyclic `using` graphs terminate through the
//! frame stack carried down the recursion, independent of lock order.

use std::sync::Arc;

use tracing::debug;
use vesper_ir::Name;

use crate::binding::{Binding, BindingOwner, BindingRef, GlobalRef};
use crate::errors::{self, ModuleResult};
use crate::module::{same_module, ModuleRef};
use crate::runtime::Runtime;
use crate::value::{TypeTag, Value};

/// One frame of the resolution stack, linked through the call stack.
struct ModStack<'a> {
    module: &'a ModuleRef,
    name: Name,
    prev: Option<&'a ModStack<'a>>,
}

fn stack_contains(st: Option<&ModStack<'_>>, m: &ModuleRef, var: Name) -> bool {
    let mut cur = st;
    while let Some(frame) = cur {
        if frame.name == var && same_module(frame.module, m) {
            return true;
        }
        cur = frame.prev;
    }
    false
}

/// Do two cells resolve to the same definition?
///
/// True when they are the same cell, share a canonical owner, or are both
/// constants holding equal values. The last case collapses genuine
/// re-exports: a constant imported and re-exported through a second module
/// does not count as a conflicting name.
pub fn eq_bindings(a: &BindingRef, b: &BindingRef) -> bool {
    if Arc::ptr_eq(a, b) {
        return true;
    }
    let owner_of = |x: &BindingRef| match x.owner() {
        BindingOwner::Canonical => Some(Arc::clone(x)),
        BindingOwner::Alias(o) => Some(o),
        BindingOwner::Unresolved => None,
    };
    match (owner_of(a), owner_of(b)) {
        (Some(x), Some(y)) if Arc::ptr_eq(&x, &y) => return true,
        (None, None) => return true,
        _ => {}
    }
    if a.is_const() && b.is_const() {
        if let (Some(va), Some(vb)) = (a.value(), b.value()) {
            return va.egal(&vb);
        }
    }
    false
}

impl Runtime {
    /// The raw cell stored for `var` in `m`'s own table, if any. No owner
    /// projection, no `using` search.
    pub fn get_module_binding(&self, m: &ModuleRef, var: Name) -> Option<BindingRef> {
        m.lock().bindings.lookup(var).cloned()
    }

    /// Resolve `m.var` for assignment.
    ///
    /// Returns the canonical local cell, creating one when absent and
    /// `alloc` is set. An unresolved local cell is claimed as canonical. A
    /// cell forwarding to another module fails with `CannotAssignImported`
    /// when `alloc` is set.
    pub fn get_binding_wr(
        &self,
        m: &ModuleRef,
        var: Name,
        alloc: bool,
    ) -> ModuleResult<Option<BindingRef>> {
        let mut state = m.lock();
        if let Some(b) = state.bindings.lookup(var).cloned() {
            b.claim_ownership();
            if alloc && !b.is_canonical() {
                drop(state);
                return Err(errors::cannot_assign_imported(
                    self.text(m.name()),
                    self.text(var),
                ));
            }
            return Ok(Some(b));
        }
        if alloc {
            let b = Binding::new_canonical(m, var);
            state.bindings.insert(var, b.clone());
            Ok(Some(b))
        } else {
            Ok(None)
        }
    }

    /// Resolve `m.var` for assignment, always allocating.
    pub fn get_binding_wr_or_error(&self, m: &ModuleRef, var: Name) -> ModuleResult<BindingRef> {
        match self.get_binding_wr(m, var, true)? {
            Some(b) => Ok(b),
            None => Err(errors::undefined_var(self.text(var))),
        }
    }

    /// Resolve `m.var` for extending a generic function.
    ///
    /// Like [`Runtime::get_binding_wr`], but a cell forwarding to another
    /// module returns the foreign owner instead, provided the cell was
    /// explicitly imported or the owner is a constant bound to a type
    /// (constructor extension is permitted implicitly). Anything else fails
    /// with `MustExplicitlyImport`.
    pub fn get_binding_for_method_def(
        &self,
        m: &ModuleRef,
        var: Name,
    ) -> ModuleResult<BindingRef> {
        let b = {
            let mut state = m.lock();
            match state.bindings.slot(var) {
                std::collections::hash_map::Entry::Occupied(e) => e.get().clone(),
                std::collections::hash_map::Entry::Vacant(e) => {
                    let b = Binding::new_canonical(m, var);
                    e.insert(b.clone());
                    return Ok(b);
                }
            }
        };
        if b.claim_ownership() {
            return Ok(b);
        }
        match b.owner() {
            BindingOwner::Canonical | BindingOwner::Unresolved => Ok(b),
            BindingOwner::Alias(owner) => {
                debug_assert!(owner.value().is_some());
                let ctor_extension =
                    owner.is_const() && owner.value().is_some_and(|v| v.is_type());
                if !b.is_imported() && !ctor_extension {
                    Err(errors::must_explicitly_import(
                        self.text(m.name()),
                        self.text(var),
                    ))
                } else {
                    Ok(owner)
                }
            }
        }
    }

    /// Resolve `m.var` for reading. Returns the canonical binding, or
    /// `None` for unbound or ambiguous names.
    pub fn get_binding(&self, m: &ModuleRef, var: Name) -> Option<BindingRef> {
        self.resolve_owner(None, m, var, None)
    }

    /// Resolve `m.var` for reading, raising `UndefinedVarError` when
    /// unbound and the deprecation machinery when deprecated.
    pub fn get_binding_or_error(&self, m: &ModuleRef, var: Name) -> ModuleResult<BindingRef> {
        let Some(b) = self.get_binding(m, var) else {
            return Err(errors::undefined_var(self.text(var)));
        };
        if b.is_deprecated() {
            self.binding_deprecation_warning(m, var, &b)?;
        }
        Ok(b)
    }

    /// Resolve through `m`'s own table only: follow one owner hop, but do
    /// not search `usings` and do not materialize.
    pub fn get_binding_if_bound(&self, m: &ModuleRef, var: Name) -> Option<BindingRef> {
        let cell = self.get_module_binding(m, var)?;
        match cell.owner() {
            BindingOwner::Canonical => Some(cell),
            BindingOwner::Alias(o) => Some(o),
            BindingOwner::Unresolved => None,
        }
    }

    /// Best-effort snapshot of the current likely owner of `m.var`,
    /// without materializing anything. The answer may change as imports
    /// and assignments land.
    pub fn binding_owner(&self, m: &ModuleRef, var: Name) -> Option<BindingRef> {
        match self.get_module_binding(m, var) {
            Some(cell) => match cell.owner() {
                BindingOwner::Canonical => Some(cell),
                BindingOwner::Alias(o) => Some(o),
                BindingOwner::Unresolved => self
                    .using_resolve_binding(m, var, None, false)
                    .map(|(_, b)| b),
            },
            None => self
                .using_resolve_binding(m, var, None, false)
                .map(|(_, b)| b),
        }
    }

    /// Declared type of `m.var`'s owner, or `None` (the nothing sentinel)
    /// when the cell is absent or unresolved.
    pub fn get_binding_type(&self, m: &ModuleRef, var: Name) -> Option<TypeTag> {
        let cell = self.get_module_binding(m, var)?;
        match cell.owner() {
            BindingOwner::Canonical => cell.declared_type(),
            BindingOwner::Alias(o) => o.declared_type(),
            BindingOwner::Unresolved => None,
        }
    }

    /// The module that defines `m.var`: the owner's home, not the module
    /// the name was looked up through.
    pub fn get_module_of_binding(&self, m: &ModuleRef, var: Name) -> Option<ModuleRef> {
        let b = self.get_binding(m, var)?;
        Some(b.home_module().clone())
    }

    /// The evaluator-facing `(module, name, binding)` triple for `m.var`,
    /// creating the cell if absent.
    pub fn module_globalref(&self, m: &ModuleRef, var: Name) -> GlobalRef {
        let b = {
            let mut state = m.lock();
            state
                .bindings
                .slot(var)
                .or_insert_with(|| Binding::new(m, var))
                .clone()
        };
        b.globalref()
    }

    /// Current value behind a global ref, re-resolving through the owner.
    /// Ignores deprecation.
    pub fn globalref_value(&self, gr: &GlobalRef) -> Option<Value> {
        let b = self.resolve_owner(Some(gr.binding.clone()), &gr.module, gr.name, None)?;
        b.value()
    }

    /// Is the binding behind a global ref constant?
    pub fn globalref_is_const(&self, gr: &GlobalRef) -> bool {
        self.resolve_owner(Some(gr.binding.clone()), &gr.module, gr.name, None)
            .is_some_and(|b| b.is_const())
    }

    /// Does the binding behind a global ref currently hold a value?
    pub fn globalref_boundp(&self, gr: &GlobalRef) -> bool {
        self.resolve_owner(Some(gr.binding.clone()), &gr.module, gr.name, None)
            .is_some_and(|b| b.value().is_some())
    }

    /// Project a cell to its canonical owner, searching `usings` when the
    /// cell is absent or unresolved.
    fn resolve_owner(
        &self,
        cell: Option<BindingRef>,
        m: &ModuleRef,
        var: Name,
        st: Option<&ModStack<'_>>,
    ) -> Option<BindingRef> {
        let cell = cell.or_else(|| self.get_module_binding(m, var));
        if let Some(c) = &cell {
            match c.owner() {
                BindingOwner::Canonical => return Some(c.clone()),
                BindingOwner::Alias(owner) => {
                    debug_assert!(owner.is_canonical());
                    return Some(owner);
                }
                BindingOwner::Unresolved => {}
            }
        }
        if stack_contains(st, m, var) {
            // Import cycle without finding an actual definition.
            return None;
        }
        let frame = ModStack {
            module: m,
            name: var,
            prev: st,
        };
        let (from, b) = self.using_resolve_binding(m, var, Some(&frame), true)?;
        debug_assert!(b.is_canonical());
        // Materialize a local alias so the result of this lookup cannot
        // change, for example if this name is assigned to later.
        self.import_binding(m, &from, Some(&b), var, var, false);
        debug!(
            module = self.text(m.name()),
            var = self.text(var),
            from = self.text(from.name()),
            "resolved through using"
        );
        Some(b)
    }

    /// Walk `m.usings` last-to-first looking for an exported `var`.
    ///
    /// A candidate that fails to resolve is skipped so a later edge can
    /// still supply the name. Two surviving non-deprecated candidates that
    /// are not `eq_bindings` make the lookup ambiguous: with `warn`, a
    /// placeholder cell is pinned in `m` (so the warning fires once) and
    /// the warning names both exporters. A deprecated candidate loses to a
    /// non-deprecated one regardless of order.
    fn using_resolve_binding(
        &self,
        m: &ModuleRef,
        var: Name,
        st: Option<&ModStack<'_>>,
        warn: bool,
    ) -> Option<(ModuleRef, BindingRef)> {
        let usings: Vec<ModuleRef> = {
            let state = m.lock();
            state.usings.iter().rev().cloned().collect()
        };
        let mut found: Option<(ModuleRef, BindingRef)> = None;
        for imp in usings {
            let Some(cell) = self.get_module_binding(&imp, var) else {
                continue;
            };
            if !cell.is_exported() {
                continue;
            }
            let Some(tempb) = self.resolve_owner(Some(cell), &imp, var, st) else {
                continue;
            };
            if let Some((found_from, found_b)) = &found {
                if !tempb.is_deprecated()
                    && !found_b.is_deprecated()
                    && !eq_bindings(&tempb, found_b)
                {
                    if warn {
                        // Pin the name so repeated lookups stay quiet.
                        let _ = self.get_binding_wr(m, var, true);
                        self.sink().warning(&format!(
                            "both {} and {} export \"{}\"; uses of it in module {} must be qualified",
                            self.text(found_from.name()),
                            self.text(imp.name()),
                            self.text(var),
                            self.text(m.name()),
                        ));
                    }
                    return None;
                }
            }
            if found.is_none() || !tempb.is_deprecated() {
                found = Some((imp.clone(), tempb));
            }
        }
        found
    }
}
