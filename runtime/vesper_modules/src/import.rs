//! The import and `using` engine.
//!
//! `import` introduces one name as a local alias cell flagged `imported`;
//! `using` installs a bulk-visibility edge and lets the resolver
//! materialize aliases on demand. Both funnel through one back end that
//! validates conflicts against whatever already occupies the target slot.

use std::collections::hash_map::Entry;
use std::sync::Arc;

use tracing::debug;
use vesper_ir::Name;

use crate::binding::{Binding, BindingOwner, BindingRef};
use crate::module::{same_module, ModuleRef};
use crate::resolve::eq_bindings;
use crate::runtime::{DepWarnMode, Runtime};

/// What the table examination decided; warnings are emitted after the
/// module lock is dropped.
enum ImportOutcome {
    Done,
    ConflictingImport,
    ExistingIdentifier,
}

impl Runtime {
    /// `import from.var`: explicit single-name import.
    pub fn module_import(&self, to: &ModuleRef, from: &ModuleRef, var: Name) {
        let b = self.get_binding(from, var);
        self.import_binding(to, from, b.as_ref(), var, var, true);
    }

    /// `import from.var as asname`.
    pub fn module_import_as(&self, to: &ModuleRef, from: &ModuleRef, var: Name, asname: Name) {
        let b = self.get_binding(from, var);
        self.import_binding(to, from, b.as_ref(), asname, var, true);
    }

    /// `use from.var`: like import, but the cell is not flagged `imported`
    /// and so does not license method extension.
    pub fn module_use(&self, to: &ModuleRef, from: &ModuleRef, var: Name) {
        let b = self.get_binding(from, var);
        self.import_binding(to, from, b.as_ref(), var, var, false);
    }

    /// `use from.var as asname`.
    pub fn module_use_as(&self, to: &ModuleRef, from: &ModuleRef, var: Name, asname: Name) {
        let b = self.get_binding(from, var);
        self.import_binding(to, from, b.as_ref(), asname, var, false);
    }

    /// Unified import back end, also used by the resolver to materialize
    /// `using` lookups.
    pub(crate) fn import_binding(
        &self,
        to: &ModuleRef,
        from: &ModuleRef,
        b: Option<&BindingRef>,
        asname: Name,
        s: Name,
        explicit: bool,
    ) {
        let Some(b) = b else {
            self.sink().warning(&format!(
                "could not import {}.{} into {}",
                self.text(from.name()),
                self.text(s),
                self.text(to.name())
            ));
            return;
        };
        debug_assert!(b.is_canonical());

        if b.is_deprecated() {
            if b.value().is_some_and(|v| v.is_nothing()) {
                // Deprecated bindings assigned `nothing` are skipped so a
                // later definition can claim the name.
                return;
            }
            let shielded = self.main_module().is_some_and(|m| same_module(to, m))
                || self.core_module().is_some_and(|m| same_module(to, m));
            if !shielded && self.depwarn() != DepWarnMode::Off {
                let renamed = if asname == s {
                    String::new()
                } else {
                    format!(" as {}", self.text(asname))
                };
                self.sink().warning(&format!(
                    "importing deprecated binding {}.{} into {}{}.",
                    self.text(from.name()),
                    self.text(s),
                    self.text(to.name()),
                    renamed
                ));
                let hint = self.deprecation_message(from, s, b);
                if !hint.is_empty() {
                    self.sink().emit(&format!("{hint}\n"));
                }
            }
        }

        let outcome = {
            let mut state = to.lock();
            match state.bindings.slot(asname) {
                Entry::Occupied(e) => {
                    let bto = e.get().clone();
                    if Arc::ptr_eq(&bto, b) {
                        // Importing a binding on top of itself. Harmless.
                        ImportOutcome::Done
                    } else if eq_bindings(&bto, b) {
                        // Already visible here; an explicit import may
                        // upgrade the flag.
                        if explicit {
                            bto.set_imported(true);
                        }
                        ImportOutcome::Done
                    } else {
                        match bto.owner() {
                            BindingOwner::Alias(_) => ImportOutcome::ConflictingImport,
                            BindingOwner::Canonical
                                if bto.is_const() || bto.value().is_some() =>
                            {
                                ImportOutcome::ExistingIdentifier
                            }
                            _ => {
                                bto.set_owner_alias(b.clone());
                                bto.set_imported(explicit);
                                ImportOutcome::Done
                            }
                        }
                    }
                }
                Entry::Vacant(e) => {
                    let nb = Binding::new(to, asname);
                    nb.set_owner_alias(b.clone());
                    nb.set_imported(explicit);
                    // Carry the flag so use sites warn too.
                    nb.set_deprecation(b.deprecation());
                    e.insert(nb);
                    ImportOutcome::Done
                }
            }
        };

        match outcome {
            ImportOutcome::Done => {}
            ImportOutcome::ConflictingImport => self.sink().warning(&format!(
                "ignoring conflicting import of {}.{} into {}",
                self.text(from.name()),
                self.text(s),
                self.text(to.name())
            )),
            ImportOutcome::ExistingIdentifier => self.sink().warning(&format!(
                "import of {}.{} into {} conflicts with an existing identifier; ignored.",
                self.text(from.name()),
                self.text(s),
                self.text(to.name())
            )),
        }
    }

    /// Install a `using` edge from `to` onto `from`.
    ///
    /// Self-`using` and duplicate edges are refused silently. Exported
    /// names of `from` that already resolve to something different in `to`
    /// draw a conflict warning; the edge is installed regardless, and an
    /// identifier added to `to` later may still silently override a
    /// `using` name.
    pub fn module_using(&self, to: &ModuleRef, from: &ModuleRef) {
        if same_module(to, from) {
            return;
        }
        {
            let state = to.lock();
            if state.usings.iter().any(|u| same_module(u, from)) {
                return;
            }
        }

        let exported: Vec<(Name, BindingRef)> = {
            let state = from.lock();
            state
                .bindings
                .iter()
                .filter(|(_, b)| b.is_exported() && (b.is_canonical() || b.is_imported()))
                .map(|(n, b)| (n, b.clone()))
                .collect()
        };
        for (var, b) in exported {
            // The module's own name re-exported through `using` never
            // counts as a conflict.
            if var == to.name() {
                continue;
            }
            let Some(existing) = self.get_module_binding(to, var) else {
                continue;
            };
            if !existing.is_resolved() {
                continue;
            }
            let resolved = self.get_binding(to, var);
            if !resolved.is_some_and(|r| eq_bindings(&r, &b)) {
                self.sink().warning(&format!(
                    "using {}.{} in module {} conflicts with an existing identifier.",
                    self.text(from.name()),
                    self.text(var),
                    self.text(to.name())
                ));
            }
        }

        let mut state = to.lock();
        if !state.usings.iter().any(|u| same_module(u, from)) {
            state.usings.push(from.clone());
            debug!(
                to = self.text(to.name()),
                from = self.text(from.name()),
                "using edge installed"
            );
        }
    }

    /// Mark `var` exported from `from`, creating a placeholder cell when
    /// no definition exists yet.
    pub fn module_export(&self, from: &ModuleRef, var: Name) {
        let mut state = from.lock();
        let b = state
            .bindings
            .slot(var)
            .or_insert_with(|| Binding::new(from, var))
            .clone();
        b.set_exported();
    }
}
