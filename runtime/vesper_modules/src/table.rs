//! The binding table: one per module, name → cell.
//!
//! Lookup distinguishes "no cell" (the key is absent) from "cell with no
//! resolution yet" (a [`Binding`](crate::binding::Binding) whose owner is
//! unresolved); callers rely on that distinction to decide whether a search
//! through `usings` is allowed to repeat. All mutation happens under the
//! owning module's lock; the table itself carries no synchronization.

use rustc_hash::FxHashMap;
use std::collections::hash_map::Entry;

use vesper_ir::Name;

use crate::binding::BindingRef;

/// Mapping from interned name to binding cell.
#[derive(Default)]
pub struct BindingTable {
    map: FxHashMap<Name, BindingRef>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored cell for `name`, or `None` when no cell exists.
    pub fn lookup(&self, name: Name) -> Option<&BindingRef> {
        self.map.get(&name)
    }

    /// Slot access for get-or-insert under the module lock.
    pub fn slot(&mut self, name: Name) -> Entry<'_, Name, BindingRef> {
        self.map.entry(name)
    }

    /// Insert a cell, replacing any existing one. Callers are expected to
    /// have checked for an existing cell first; at most one cell per name
    /// ever exists.
    pub fn insert(&mut self, name: Name, binding: BindingRef) {
        self.map.insert(name, binding);
    }

    /// Iterate all cells. Order is unspecified.
    pub fn iter(&self) -> impl Iterator<Item = (Name, &BindingRef)> {
        self.map.iter().map(|(name, b)| (*name, b))
    }

    /// Drop every cell for which `keep` returns `false`.
    pub fn retain(&mut self, mut keep: impl FnMut(Name, &BindingRef) -> bool) {
        self.map.retain(|name, b| keep(*name, b));
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Binding;
    use crate::runtime::Runtime;

    #[test]
    fn absent_and_unresolved_are_distinct() {
        let rt = Runtime::new();
        let m = rt.new_module(rt.intern("M"), None, false);
        let x = rt.intern("x");

        let mut table = BindingTable::new();
        assert!(table.lookup(x).is_none());

        table.insert(x, Binding::new(&m, x));
        let cell = table.lookup(x);
        assert!(cell.is_some());
        assert!(cell.is_some_and(|b| !b.is_resolved()));
    }

    #[test]
    fn slot_gets_or_inserts() {
        let rt = Runtime::new();
        let m = rt.new_module(rt.intern("M"), None, false);
        let x = rt.intern("x");

        let mut table = BindingTable::new();
        let created = table
            .slot(x)
            .or_insert_with(|| Binding::new_canonical(&m, x))
            .clone();
        let again = table
            .slot(x)
            .or_insert_with(|| Binding::new_canonical(&m, x))
            .clone();
        assert!(std::sync::Arc::ptr_eq(&created, &again));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn retain_tolerates_deletion_during_enumeration() {
        let rt = Runtime::new();
        let m = rt.new_module(rt.intern("M"), None, false);
        let names: Vec<_> = ["a", "b", "c", "d"].iter().map(|s| rt.intern(s)).collect();

        let mut table = BindingTable::new();
        for &n in &names {
            table.insert(n, Binding::new_canonical(&m, n));
        }
        let drop_name = names[1];
        table.retain(|n, _| n != drop_name);
        assert_eq!(table.len(), 3);
        assert!(table.lookup(drop_name).is_none());
    }
}
