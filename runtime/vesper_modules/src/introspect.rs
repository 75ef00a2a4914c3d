//! Queries over module contents: name enumeration, `using` lists, and
//! per-binding predicates.

use vesper_ir::Name;

use crate::module::{same_module, ModuleRef};
use crate::runtime::Runtime;

impl Runtime {
    /// Names visible in `m`.
    ///
    /// A name is included when it is exported, or imported and the caller
    /// asked for imported names, or defined here and the caller asked for
    /// everything (the root module always shows its definitions). Hidden
    /// names (generated, `#`-prefixed; flagged on the [`Name`] itself) and
    /// deprecated bindings only appear under `all`.
    pub fn module_names(&self, m: &ModuleRef, all: bool, imported: bool) -> Vec<Name> {
        let is_root = self.main_module().is_some_and(|main| same_module(m, main));
        let state = m.lock();
        let mut names = Vec::new();
        for (name, b) in state.bindings.iter() {
            let included = b.is_exported()
                || (imported && b.is_imported())
                || (b.is_canonical() && !b.is_imported() && (all || is_root));
            if included && (all || (!b.is_deprecated() && !name.is_hidden())) {
                names.push(name);
            }
        }
        names
    }

    /// The modules `m` is `using`, most recently added first.
    pub fn module_usings(&self, m: &ModuleRef) -> Vec<ModuleRef> {
        let state = m.lock();
        state.usings.iter().rev().cloned().collect()
    }

    /// Remove every cell that is neither self-owned nor explicitly
    /// imported, resetting the module's resolution decisions.
    ///
    /// Dangerous on a module in active use; intended for shrinking the
    /// root module before image serialization.
    pub fn clear_implicit_imports(&self, m: &ModuleRef) {
        let mut state = m.lock();
        state
            .bindings
            .retain(|_, b| b.is_canonical() || b.is_imported());
    }

    /// Does `m.var` resolve to a binding with a value?
    pub fn boundp(&self, m: &ModuleRef, var: Name) -> bool {
        self.get_binding(m, var)
            .is_some_and(|b| b.value().is_some())
    }

    /// Does `m` define or export `var` (without resolving through
    /// `usings`)?
    pub fn defines_or_exports_p(&self, m: &ModuleRef, var: Name) -> bool {
        self.get_module_binding(m, var)
            .is_some_and(|b| b.is_exported() || b.is_canonical())
    }

    /// Does `m` export `var`?
    pub fn exports_p(&self, m: &ModuleRef, var: Name) -> bool {
        self.get_module_binding(m, var).is_some_and(|b| b.is_exported())
    }

    /// Has resolution decided an owner for `m.var`?
    pub fn binding_resolved_p(&self, m: &ModuleRef, var: Name) -> bool {
        self.get_module_binding(m, var).is_some_and(|b| b.is_resolved())
    }

    /// Was `var` explicitly imported into `m`?
    pub fn is_imported(&self, m: &ModuleRef, var: Name) -> bool {
        self.get_module_binding(m, var).is_some_and(|b| b.is_imported())
    }

    /// Does `m.var` resolve to a constant?
    pub fn is_const(&self, m: &ModuleRef, var: Name) -> bool {
        self.get_binding(m, var).is_some_and(|b| b.is_const())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::buffer_sink;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn runtime() -> Runtime {
        Runtime::with_sink(buffer_sink())
    }

    fn sorted(mut names: Vec<vesper_ir::Name>) -> Vec<vesper_ir::Name> {
        names.sort_unstable();
        names
    }

    #[test]
    fn exported_names_are_listed() {
        let rt = runtime();
        let m_name = rt.intern("M");
        let m = rt.new_module(m_name, None, false);
        let x = rt.intern("x");
        let y = rt.intern("y");

        rt.set_const(&m, x, Value::int(1)).ok();
        rt.set_const(&m, y, Value::int(2)).ok();
        rt.module_export(&m, x);

        // Construction exported the module's own name, so it lists too.
        let names = sorted(rt.module_names(&m, false, false));
        assert_eq!(names, sorted(vec![x, m_name]));

        let all = sorted(rt.module_names(&m, true, false));
        assert_eq!(all, sorted(vec![x, y, m_name]));
    }

    #[test]
    fn imported_names_need_the_flag() {
        let rt = runtime();
        let f = rt.new_module(rt.intern("F"), None, false);
        let u_name = rt.intern("U");
        let u = rt.new_module(u_name, None, false);
        let v = rt.intern("v");

        rt.set_const(&f, v, Value::int(1)).ok();
        rt.module_import(&u, &f, v);

        assert_eq!(rt.module_names(&u, false, false), vec![u_name]);
        assert_eq!(
            sorted(rt.module_names(&u, false, true)),
            sorted(vec![v, u_name])
        );
    }

    #[test]
    fn hidden_and_deprecated_names_need_all() {
        let rt = runtime();
        let m_name = rt.intern("M");
        let m = rt.new_module(m_name, None, false);
        let hidden = rt.intern("#gen");
        let old = rt.intern("old");

        rt.set_const(&m, hidden, Value::int(1)).ok();
        rt.module_export(&m, hidden);
        rt.set_const(&m, old, Value::int(2)).ok();
        rt.module_export(&m, old);
        rt.deprecate_binding(&m, old, crate::binding::DEPRECATED_RENAMED);

        assert_eq!(rt.module_names(&m, false, false), vec![m_name]);
        assert_eq!(
            sorted(rt.module_names(&m, true, false)),
            sorted(vec![hidden, old, m_name])
        );
    }

    #[test]
    fn root_module_lists_its_definitions() {
        let rt = runtime();
        let main_name = rt.intern("main");
        let main = rt.new_module(main_name, None, false);
        rt.set_main_module(main.clone());
        let x = rt.intern("x");

        rt.set_global(&main, x, Value::int(1)).ok();
        assert_eq!(
            sorted(rt.module_names(&main, false, false)),
            sorted(vec![x, main_name])
        );
    }

    #[test]
    fn clear_implicit_imports_preserves_own_and_imported() {
        let rt = runtime();
        let f = rt.new_module(rt.intern("F"), None, false);
        let u = rt.new_module(rt.intern("U"), None, false);
        let own = rt.intern("own");
        let imp = rt.intern("imp");
        let implicit = rt.intern("implicit");

        rt.set_const(&f, imp, Value::int(1)).ok();
        rt.set_const(&f, implicit, Value::int(2)).ok();
        rt.module_export(&f, implicit);
        rt.module_using(&u, &f);

        rt.set_global(&u, own, Value::int(0)).ok();
        rt.module_import(&u, &f, imp);
        // Materialize an implicit cell through the using edge.
        assert!(rt.get_binding(&u, implicit).is_some());
        assert!(rt.get_module_binding(&u, implicit).is_some());

        rt.clear_implicit_imports(&u);

        assert!(rt.get_module_binding(&u, own).is_some());
        assert!(rt.get_module_binding(&u, imp).is_some());
        assert!(rt.get_module_binding(&u, implicit).is_none());
    }

    #[test]
    fn predicates_track_binding_state() {
        let rt = runtime();
        let m = rt.new_module(rt.intern("M"), None, false);
        let x = rt.intern("x");

        assert!(!rt.boundp(&m, x));
        assert!(!rt.defines_or_exports_p(&m, x));

        rt.module_export(&m, x);
        assert!(rt.exports_p(&m, x));
        assert!(rt.defines_or_exports_p(&m, x));
        assert!(!rt.binding_resolved_p(&m, x));

        rt.set_global(&m, x, Value::int(1)).ok();
        assert!(rt.boundp(&m, x));
        assert!(rt.binding_resolved_p(&m, x));
        assert!(!rt.is_const(&m, x));
    }
}
