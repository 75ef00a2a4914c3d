//! Deprecation warnings and their message bodies.
//!
//! A module can attach an explanation to a deprecated name by binding
//! `_dep_message_<name>`: a string is printed verbatim, any other value by
//! its structural representation. Without one, a hint is synthesized from
//! the deprecated value itself.

use vesper_ir::Name;

use crate::binding::{BindingRef, DEPRECATED_RENAMED};
use crate::errors::{self, ModuleResult};
use crate::module::{same_module, ModuleRef};
use crate::runtime::{DepWarnMode, Runtime};
use crate::value::Value;

const DEP_MESSAGE_PREFIX: &str = "_dep_message_";

impl Runtime {
    /// Set the deprecation flag for `m.var`: 0 not deprecated, 1 renamed,
    /// 2 moved to another package. Flags the binding the name currently
    /// resolves to, which may live in another module.
    pub fn deprecate_binding(&self, m: &ModuleRef, var: Name, flag: u8) {
        if let Some(b) = self.get_binding(m, var) {
            b.set_deprecation(flag);
        }
    }

    /// Is the binding `m.var` resolves to deprecated? Unresolved names are
    /// reported as not deprecated rather than resolved just to answer.
    pub fn is_binding_deprecated(&self, m: &ModuleRef, var: Name) -> bool {
        if !self.binding_resolved_p(m, var) {
            return false;
        }
        self.get_binding(m, var).is_some_and(|b| b.is_deprecated())
    }

    /// Report a use of the deprecated binding `b`, reached as `m.var`.
    ///
    /// Only renamed bindings (flag 1) report; moved bindings are bound to
    /// stubs that raise their own error. In `Warn` mode the message gets a
    /// source-location hint when one is known. In `Error` mode the message
    /// is printed and `DeprecatedBindingUse` is raised.
    pub fn binding_deprecation_warning(
        &self,
        m: &ModuleRef,
        var: Name,
        b: &BindingRef,
    ) -> ModuleResult<()> {
        if b.deprecation() != DEPRECATED_RENAMED {
            return Ok(());
        }
        let mode = self.depwarn();
        if mode == DepWarnMode::Off {
            return Ok(());
        }

        let mut text = String::new();
        if mode != DepWarnMode::Error {
            text.push_str("WARNING: ");
        }
        text.push_str(&format!(
            "{}.{} is deprecated",
            self.text(m.name()),
            self.text(var)
        ));
        text.push_str(&self.deprecation_message(m, var, b));
        text.push('\n');
        if mode != DepWarnMode::Error {
            match self.source_location() {
                Some(loc) => text.push_str(&format!("  likely near {}:{}\n", loc.file, loc.line)),
                None => text.push_str(&format!(" in module {}\n", self.text(m.name()))),
            }
        }
        self.sink().emit(&text);

        if mode == DepWarnMode::Error {
            return Err(errors::deprecated_binding_use(
                self.text(m.name()),
                self.text(var),
            ));
        }
        Ok(())
    }

    /// The message body for a deprecated binding `from.name`.
    ///
    /// Prefers an explicit `_dep_message_<name>` binding; otherwise
    /// synthesizes "use X instead." from the deprecated value. Returns an
    /// empty string when there is nothing useful to say.
    pub(crate) fn deprecation_message(
        &self,
        from: &ModuleRef,
        name: Name,
        b: &BindingRef,
    ) -> String {
        let dep_sym = self.intern(&format!("{DEP_MESSAGE_PREFIX}{}", self.text(name)));
        if let Some(explicit) = self.get_binding(from, dep_sym).and_then(|db| db.value()) {
            return match explicit {
                Value::Str(s) => s.to_string(),
                other => other.show(self.interner()),
            };
        }
        match b.value() {
            Some(v) if v.is_type() || v.is_module() => {
                format!(", use {} instead.", v.show(self.interner()))
            }
            Some(v) => match v.method_table() {
                Some((fname, fmod)) => {
                    let qualifier = match self.core_module() {
                        Some(core) if same_module(fmod, core) => String::new(),
                        _ => format!("{}.", self.text(fmod.name())),
                    };
                    format!(", use {qualifier}{} instead.", self.text(fname))
                }
                None => String::new(),
            },
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::DEPRECATED_MOVED;
    use crate::diagnostics::buffer_sink;
    use crate::errors::ModuleError;
    use crate::runtime::SourceLoc;

    fn runtime() -> Runtime {
        Runtime::with_sink(buffer_sink())
    }

    #[test]
    fn renamed_binding_warns_on_use() {
        let rt = runtime();
        let m = rt.new_module(rt.intern("M"), None, false);
        let old = rt.intern("old");

        rt.set_const(&m, old, Value::int(1)).ok();
        rt.deprecate_binding(&m, old, DEPRECATED_RENAMED);
        assert!(rt.is_binding_deprecated(&m, old));

        assert_eq!(rt.get_global(&m, old).ok().flatten(), Some(Value::int(1)));
        assert_eq!(rt.sink().warning_count(), 1);
        assert!(rt.sink().output().contains("M.old is deprecated"));
    }

    #[test]
    fn moved_binding_is_silent() {
        let rt = runtime();
        let m = rt.new_module(rt.intern("M"), None, false);
        let gone = rt.intern("gone");

        rt.set_const(&m, gone, Value::int(1)).ok();
        rt.deprecate_binding(&m, gone, DEPRECATED_MOVED);

        rt.get_global(&m, gone).ok();
        assert_eq!(rt.sink().warning_count(), 0);
    }

    #[test]
    fn off_mode_is_silent() {
        let rt = runtime();
        rt.set_depwarn(DepWarnMode::Off);
        let m = rt.new_module(rt.intern("M"), None, false);
        let old = rt.intern("old");

        rt.set_const(&m, old, Value::int(1)).ok();
        rt.deprecate_binding(&m, old, DEPRECATED_RENAMED);
        rt.get_global(&m, old).ok();
        assert_eq!(rt.sink().warning_count(), 0);
    }

    #[test]
    fn error_mode_raises_after_printing() {
        let rt = runtime();
        rt.set_depwarn(DepWarnMode::Error);
        let m = rt.new_module(rt.intern("M"), None, false);
        let old = rt.intern("old");

        rt.set_const(&m, old, Value::int(1)).ok();
        rt.deprecate_binding(&m, old, DEPRECATED_RENAMED);

        let err = rt.get_global(&m, old);
        assert!(matches!(err, Err(ModuleError::DeprecatedBindingUse { .. })));
        assert!(rt.sink().output().contains("M.old is deprecated"));
    }

    #[test]
    fn explicit_dep_message_is_verbatim() {
        let rt = runtime();
        let m = rt.new_module(rt.intern("M"), None, false);
        let old = rt.intern("old");

        rt.set_const(&m, old, Value::int(1)).ok();
        rt.set_const(
            &m,
            rt.intern("_dep_message_old"),
            Value::str(", use new instead (renamed in 2.0)."),
        )
        .ok();
        rt.deprecate_binding(&m, old, DEPRECATED_RENAMED);

        rt.get_global(&m, old).ok();
        assert!(rt
            .sink()
            .output()
            .contains("M.old is deprecated, use new instead (renamed in 2.0)."));
    }

    #[test]
    fn hint_synthesized_from_module_value() {
        let rt = runtime();
        let m = rt.new_module(rt.intern("M"), None, false);
        let replacement = rt.new_module(rt.intern("NewHome"), None, false);
        let old = rt.intern("old");

        rt.set_const(&m, old, Value::Module(replacement)).ok();
        rt.deprecate_binding(&m, old, DEPRECATED_RENAMED);

        rt.get_global(&m, old).ok();
        assert!(rt.sink().output().contains(", use NewHome instead."));
    }

    #[test]
    fn hint_synthesized_from_function_value() {
        let rt = runtime();
        let core = rt.new_module(rt.intern("core"), None, false);
        rt.set_core_module(core.clone());
        let m = rt.new_module(rt.intern("M"), None, false);
        let pkg = rt.new_module(rt.intern("Pkg"), None, false);

        let old_f = rt.intern("old_f");
        let new_f = rt.intern("new_f");
        rt.set_const(&m, old_f, Value::function(new_f, pkg)).ok();
        rt.deprecate_binding(&m, old_f, DEPRECATED_RENAMED);
        rt.get_global(&m, old_f).ok();
        assert!(rt.sink().output().contains(", use Pkg.new_f instead."));

        // Core functions are printed unqualified.
        rt.sink().clear();
        let old_g = rt.intern("old_g");
        let new_g = rt.intern("new_g");
        rt.set_const(&m, old_g, Value::function(new_g, core)).ok();
        rt.deprecate_binding(&m, old_g, DEPRECATED_RENAMED);
        rt.get_global(&m, old_g).ok();
        assert!(rt.sink().output().contains(", use new_g instead."));
    }

    #[test]
    fn warn_mode_appends_location_hint() {
        let rt = runtime();
        let m = rt.new_module(rt.intern("M"), None, false);
        let old = rt.intern("old");

        rt.set_const(&m, old, Value::int(1)).ok();
        rt.deprecate_binding(&m, old, DEPRECATED_RENAMED);

        rt.set_source_location(Some(SourceLoc {
            file: "script.vsp".to_string(),
            line: 14,
        }));
        rt.get_global(&m, old).ok();
        assert!(rt.sink().output().contains("likely near script.vsp:14"));

        rt.sink().clear();
        rt.set_source_location(None);
        rt.get_global(&m, old).ok();
        assert!(rt.sink().output().contains(" in module M"));
    }

    #[test]
    fn importing_deprecated_binding_warns_with_hint() {
        let rt = runtime();
        let f = rt.new_module(rt.intern("F"), None, false);
        let u = rt.new_module(rt.intern("U"), None, false);
        let replacement = rt.new_module(rt.intern("R"), None, false);
        let v = rt.intern("v");

        rt.set_const(&f, v, Value::Module(replacement)).ok();
        rt.deprecate_binding(&f, v, DEPRECATED_RENAMED);
        rt.module_import(&u, &f, v);

        let out = rt.sink().output();
        assert!(out.contains("importing deprecated binding F.v into U."));
        assert!(out.contains(", use R instead."));
    }

    #[test]
    fn deprecated_nothing_skips_import() {
        let rt = runtime();
        let f = rt.new_module(rt.intern("F"), None, false);
        let u = rt.new_module(rt.intern("U"), None, false);
        let v = rt.intern("v");

        rt.set_const(&f, v, Value::Nothing).ok();
        rt.deprecate_binding(&f, v, DEPRECATED_RENAMED);
        rt.module_import(&u, &f, v);

        assert_eq!(rt.sink().warning_count(), 0);
        assert!(rt.get_module_binding(&u, v).is_none());
    }

    #[test]
    fn root_module_imports_deprecated_silently() {
        let rt = runtime();
        let main = rt.new_module(rt.intern("main"), None, false);
        rt.set_main_module(main.clone());
        let f = rt.new_module(rt.intern("F"), None, false);
        let v = rt.intern("v");

        rt.set_const(&f, v, Value::int(1)).ok();
        rt.deprecate_binding(&f, v, DEPRECATED_RENAMED);
        rt.module_import(&main, &f, v);

        assert_eq!(rt.sink().warning_count(), 0);
        assert!(rt.is_imported(&main, v));
    }
}
