//! The assignment gate: type and constness enforcement for global stores.

use vesper_ir::Name;

use crate::binding::BindingRef;
use crate::errors::{self, ModuleResult};
use crate::module::ModuleRef;
use crate::runtime::Runtime;
use crate::value::{TypeTag, Value};

impl Runtime {
    /// Store `rhs` into `b`, enforcing the declared type and the
    /// constant-redefinition rules.
    ///
    /// A binding with no declared type is promoted to `Any` first. Stores
    /// into constants succeed when they are the first write or structurally
    /// equal to the current value; a same-typed replacement of a simple
    /// value warns and proceeds; anything that changes the type, or
    /// replaces a type or module, fails with `ConstantRedefinition`.
    pub fn checked_assignment(
        &self,
        b: &BindingRef,
        m: &ModuleRef,
        var: Name,
        rhs: Value,
    ) -> ModuleResult<()> {
        if let Some(declared) = b.promote_declared_type() {
            if declared != TypeTag::Any && !rhs.isa(declared) {
                return Err(errors::type_mismatch(self.text(m.name()), self.text(var)));
            }
        }
        if b.is_const() {
            let mut slot = b.value_slot().write();
            match slot.as_ref() {
                None => {
                    *slot = Some(rhs);
                    return Ok(());
                }
                Some(old) => {
                    if rhs.egal(old) {
                        return Ok(());
                    }
                    if rhs.type_tag() != old.type_tag() || rhs.is_type() || rhs.is_module() {
                        return Err(errors::constant_redefinition(
                            self.text(m.name()),
                            self.text(var),
                        ));
                    }
                }
            }
            *slot = Some(rhs);
            drop(slot);
            self.sink().warning(&format!(
                "redefinition of constant {}.{}. This may fail, cause incorrect answers, or produce other errors.",
                self.text(m.name()),
                self.text(var)
            ));
            return Ok(());
        }
        b.store_value(rhs);
        Ok(())
    }

    /// Declare `b` constant. Legal only on a self-owned cell that has no
    /// value yet or is already constant. The flag is monotonic.
    pub fn declare_constant(&self, b: &BindingRef, m: &ModuleRef, var: Name) -> ModuleResult<()> {
        if !b.is_canonical() || (b.value().is_some() && !b.is_const()) {
            return Err(errors::constant_redeclaration(
                self.text(m.name()),
                self.text(var),
            ));
        }
        b.set_const();
        Ok(())
    }

    /// Bind `m.var` to `val` as a constant.
    ///
    /// The fast path claims the constant flag by compare-and-swap and
    /// publishes the first value. Re-runs and lost races fall through to
    /// the checked-assignment rules, so an equal value succeeds silently
    /// and a conflicting one warns or raises.
    pub fn set_const(&self, m: &ModuleRef, var: Name, val: Value) -> ModuleResult<()> {
        let b = self.get_binding_wr_or_error(m, var)?;
        if b.value().is_none() {
            b.promote_declared_type();
            if b.try_mark_const() && b.init_value(val.clone()) {
                return Ok(());
            }
        }
        if b.is_const() {
            return self.checked_assignment(&b, m, var, val);
        }
        Err(errors::constant_redefinition(
            self.text(m.name()),
            self.text(var),
        ))
    }

    /// Assign `m.var = val`, creating the binding when absent.
    pub fn set_global(&self, m: &ModuleRef, var: Name, val: Value) -> ModuleResult<()> {
        let b = self.get_binding_wr_or_error(m, var)?;
        self.checked_assignment(&b, m, var, val)
    }

    /// Read `m.var`. `Ok(None)` means unbound; a deprecated binding goes
    /// through the deprecation machinery first, which raises in error mode.
    pub fn get_global(&self, m: &ModuleRef, var: Name) -> ModuleResult<Option<Value>> {
        let Some(b) = self.get_binding(m, var) else {
            return Ok(None);
        };
        if b.is_deprecated() {
            self.binding_deprecation_warning(m, var, &b)?;
        }
        Ok(b.value())
    }

    /// Declare the type a binding's stores must satisfy. Returns `false`
    /// when a type was already declared (including the `Any` promotion
    /// performed by a first assignment).
    pub fn declare_binding_type(&self, b: &BindingRef, ty: TypeTag) -> bool {
        b.init_declared_type(ty)
    }
}
