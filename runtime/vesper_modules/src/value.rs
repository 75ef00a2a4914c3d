//! Runtime values as seen by the module subsystem.
//!
//! The subsystem treats values as opaque except for the handful of questions
//! binding resolution has to answer: what is the value's type, is it a type
//! or module (constant-redefinition rules), is it structurally equal to
//! another value (idempotent constant stores), and does it have a method
//! table (deprecation hints).

use std::sync::Arc;

use vesper_ir::{Name, StringInterner};

use crate::module::ModuleRef;

/// Nominal type of a runtime value.
///
/// `Any` is the top type: every value `isa` `Any`. The subsystem promotes a
/// binding's declared type to `Any` on first assignment when the program
/// declared none.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeTag {
    /// Top type; accepts every value.
    Any,
    Nothing,
    Bool,
    Int,
    Float,
    Str,
    /// A type used as a first-class value.
    Type,
    Module,
    Function,
}

impl TypeTag {
    /// Printable type name.
    pub fn name(self) -> &'static str {
        match self {
            TypeTag::Any => "Any",
            TypeTag::Nothing => "Nothing",
            TypeTag::Bool => "Bool",
            TypeTag::Int => "Int",
            TypeTag::Float => "Float",
            TypeTag::Str => "Str",
            TypeTag::Type => "Type",
            TypeTag::Module => "Module",
            TypeTag::Function => "Function",
        }
    }
}

/// A generic function value: its name plus the module that owns its method
/// table. The module subsystem only consults this pair when synthesizing
/// deprecation hints.
#[derive(Clone, Debug)]
pub struct FunctionValue {
    pub name: Name,
    pub module: ModuleRef,
}

/// A runtime value.
#[derive(Clone, Debug)]
pub enum Value {
    Nothing,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Type(TypeTag),
    Module(ModuleRef),
    Function(FunctionValue),
}

impl Value {
    /// Convenience constructor for integers.
    pub fn int(v: i64) -> Value {
        Value::Int(v)
    }

    /// Convenience constructor for strings.
    pub fn str(s: &str) -> Value {
        Value::Str(Arc::from(s))
    }

    /// Convenience constructor for generic functions.
    pub fn function(name: Name, module: ModuleRef) -> Value {
        Value::Function(FunctionValue { name, module })
    }

    /// The nominal type of this value.
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Nothing => TypeTag::Nothing,
            Value::Bool(_) => TypeTag::Bool,
            Value::Int(_) => TypeTag::Int,
            Value::Float(_) => TypeTag::Float,
            Value::Str(_) => TypeTag::Str,
            Value::Type(_) => TypeTag::Type,
            Value::Module(_) => TypeTag::Module,
            Value::Function(_) => TypeTag::Function,
        }
    }

    /// Nominal subtype test. `Any` accepts everything; all other tags are
    /// exact.
    pub fn isa(&self, ty: TypeTag) -> bool {
        ty == TypeTag::Any || self.type_tag() == ty
    }

    /// Is this value itself a type?
    pub fn is_type(&self) -> bool {
        matches!(self, Value::Type(_))
    }

    /// Is this value a module?
    pub fn is_module(&self) -> bool {
        matches!(self, Value::Module(_))
    }

    /// Is this the `nothing` sentinel?
    pub fn is_nothing(&self) -> bool {
        matches!(self, Value::Nothing)
    }

    /// Method-table identity of a function value, if any.
    pub fn method_table(&self) -> Option<(Name, &ModuleRef)> {
        match self {
            Value::Function(f) => Some((f.name, &f.module)),
            _ => None,
        }
    }

    /// Structural equality.
    ///
    /// Scalars compare by content (floats bitwise, so `NaN` is egal to
    /// itself), strings by text, modules and functions by identity.
    pub fn egal(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nothing, Value::Nothing) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::Module(a), Value::Module(b)) => Arc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => {
                a.name == b.name && Arc::ptr_eq(&a.module, &b.module)
            }
            _ => false,
        }
    }

    /// Render the value for diagnostics.
    pub fn show(&self, interner: &StringInterner) -> String {
        match self {
            Value::Nothing => "nothing".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(x) => x.to_string(),
            Value::Str(s) => format!("{s:?}"),
            Value::Type(t) => t.name().to_string(),
            Value::Module(m) => interner.lookup(m.name()).to_string(),
            Value::Function(f) => interner.lookup(f.name).to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.egal(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_egal_compares_content() {
        assert_eq!(Value::int(3), Value::int(3));
        assert_ne!(Value::int(3), Value::int(4));
        assert_eq!(Value::str("a"), Value::str("a"));
        assert_ne!(Value::str("a"), Value::int(3));
    }

    #[test]
    fn float_egal_is_bitwise() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
    }

    #[test]
    fn isa_any_accepts_everything() {
        assert!(Value::int(1).isa(TypeTag::Any));
        assert!(Value::Nothing.isa(TypeTag::Any));
        assert!(Value::int(1).isa(TypeTag::Int));
        assert!(!Value::int(1).isa(TypeTag::Str));
    }

    #[test]
    fn type_values_are_types() {
        assert!(Value::Type(TypeTag::Int).is_type());
        assert!(!Value::int(1).is_type());
        assert_eq!(Value::Type(TypeTag::Int).type_tag(), TypeTag::Type);
    }
}
