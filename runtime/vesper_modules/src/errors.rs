//! Error types for module and binding operations.
//!
//! All failures are raised synchronously; the evaluator treats them as
//! catchable exceptions. Conflicts that the language tolerates (ambiguous
//! `using`, conflicting imports, redefinable constants) are warnings, not
//! errors: they go through the diagnostic sink and never abort.

use thiserror::Error;

/// Result of a module operation.
pub type ModuleResult<T> = Result<T, ModuleError>;

/// A module or binding operation failed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ModuleError {
    /// Write to a name whose local cell forwards to another module.
    #[error("cannot assign a value to imported variable {module}.{name}")]
    CannotAssignImported { module: String, name: String },

    /// Method extension on a foreign function that was not explicitly
    /// imported.
    #[error(
        "error in method definition: function {module}.{name} must be explicitly imported to be extended"
    )]
    MustExplicitlyImport { module: String, name: String },

    /// Disallowed change to a constant's value or type.
    #[error("invalid redefinition of constant {module}.{name}")]
    ConstantRedefinition { module: String, name: String },

    /// `declare_constant` on a cell that cannot become constant.
    #[error("cannot declare {module}.{name} constant; it already has a value")]
    ConstantRedeclaration { module: String, name: String },

    /// Store whose value does not satisfy the declared binding type.
    #[error("cannot assign an incompatible value to the global {module}.{name}")]
    TypeMismatch { module: String, name: String },

    /// Unresolvable name.
    #[error("undefined variable `{name}`")]
    UndefinedVar { name: String },

    /// Deprecation mode is "error" and a deprecated binding was used.
    #[error("use of deprecated variable: {module}.{name}")]
    DeprecatedBindingUse { module: String, name: String },
}

#[cold]
pub fn cannot_assign_imported(module: &str, name: &str) -> ModuleError {
    ModuleError::CannotAssignImported {
        module: module.to_string(),
        name: name.to_string(),
    }
}

#[cold]
pub fn must_explicitly_import(module: &str, name: &str) -> ModuleError {
    ModuleError::MustExplicitlyImport {
        module: module.to_string(),
        name: name.to_string(),
    }
}

#[cold]
pub fn constant_redefinition(module: &str, name: &str) -> ModuleError {
    ModuleError::ConstantRedefinition {
        module: module.to_string(),
        name: name.to_string(),
    }
}

#[cold]
pub fn constant_redeclaration(module: &str, name: &str) -> ModuleError {
    ModuleError::ConstantRedeclaration {
        module: module.to_string(),
        name: name.to_string(),
    }
}

#[cold]
pub fn type_mismatch(module: &str, name: &str) -> ModuleError {
    ModuleError::TypeMismatch {
        module: module.to_string(),
        name: name.to_string(),
    }
}

#[cold]
pub fn undefined_var(name: &str) -> ModuleError {
    ModuleError::UndefinedVar {
        name: name.to_string(),
    }
}

#[cold]
pub fn deprecated_binding_use(module: &str, name: &str) -> ModuleError {
    ModuleError::DeprecatedBindingUse {
        module: module.to_string(),
        name: name.to_string(),
    }
}
