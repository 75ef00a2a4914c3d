//! The runtime context owning process-wide module state.
//!
//! Three handles are process-wide by nature: the language core module
//! (consulted at module construction to install the default `using`), the
//! root module (the deprecation boundary), and the deferred-init queue.
//! `Runtime` gathers those, plus the interner, the diagnostic sink, the
//! deprecation mode, and the base module that bounds scalar-option
//! inheritance, into one value instead of globals.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use tracing::debug;
use vesper_ir::{bitmix, Name, SharedInterner, StringInterner};

use crate::diagnostics::{stderr_sink, SharedSink};
use crate::module::{same_module, BuildId, Module, ModuleRef};

/// Seed mixed into a root module's hash in place of a parent hash.
const MODULE_TYPE_SEED: u64 = 0x6d6f_6475_6c65; // "module"

/// How uses of deprecated bindings are reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepWarnMode {
    /// Silent.
    Off,
    /// Report to the diagnostic sink.
    Warn,
    /// Report, then raise `DeprecatedBindingUse`.
    Error,
}

impl DepWarnMode {
    fn from_u8(v: u8) -> DepWarnMode {
        match v {
            0 => DepWarnMode::Off,
            2 => DepWarnMode::Error,
            _ => DepWarnMode::Warn,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            DepWarnMode::Off => 0,
            DepWarnMode::Warn => 1,
            DepWarnMode::Error => 2,
        }
    }
}

/// Source position used to hint deprecation warnings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceLoc {
    pub file: String,
    pub line: u32,
}

/// Process-wide module subsystem state.
pub struct Runtime {
    interner: SharedInterner,
    sink: SharedSink,
    core: OnceLock<ModuleRef>,
    main: OnceLock<ModuleRef>,
    base: OnceLock<ModuleRef>,
    /// Primary top module, recorded by `set_istopmod(_, true)`.
    top: RwLock<Option<ModuleRef>>,
    depwarn: AtomicU8,
    /// Set while producing a compiled image.
    generating_output: AtomicBool,
    /// Incremental image generation runs initializers immediately.
    incremental: AtomicBool,
    deferred_init: Mutex<Vec<ModuleRef>>,
    /// Fallback counter mixed into build ids, for coarse clocks.
    build_id_counter: AtomicU64,
    epoch: Instant,
    /// Position the evaluator is currently executing, if known.
    source_location: RwLock<Option<SourceLoc>>,
}

impl Runtime {
    /// Create a runtime reporting to stderr.
    pub fn new() -> Self {
        Runtime::with_sink(stderr_sink())
    }

    /// Create a runtime reporting to the given sink.
    pub fn with_sink(sink: SharedSink) -> Self {
        Runtime {
            interner: SharedInterner::new(),
            sink,
            core: OnceLock::new(),
            main: OnceLock::new(),
            base: OnceLock::new(),
            top: RwLock::new(None),
            depwarn: AtomicU8::new(DepWarnMode::Warn.as_u8()),
            generating_output: AtomicBool::new(false),
            incremental: AtomicBool::new(false),
            deferred_init: Mutex::new(Vec::new()),
            build_id_counter: AtomicU64::new(0),
            epoch: Instant::now(),
            source_location: RwLock::new(None),
        }
    }

    /// The runtime's interner.
    pub fn interner(&self) -> &StringInterner {
        &self.interner
    }

    /// Intern identifier text.
    pub fn intern(&self, s: &str) -> Name {
        self.interner.intern(s)
    }

    /// Text of an interned name.
    pub(crate) fn text(&self, name: Name) -> &'static str {
        self.interner.lookup(name)
    }

    /// The diagnostic sink.
    pub fn sink(&self) -> &SharedSink {
        &self.sink
    }

    // Process-wide module handles. Each is set once during bootstrap.

    /// Install the language core module. Returns `false` if already set.
    pub fn set_core_module(&self, m: ModuleRef) -> bool {
        self.core.set(m).is_ok()
    }

    pub fn core_module(&self) -> Option<&ModuleRef> {
        self.core.get()
    }

    /// Install the root module (the deprecation boundary). Returns `false`
    /// if already set.
    pub fn set_main_module(&self, m: ModuleRef) -> bool {
        self.main.set(m).is_ok()
    }

    pub fn main_module(&self) -> Option<&ModuleRef> {
        self.main.get()
    }

    /// Install the base module that bounds option inheritance. Returns
    /// `false` if already set.
    pub fn set_base_module(&self, m: ModuleRef) -> bool {
        self.base.set(m).is_ok()
    }

    pub fn base_module(&self) -> Option<&ModuleRef> {
        self.base.get()
    }

    /// The primary top module, if one was recorded.
    pub fn top_module(&self) -> Option<ModuleRef> {
        self.top.read().clone()
    }

    /// Mark `m` as a top module; when `isprimary`, record it as the
    /// process-wide top module.
    pub fn set_istopmod(&self, m: &ModuleRef, isprimary: bool) {
        m.mark_istopmod();
        if isprimary {
            *self.top.write() = Some(m.clone());
        }
    }

    /// Current deprecation reporting mode.
    pub fn depwarn(&self) -> DepWarnMode {
        DepWarnMode::from_u8(self.depwarn.load(Ordering::Relaxed))
    }

    pub fn set_depwarn(&self, mode: DepWarnMode) {
        self.depwarn.store(mode.as_u8(), Ordering::Relaxed);
    }

    /// Configure image-generation mode. Non-incremental generation defers
    /// module initializers instead of running them.
    pub fn set_generating_output(&self, generating: bool, incremental: bool) {
        self.generating_output.store(generating, Ordering::Relaxed);
        self.incremental.store(incremental, Ordering::Relaxed);
    }

    /// Record the source position for deprecation hints; `None` clears it.
    pub fn set_source_location(&self, loc: Option<SourceLoc>) {
        *self.source_location.write() = loc;
    }

    pub(crate) fn source_location(&self) -> Option<SourceLoc> {
        self.source_location.read().clone()
    }

    /// Construct a module.
    ///
    /// When `default_names` is set and a core module exists, the new module
    /// starts with `using core` installed, its own name bound to itself as
    /// a constant, and that name exported (so `using M` makes `M` itself
    /// visible).
    pub fn new_module(
        &self,
        name: Name,
        parent: Option<&ModuleRef>,
        default_names: bool,
    ) -> ModuleRef {
        let name_hash = self.interner.hash_of(name);
        let hash = match parent {
            Some(p) => bitmix(name_hash, p.identity_hash()),
            None => bitmix(name_hash, MODULE_TYPE_SEED),
        };
        let m = Module::new(name, parent.cloned(), hash, self.fresh_build_id());
        debug!(module = self.text(name), "new module");
        if default_names {
            if let Some(core) = self.core_module() {
                self.module_using(&m, core);
            }
            // Bind the module's own name to itself.
            let _ = self.set_const(&m, name, crate::value::Value::Module(m.clone()));
        }
        self.module_export(&m, name);
        m
    }

    /// Construct a module on behalf of evaluated code.
    ///
    /// The parent is always the root module regardless of where the
    /// constructor ran. `std_imports` additionally installs `using base`.
    pub fn new_toplevel_module(
        &self,
        name: Name,
        std_imports: bool,
        default_names: bool,
    ) -> ModuleRef {
        let parent = self.main_module().cloned();
        let m = self.new_module(name, parent.as_ref(), default_names);
        if std_imports {
            self.add_standard_imports(&m);
        }
        m
    }

    /// Install the standard `using base` edge.
    pub fn add_standard_imports(&self, m: &ModuleRef) {
        if let Some(base) = self.base_module() {
            self.module_using(m, base);
        }
    }

    /// A fresh build identity: monotonic nanoseconds plus a process-wide
    /// counter so two modules constructed in the same clock tick still get
    /// distinct ids. The low half is never zero.
    fn fresh_build_id(&self) -> BuildId {
        let tick = self.build_id_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let mut lo = (self.epoch.elapsed().as_nanos() as u64).wrapping_add(tick);
        if lo == 0 {
            lo = 1;
        }
        BuildId { lo, hi: u64::MAX }
    }

    // Scalar option inheritance. Setters store directly; getters walk the
    // parent chain until a non-negative value, the base module, or a root.

    pub fn set_module_optlevel(&self, m: &ModuleRef, lvl: i32) {
        m.set_optlevel_raw(lvl);
    }

    pub fn get_module_optlevel(&self, m: &ModuleRef) -> i32 {
        self.inherited_option(m, Module::optlevel_raw)
    }

    pub fn set_module_compile(&self, m: &ModuleRef, value: i32) {
        m.set_compile_raw(value);
    }

    pub fn get_module_compile(&self, m: &ModuleRef) -> i32 {
        self.inherited_option(m, Module::compile_raw)
    }

    /// Set the inference option. Disabling inference also suppresses
    /// specialization on the same module.
    pub fn set_module_infer(&self, m: &ModuleRef, value: i32) {
        m.set_infer_raw(value);
        if value == 0 {
            self.set_module_nospecialize(m, true);
        }
    }

    pub fn get_module_infer(&self, m: &ModuleRef) -> i32 {
        self.inherited_option(m, Module::infer_raw)
    }

    pub fn set_module_max_methods(&self, m: &ModuleRef, value: i32) {
        m.set_max_methods_raw(value);
    }

    pub fn get_module_max_methods(&self, m: &ModuleRef) -> i32 {
        self.inherited_option(m, Module::max_methods_raw)
    }

    pub fn set_module_nospecialize(&self, m: &ModuleRef, on: bool) {
        m.set_nospecialize_raw(if on { -1 } else { 0 });
    }

    fn inherited_option(&self, m: &ModuleRef, read: impl Fn(&Module) -> i32) -> i32 {
        let mut cur = m.clone();
        let mut value = read(&cur);
        while value == -1 {
            if self.base_module().is_some_and(|b| same_module(&cur, b)) {
                break;
            }
            let Some(parent) = cur.parent().cloned() else {
                break;
            };
            cur = parent;
            value = read(&cur);
        }
        value
    }

    /// Run initializers of restored modules in order. In non-incremental
    /// image generation the modules are queued instead, to be initialized
    /// by the process that loads the image.
    pub fn init_restored_modules(
        &self,
        init_order: &[ModuleRef],
        run_initializer: &mut dyn FnMut(&ModuleRef),
    ) {
        let defer = self.generating_output.load(Ordering::Relaxed)
            && !self.incremental.load(Ordering::Relaxed);
        for m in init_order {
            if defer {
                self.deferred_init.lock().push(m.clone());
            } else {
                run_initializer(m);
            }
        }
    }

    /// Drain the deferred-init queue.
    pub fn take_deferred_inits(&self) -> Vec<ModuleRef> {
        std::mem::take(&mut *self.deferred_init.lock())
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::buffer_sink;
    use crate::value::Value;

    #[test]
    fn new_module_build_ids_are_unique_and_nonzero() {
        let rt = Runtime::new();
        let a = rt.new_module(rt.intern("A"), None, false);
        let b = rt.new_module(rt.intern("B"), None, false);
        assert_ne!(a.build_id().lo, 0);
        assert_ne!(b.build_id().lo, 0);
        assert_ne!(a.build_id().lo, b.build_id().lo);
    }

    #[test]
    fn default_names_bind_module_to_itself() {
        let rt = Runtime::new();
        let name = rt.intern("M");
        let m = rt.new_module(name, None, true);

        let b = rt.get_binding(&m, name);
        assert!(b.is_some_and(|b| b.is_const()));
        assert!(rt.exports_p(&m, name));
        match rt.get_global(&m, name) {
            Ok(Some(Value::Module(found))) => assert!(same_module(&found, &m)),
            other => panic!("expected module value, got {other:?}"),
        }
    }

    #[test]
    fn new_module_installs_using_core() {
        let rt = Runtime::with_sink(buffer_sink());
        let core_name = rt.intern("core");
        let core = rt.new_module(core_name, None, false);
        assert!(rt.set_core_module(core.clone()));

        let m = rt.new_module(rt.intern("M"), None, true);
        let usings = rt.module_usings(&m);
        assert_eq!(usings.len(), 1);
        assert!(same_module(&usings[0], &core));
    }

    #[test]
    fn toplevel_modules_parent_to_main() {
        let rt = Runtime::new();
        let main = rt.new_module(rt.intern("main"), None, false);
        assert!(rt.set_main_module(main.clone()));

        let m = rt.new_toplevel_module(rt.intern("Pkg"), false, false);
        assert!(m.parent().is_some_and(|p| same_module(p, &main)));
    }

    #[test]
    fn option_inheritance_walks_parents() {
        let rt = Runtime::new();
        let p = rt.new_module(rt.intern("P"), None, false);
        let c = rt.new_module(rt.intern("C"), Some(&p), false);

        rt.set_module_optlevel(&p, 3);
        assert_eq!(rt.get_module_optlevel(&c), 3);

        rt.set_module_optlevel(&c, 1);
        assert_eq!(rt.get_module_optlevel(&c), 1);

        rt.set_module_optlevel(&c, -1);
        assert_eq!(rt.get_module_optlevel(&c), 3);
    }

    #[test]
    fn option_inheritance_stops_at_base() {
        let rt = Runtime::new();
        let p = rt.new_module(rt.intern("P"), None, false);
        let base = rt.new_module(rt.intern("base"), Some(&p), false);
        let c = rt.new_module(rt.intern("C"), Some(&base), false);
        assert!(rt.set_base_module(base));

        rt.set_module_optlevel(&p, 2);
        // The walk stops at base, which still inherits nothing.
        assert_eq!(rt.get_module_optlevel(&c), -1);
    }

    #[test]
    fn disabling_inference_suppresses_specialization() {
        let rt = Runtime::new();
        let m = rt.new_module(rt.intern("M"), None, false);
        assert_eq!(m.nospecialize(), 0);
        rt.set_module_infer(&m, 0);
        assert_eq!(m.nospecialize(), -1);
        assert_eq!(rt.get_module_infer(&m), 0);
    }

    #[test]
    fn istopmod_records_primary() {
        let rt = Runtime::new();
        let m = rt.new_module(rt.intern("M"), None, false);
        assert!(!m.istopmod());
        rt.set_istopmod(&m, true);
        assert!(m.istopmod());
        assert!(rt.top_module().is_some_and(|t| same_module(&t, &m)));
    }

    #[test]
    fn init_restored_modules_defers_when_generating() {
        let rt = Runtime::new();
        let a = rt.new_module(rt.intern("A"), None, false);
        let b = rt.new_module(rt.intern("B"), None, false);

        let mut ran = Vec::new();
        rt.init_restored_modules(&[a.clone(), b.clone()], &mut |m| ran.push(m.clone()));
        assert_eq!(ran.len(), 2);

        rt.set_generating_output(true, false);
        rt.init_restored_modules(&[a, b], &mut |m| ran.push(m.clone()));
        assert_eq!(ran.len(), 2);
        assert_eq!(rt.take_deferred_inits().len(), 2);
        assert!(rt.take_deferred_inits().is_empty());
    }
}
