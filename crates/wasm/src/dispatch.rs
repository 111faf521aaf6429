//! Resolution of call targets that are not plain internal functions.
//!
//! A call is dispatched, in order of precedence, to an instrumentation hook, a modeled library
//! function of the module's source language, a modeled WASI import, a terminating function, or
//! finally entered as an internal function.

use crate::context::{FunctionPrototype, ModuleContext};
use crate::emulator::{Error, Result, Transition};
use crate::solver::Solver;
use crate::state::ExecutionState;

/// Functions whose call ends the path with a failure.
pub const TERMINATING_FUNCTIONS: &[&str] = &["__assert_fail", "runtime.divideByZeroPanic"];

const C_FUNCTIONS: &[&str] = &[
    "__small_printf",
    "abs",
    "atof",
    "atoi",
    "emscripten_resize_heap",
    "exit",
    "exp",
    "fopen",
    "getchar",
    "hard_locale",
    "iprintf",
    "open",
    "printf",
    "putchar",
    "puts",
    "scanf",
    "setlocale",
    "strstr",
    "swap",
    "system",
    "vfprintf",
];

const GO_FUNCTIONS: &[&str] = &[
    "fmt.Printf",
    "fmt.Scanf",
    "memcpy",
    "memset",
    "runtime.alloc",
    "runtime.blockingPanic",
    "runtime.calculateHeapAddresses",
    "runtime.chanMakePanic",
    "runtime.divideByZeroPanic",
    "runtime.lookupPanic",
    "runtime.negativeShiftPanic",
    "runtime.nilPanic",
    "runtime.putchar",
    "runtime.slicePanic",
    "runtime.sliceToArrayPointerPanic",
    "runtime.unsafeSlicePanic",
    "syscall/js.valueGet",
];

const WASI_FUNCTIONS: &[&str] = &[
    "args_get",
    "args_sizes_get",
    "environ_sizes_get",
    "fd_advise",
    "fd_close",
    "fd_fdstat_get",
    "fd_prestat_dir_name",
    "fd_prestat_get",
    "fd_read",
    "fd_seek",
    "fd_tell",
    "fd_write",
    "path_open",
    "proc_exit",
];

/// A family of externally provided functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Library {
    C,
    Go,
    Rust,
    Wasi,
}

impl Library {
    /// Functions of this library with a symbolic model.
    pub fn modeled_functions(&self) -> &'static [&'static str] {
        match self {
            Self::C => C_FUNCTIONS,
            Self::Go => GO_FUNCTIONS,
            Self::Rust => &[],
            Self::Wasi => WASI_FUNCTIONS,
        }
    }
}

impl std::fmt::Display for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::C => "C library",
            Self::Go => "Go library",
            Self::Rust => "Rust library",
            Self::Wasi => "WASI import",
        };

        f.write_str(name)
    }
}

/// A call handed to a library model.
#[derive(Debug, Clone, Copy)]
pub struct ExternalCall<'a> {
    /// Readable callee name
    pub name: &'a str,
    pub library: Library,
    pub prototype: &'a FunctionPrototype,
    pub context: &'a ModuleContext,
}

impl ExternalCall<'_> {
    pub fn param_types(&self) -> String {
        self.prototype.param_types()
    }

    pub fn result_types(&self) -> String {
        self.prototype.result_types()
    }
}

/// Symbolic models of external functions.
///
/// A model transforms the calling state in place: it pops the parameters, pushes a result if the
/// prototype declares one and returns the successor states. Models must return at least one
/// successor and must leave the call context stack untouched.
pub trait LibraryModels: std::fmt::Debug {
    fn is_modeled(&self, name: &str, library: Library) -> bool {
        library.modeled_functions().contains(&name)
    }

    fn invoke<S: Solver>(
        &self,
        call: &ExternalCall<'_>,
        state: ExecutionState<S>,
    ) -> Result<Transition<S>>;

    /// Instrumentation hook for calls to `checker$index`. The default continues unchanged.
    fn checker<S: Solver>(&self, _index: i64, state: ExecutionState<S>) -> Result<Transition<S>> {
        Ok(Transition::Continue(vec![state]))
    }
}

/// Treats every function as unmodeled. Calls to imported functions are entered like internal
/// calls.
#[derive(Copy, Clone, Default, Debug)]
pub struct NoLibraryModels {}

impl LibraryModels for NoLibraryModels {
    fn is_modeled(&self, _name: &str, _library: Library) -> bool {
        false
    }

    fn invoke<S: Solver>(
        &self,
        _call: &ExternalCall<'_>,
        _state: ExecutionState<S>,
    ) -> Result<Transition<S>> {
        Err(Error::InternalError(
            "no library models configured".to_string(),
        ))
    }
}
