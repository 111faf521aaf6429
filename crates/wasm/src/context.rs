use std::collections::BTreeMap;

use crate::dispatch::Library;
use crate::instruction::ValueType;
use crate::mem::DataSection;
use crate::state::GlobalValue;

/// Signature of a function in the module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionPrototype {
    /// Internal name, e.g. `$func12`
    pub name: String,
    pub params: Vec<ValueType>,
    pub results: Vec<ValueType>,
}

impl FunctionPrototype {
    pub fn new(
        name: impl Into<String>,
        params: impl Into<Vec<ValueType>>,
        results: impl Into<Vec<ValueType>>,
    ) -> Self {
        Self {
            name: name.into(),
            params: params.into(),
            results: results.into(),
        }
    }

    /// Space separated parameter types, e.g. `i32 i64`.
    pub fn param_types(&self) -> String {
        join_types(&self.params)
    }

    /// Space separated result types.
    pub fn result_types(&self) -> String {
        join_types(&self.results)
    }

    pub fn has_result(&self) -> bool {
        !self.results.is_empty()
    }
}

fn join_types(types: &[ValueType]) -> String {
    types
        .iter()
        .map(ValueType::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Language the module was compiled from. Selects which library models apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SourceLanguage {
    C,
    Go,
    Rust,
    #[default]
    Unknown,
}

impl SourceLanguage {
    pub fn library(&self) -> Option<Library> {
        match self {
            Self::C => Some(Library::C),
            Self::Go => Some(Library::Go),
            Self::Rust => Some(Library::Rust),
            Self::Unknown => None,
        }
    }
}

/// Facts about the module under analysis and per-run flags. Shared read-only by every state.
#[derive(Debug, Clone, Default)]
pub struct ModuleContext {
    pub prototypes: Vec<FunctionPrototype>,

    /// Function index to name from the name section
    pub func_index_to_name: BTreeMap<u32, String>,

    /// Element index to readable function name
    pub elem_index_to_func: BTreeMap<u64, String>,

    /// Offset of the first element segment in the table
    pub table_offset: u64,

    pub data_section: DataSection,

    /// Initial values of the global section
    pub globals: BTreeMap<u32, GlobalValue>,

    pub source_language: SourceLanguage,

    /// Calls to functions named `checker$N` are handed to the instrumentation hook
    pub instrumentation_hooks: bool,
}

impl ModuleContext {
    pub fn new(prototypes: impl Into<Vec<FunctionPrototype>>) -> Self {
        Self {
            prototypes: prototypes.into(),
            ..Default::default()
        }
    }

    /// Resolve an internal `$funcN` name through the name section. Other names are returned
    /// unchanged.
    pub fn readable_name<'a>(&'a self, name: &'a str) -> &'a str {
        name.strip_prefix("$func")
            .and_then(|index| index.parse::<u32>().ok())
            .and_then(|index| self.func_index_to_name.get(&index))
            .map(String::as_str)
            .unwrap_or(name)
    }

    pub fn prototype(&self, offset: usize) -> Option<&FunctionPrototype> {
        self.prototypes.get(offset)
    }

    /// Offset of the prototype whose readable name is `name`.
    pub fn find_prototype(&self, name: &str) -> Option<usize> {
        self.prototypes
            .iter()
            .position(|prototype| self.readable_name(&prototype.name) == name)
    }
}
