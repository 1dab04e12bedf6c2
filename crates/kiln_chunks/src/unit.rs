//! Input units and their light dependency summaries.

use kiln_common::{define_id, Ident};
use kiln_source::{FileId, InputId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::chunk::ChunkId;

define_id!(
    /// Identifies a registered input unit. Never invalidated.
    UnitId
);

/// Load flag key selecting the module system of a unit.
pub const MODULE_FLAG: &str = "module";

/// How a unit participates in a module system.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum ModuleKind {
    /// A plain script.
    #[default]
    None,
    /// An ES6 module.
    Es6,
    /// A CommonJS module.
    CommonJs,
    /// A JSON data file.
    Json,
    /// A plain script that some module imports by path.
    ImportedScript,
}

/// The light summary a front end's cheap pre-parse extracts from a unit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DependencyInfo {
    /// Namespaces this unit provides.
    pub provides: Vec<Ident>,
    /// Namespaces or module identifiers this unit requires.
    pub requires: Vec<Ident>,
    /// References loaded lazily at run time; followed like requires.
    pub dynamic_requires: Vec<Ident>,
    /// Type-only references. Units reached only through these are weak.
    pub type_requires: Vec<Ident>,
    /// The unit carries an externs annotation.
    pub is_externs: bool,
    /// The unit carries a no-compile annotation.
    pub no_compile: bool,
    /// The module system the scan detected.
    pub module_kind: ModuleKind,
}

static NO_DEPENDENCIES: DependencyInfo = DependencyInfo {
    provides: Vec::new(),
    requires: Vec::new(),
    dynamic_requires: Vec::new(),
    type_requires: Vec::new(),
    is_externs: false,
    no_compile: false,
    module_kind: ModuleKind::None,
};

impl DependencyInfo {
    /// Iterates over requires and dynamic requires: the strong edges.
    pub fn strong_requires(&self) -> impl Iterator<Item = Ident> + '_ {
        self.requires
            .iter()
            .chain(self.dynamic_requires.iter())
            .copied()
    }
}

/// Where a unit's text comes from.
#[derive(Clone, Debug)]
pub enum UnitSource {
    /// Text supplied by the caller.
    Inline {
        /// Name used to derive the input id.
        name: PathBuf,
        /// The full text.
        text: String,
    },
    /// Text read through the source loader during parsing.
    Path(PathBuf),
}

/// A request to register one input.
#[derive(Clone, Debug)]
pub struct UnitSpec {
    /// Where the text comes from.
    pub source: UnitSource,
    /// Weak units are placed in the weak chunk.
    pub weak: bool,
    /// Arbitrary key/value flags, e.g. `module = "es6"`.
    pub load_flags: BTreeMap<String, String>,
}

impl UnitSpec {
    /// An input with inline text.
    pub fn inline(name: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            source: UnitSource::Inline {
                name: name.into(),
                text: text.into(),
            },
            weak: false,
            load_flags: BTreeMap::new(),
        }
    }

    /// An input loaded from `path`.
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: UnitSource::Path(path.into()),
            weak: false,
            load_flags: BTreeMap::new(),
        }
    }

    /// Marks the input weak.
    pub fn weak(mut self) -> Self {
        self.weak = true;
        self
    }

    /// Adds a load flag.
    pub fn with_flag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.load_flags.insert(key.into(), value.into());
        self
    }

    /// The input id this spec registers under.
    pub fn input_id(&self) -> InputId {
        match &self.source {
            UnitSource::Inline { name, .. } => InputId::from_path(name),
            UnitSource::Path(path) => InputId::from_path(path),
        }
    }
}

/// One registered input file.
#[derive(Debug)]
pub struct Unit {
    /// Stable id derived from the path.
    pub input_id: InputId,
    /// The file in the catalog's source database.
    pub file: FileId,
    /// Extern units are never emitted and belong to no chunk.
    pub is_extern: bool,
    /// Registered as weak.
    pub is_weak: bool,
    /// Placeholder inserted to keep a chunk non-empty.
    pub is_synthetic: bool,
    /// Owning chunk; `None` for externs and for units pruned or filtered out.
    pub chunk: Option<ChunkId>,
    /// Load flags given at registration.
    pub load_flags: BTreeMap<String, String>,
    forced_kind: Option<ModuleKind>,
    deps: OnceLock<DependencyInfo>,
}

impl Unit {
    pub(crate) fn new(
        input_id: InputId,
        file: FileId,
        is_extern: bool,
        is_weak: bool,
        load_flags: BTreeMap<String, String>,
    ) -> Self {
        Self {
            input_id,
            file,
            is_extern,
            is_weak,
            is_synthetic: false,
            chunk: None,
            load_flags,
            forced_kind: None,
            deps: OnceLock::new(),
        }
    }

    /// Stores the scanned dependency summary. Returns `false` if one was
    /// already stored; the first summary wins.
    pub fn set_dependency_info(&self, info: DependencyInfo) -> bool {
        self.deps.set(info).is_ok()
    }

    /// The scanned dependency summary, or an empty one before scanning.
    pub fn dependency_info(&self) -> &DependencyInfo {
        self.deps.get().unwrap_or(&NO_DEPENDENCIES)
    }

    /// Returns `true` once the dependency summary has been stored.
    pub fn is_scanned(&self) -> bool {
        self.deps.get().is_some()
    }

    /// The effective module kind: a forced kind, else the scanned kind, else
    /// the `module` load flag.
    pub fn module_kind(&self) -> ModuleKind {
        if let Some(kind) = self.forced_kind {
            return kind;
        }
        let scanned = self.dependency_info().module_kind;
        if scanned != ModuleKind::None {
            return scanned;
        }
        match self.load_flags.get(MODULE_FLAG).map(String::as_str) {
            Some("es6") => ModuleKind::Es6,
            Some("commonjs") => ModuleKind::CommonJs,
            _ => ModuleKind::None,
        }
    }

    /// Overrides the module kind.
    pub fn force_module_kind(&mut self, kind: ModuleKind) {
        self.forced_kind = Some(kind);
    }

    /// A unit that provides nothing and is not a module. Such units are
    /// implicit entry points during legacy pruning.
    pub fn is_moocher(&self) -> bool {
        self.dependency_info().provides.is_empty() && self.module_kind() == ModuleKind::None
    }
}
