//! Configuration types deserialized from `kiln.toml`.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// The top-level compiler options parsed from `kiln.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct CompilerOptions {
    /// Project metadata.
    pub project: ProjectMeta,
    /// Dependency management: sorting and pruning to entry points.
    #[serde(default)]
    pub dependencies: DependencyConfig,
    /// Module-system handling.
    #[serde(default)]
    pub modules: ModuleConfig,
    /// Pipeline switches.
    #[serde(default)]
    pub build: BuildConfig,
    /// Iteration caps for fixed-point pass groups.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Compiler thread and parse pool settings.
    #[serde(default)]
    pub executor: ExecutorConfig,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            project: ProjectMeta {
                name: "kiln".to_string(),
                version: String::new(),
            },
            dependencies: DependencyConfig::default(),
            modules: ModuleConfig::default(),
            build: BuildConfig::default(),
            limits: LimitsConfig::default(),
            executor: ExecutorConfig::default(),
        }
    }
}

/// Core project metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectMeta {
    /// The project name.
    pub name: String,
    /// The project version string.
    #[serde(default)]
    pub version: String,
}

/// How input dependencies are managed before compilation.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DependencyMode {
    /// Inputs are compiled in the order given.
    #[default]
    None,
    /// Inputs are reordered so providers precede requirers; nothing is dropped.
    SortOnly,
    /// Inputs are pruned to what the entry points reach; files providing
    /// nothing are kept as implicit entry points.
    PruneLegacy,
    /// Inputs are pruned to what the entry points reach; files providing
    /// nothing are dropped unless reached.
    Prune,
}

impl DependencyMode {
    /// Returns `true` for both pruning modes.
    pub fn prunes(self) -> bool {
        matches!(self, DependencyMode::PruneLegacy | DependencyMode::Prune)
    }

    /// Returns `true` if files that provide nothing should be dropped.
    pub fn drops_moochers(self) -> bool {
        self == DependencyMode::Prune
    }
}

/// Dependency management settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DependencyConfig {
    /// The dependency management mode.
    #[serde(default)]
    pub mode: DependencyMode,
    /// Entry points: a namespace, a module path, or `chunk:namespace`.
    ///
    /// Accepts a single string or a list of strings.
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    pub entry_points: Vec<String>,
}

/// Deserializes a field that can be either a single string or a list of strings.
fn deserialize_string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringOrVec;

    impl<'de> Visitor<'de> for StringOrVec {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            formatter.write_str("a string or a list of strings")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(vec![v.to_string()])
        }

        fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut vec = Vec::new();
            while let Some(val) = seq.next_element::<String>()? {
                vec.push(val);
            }
            Ok(vec)
        }
    }

    deserializer.deserialize_any(StringOrVec)
}

/// Module-system handling.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ModuleConfig {
    /// Resolve ES6 `import` references during pruning.
    #[serde(default)]
    pub es6: bool,
    /// Resolve CommonJS `require()` references during pruning.
    #[serde(default)]
    pub commonjs: bool,
}

impl ModuleConfig {
    /// Returns `true` if module-import reachability is enabled.
    pub fn resolves_imports(self) -> bool {
        self.es6 || self.commonjs
    }
}

/// Pipeline switches.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BuildConfig {
    /// Run the transpile/optimize and finalize stages.
    #[serde(default = "default_true")]
    pub optimize: bool,
    /// Replace optimization with the coverage-instrumentation pass.
    #[serde(default)]
    pub instrument_for_coverage_only: bool,
    /// When to run the validity check pass.
    #[serde(default)]
    pub dev_mode: DevMode,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            optimize: true,
            instrument_for_coverage_only: false,
            dev_mode: DevMode::default(),
        }
    }
}

/// When the optional validity check runs.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DevMode {
    /// Never.
    #[default]
    Off,
    /// After parsing and once more after compilation.
    StartAndEnd,
    /// After every pass.
    EveryPass,
}

/// Iteration caps for fixed-point pass groups.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LimitsConfig {
    /// Cap for fixed-point groups in the optimize stage.
    #[serde(default = "default_iterations")]
    pub max_optimize_iterations: u32,
    /// Cap for fixed-point groups in the finalize (code motion) stage.
    #[serde(default = "default_iterations")]
    pub max_motion_iterations: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_optimize_iterations: default_iterations(),
            max_motion_iterations: default_iterations(),
        }
    }
}

/// Compiler thread and parse pool settings.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ExecutorConfig {
    /// Size of the parse worker pool.
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Run each call on the dedicated compiler thread instead of the caller's.
    #[serde(default = "default_true")]
    pub use_compiler_thread: bool,
    /// Stack size of the compiler thread, in MiB.
    #[serde(default = "default_stack_size")]
    pub stack_size_mib: usize,
    /// Wall-clock limit per call, in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ExecutorConfig {
    /// The compiler thread's stack size in bytes.
    pub fn stack_size_bytes(&self) -> usize {
        self.stack_size_mib * 1024 * 1024
    }

    /// The per-call timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            use_compiler_thread: true,
            stack_size_mib: default_stack_size(),
            timeout_secs: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_iterations() -> u32 {
    100
}

fn default_threads() -> usize {
    1
}

fn default_stack_size() -> usize {
    64
}
