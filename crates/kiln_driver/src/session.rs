//! Name and library bookkeeping that outlives individual passes.

use std::collections::{BTreeMap, BTreeSet};

/// Counters and maps shared by passes across stages and carried by
/// checkpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Language features the program uses.
    pub feature_set: BTreeSet<String>,
    /// Counter behind [`unique_name`](Self::unique_name).
    pub unique_name_id: u64,
    /// Names generated so far, by original name.
    pub generated_names: BTreeMap<String, String>,
    /// Cross-chunk id generator state, by generator name.
    pub id_generators: BTreeMap<String, String>,
    injected_libraries: Vec<String>,
}

impl SessionState {
    /// Returns a fresh name derived from `base`.
    pub fn unique_name(&mut self, base: &str) -> String {
        let name = format!("{base}$kiln${}", self.unique_name_id);
        self.unique_name_id += 1;
        name
    }

    /// Returns the generated name for `original`, creating one on first use.
    pub fn generated_name(&mut self, original: &str) -> String {
        if let Some(name) = self.generated_names.get(original) {
            return name.clone();
        }
        let name = self.unique_name(original);
        self.generated_names
            .insert(original.to_string(), name.clone());
        name
    }

    /// Marks a runtime library as injected. Returns `false` if it already was.
    pub fn inject_library(&mut self, name: &str) -> bool {
        if self.injected_libraries.iter().any(|l| l == name) {
            return false;
        }
        self.injected_libraries.push(name.to_string());
        true
    }

    /// Injected libraries, in injection order.
    pub fn injected_libraries(&self) -> &[String] {
        &self.injected_libraries
    }

    pub(crate) fn set_injected_libraries(&mut self, libraries: Vec<String>) {
        self.injected_libraries = libraries;
    }
}
