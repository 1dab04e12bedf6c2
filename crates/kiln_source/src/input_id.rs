//! Stable, path-derived identity of an input unit.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// The stable id of an input unit, derived from its path.
///
/// Two registrations with the same `InputId` are duplicates. Ids survive
/// process boundaries, which is what checkpoint restore relies on.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct InputId(String);

impl InputId {
    /// Creates an id from a path-like name, normalizing separators to `/` and
    /// dropping any leading `./`.
    pub fn new(name: impl AsRef<str>) -> Self {
        let mut s = name.as_ref().replace('\\', "/");
        while let Some(rest) = s.strip_prefix("./") {
            s = rest.to_string();
        }
        Self(s)
    }

    /// Creates an id from a filesystem path.
    pub fn from_path(path: &Path) -> Self {
        Self::new(path.to_string_lossy())
    }

    /// Returns the normalized id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The module identifier used to resolve ES6/CommonJS imports: the id with
    /// its file extension removed.
    pub fn module_name(&self) -> &str {
        let file_start = self.0.rfind('/').map_or(0, |i| i + 1);
        match self.0[file_start..].rfind('.') {
            Some(dot) if dot > 0 => &self.0[..file_start + dot],
            _ => &self.0,
        }
    }
}

impl fmt::Display for InputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InputId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_separators_and_dot_prefix() {
        assert_eq!(InputId::new("./src\\app.js").as_str(), "src/app.js");
        assert_eq!(InputId::new("././a.js").as_str(), "a.js");
        assert_eq!(InputId::new("./src/a.js"), InputId::new("src/a.js"));
    }

    #[test]
    fn module_name_strips_extension() {
        assert_eq!(InputId::new("lib/util.js").module_name(), "lib/util");
        assert_eq!(InputId::new("lib.v2/util").module_name(), "lib.v2/util");
        assert_eq!(InputId::new(".hidden").module_name(), ".hidden");
        assert_eq!(InputId::new("data.min.json").module_name(), "data.min");
    }

    #[test]
    fn from_path_matches_new() {
        let id = InputId::from_path(Path::new("a/b.js"));
        assert_eq!(id, InputId::from("a/b.js"));
        assert_eq!(id.to_string(), "a/b.js");
    }
}
