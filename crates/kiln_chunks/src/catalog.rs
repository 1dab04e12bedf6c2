//! Registration and deduplication of input units.

use kiln_common::Arena;
use kiln_diagnostics::DiagnosticSink;
use kiln_source::{InputId, SourceDb, SourceFile, Span};
use std::collections::{BTreeMap, HashMap};

use crate::chunk::ChunkId;
use crate::errors;
use crate::graph::ChunkGraph;
use crate::unit::{Unit, UnitId, UnitSource, UnitSpec};

/// A registration rejected because its input id is already taken.
///
/// The warning has been reported to the sink by the time this is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("duplicate input `{input_id}`")]
pub struct DuplicateInput {
    /// The colliding id.
    pub input_id: InputId,
    /// The unit registered first, which is kept.
    pub existing: UnitId,
}

/// Every registered unit, its source file, and the extern list.
///
/// Units are never removed: hoisting, filtering and pruning only change which
/// chunk (if any) holds a unit, so lookups by id stay valid for the session.
#[derive(Debug, Default)]
pub struct InputCatalog {
    sources: SourceDb,
    units: Arena<UnitId, Unit>,
    index: HashMap<InputId, UnitId>,
    externs: Vec<UnitId>,
}

impl InputCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an input. The first registration of an id wins; a later one
    /// is reported as a duplicate warning and rejected.
    ///
    /// Extern units are appended to the extern list. Source units belong to no
    /// chunk until [`ChunkGraph::attach`] places them.
    pub fn register(
        &mut self,
        spec: UnitSpec,
        is_extern: bool,
        sink: &DiagnosticSink,
    ) -> Result<UnitId, DuplicateInput> {
        let input_id = spec.input_id();
        if let Some(&existing) = self.index.get(&input_id) {
            let first = Span::file(self.units[existing].file);
            let diag = if is_extern {
                errors::warning_duplicate_extern_input(input_id.as_str(), Span::DUMMY, first)
            } else {
                errors::warning_duplicate_input(input_id.as_str(), Span::DUMMY, first)
            };
            sink.emit(diag);
            tracing::debug!(input = %input_id, is_extern, "duplicate input ignored");
            return Err(DuplicateInput { input_id, existing });
        }

        let file = match spec.source {
            UnitSource::Inline { name, text } => self.sources.add_source(name, text),
            UnitSource::Path(path) => self.sources.add_path(path),
        };
        let unit = Unit::new(input_id.clone(), file, is_extern, spec.weak, spec.load_flags);
        let id = self.units.alloc(unit);
        self.index.insert(input_id, id);
        if is_extern {
            self.externs.push(id);
        }
        Ok(id)
    }

    /// Looks a unit up by input id.
    pub fn lookup(&self, input_id: &InputId) -> Option<UnitId> {
        self.index.get(input_id).copied()
    }

    /// Returns the unit with the given id.
    pub fn unit(&self, id: UnitId) -> &Unit {
        &self.units[id]
    }

    /// Returns the unit with the given id, mutably.
    pub fn unit_mut(&mut self, id: UnitId) -> &mut Unit {
        &mut self.units[id]
    }

    /// Iterates over all units in registration order.
    pub fn units(&self) -> impl Iterator<Item = (UnitId, &Unit)> {
        self.units.iter()
    }

    /// The source file backing a unit.
    pub fn file(&self, id: UnitId) -> &SourceFile {
        self.sources.get_file(self.units[id].file)
    }

    /// The extern units, in order.
    pub fn externs(&self) -> &[UnitId] {
        &self.externs
    }

    /// Replaces the extern list, marking each listed unit extern. Used when
    /// rebuilding state from a checkpoint.
    pub fn set_externs(&mut self, externs: Vec<UnitId>) {
        for &unit in &externs {
            self.units[unit].is_extern = true;
        }
        self.externs = externs;
    }

    /// Number of registered units, placeholders included.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Flags chunk members matching `pred` as extern without moving them yet;
    /// [`hoist_annotated`](Self::hoist_annotated) moves them later.
    pub fn mark_externs(&mut self, graph: &ChunkGraph, pred: impl Fn(&Unit) -> bool) -> usize {
        let mut marked = 0;
        for unit in graph.units_in_order() {
            let u = &mut self.units[unit];
            if !u.is_extern && pred(u) {
                u.is_extern = true;
                marked += 1;
            }
        }
        marked
    }

    /// Moves every chunk member matching `pred` to the end of the extern list.
    ///
    /// Members are visited in compilation order, so both the extern list and
    /// each chunk keep their relative order. Chunks left empty are filled.
    pub fn hoist_annotated(
        &mut self,
        graph: &mut ChunkGraph,
        pred: impl Fn(&Unit) -> bool,
    ) -> Vec<UnitId> {
        let hoisted: Vec<UnitId> = graph
            .units_in_order()
            .into_iter()
            .filter(|&u| pred(&self.units[u]))
            .collect();
        for &unit in &hoisted {
            graph.detach(self, unit);
            self.units[unit].is_extern = true;
            self.externs.push(unit);
        }
        if !hoisted.is_empty() {
            tracing::debug!(count = hoisted.len(), "hoisted units to externs");
            self.fill_empty_chunks(graph);
        }
        hoisted
    }

    /// Removes every chunk member matching `pred` from its chunk. The units stay
    /// registered so later lookups remain safe. Chunks left empty are filled.
    pub fn filter_annotated(
        &mut self,
        graph: &mut ChunkGraph,
        pred: impl Fn(&Unit) -> bool,
    ) -> Vec<UnitId> {
        let removed: Vec<UnitId> = graph
            .units_in_order()
            .into_iter()
            .filter(|&u| pred(&self.units[u]))
            .collect();
        for &unit in &removed {
            graph.detach(self, unit);
        }
        if !removed.is_empty() {
            tracing::debug!(count = removed.len(), "filtered units out of chunks");
            self.fill_empty_chunks(graph);
        }
        removed
    }

    /// Puts a placeholder unit into every empty chunk except the weak chunk.
    /// Idempotent: a second call finds no empty chunk.
    pub fn fill_empty_chunks(&mut self, graph: &mut ChunkGraph) -> usize {
        let empty: Vec<(ChunkId, String)> = graph
            .chunks()
            .filter(|(_, c)| c.units.is_empty() && !c.is_weak())
            .map(|(id, c)| (id, c.name.clone()))
            .collect();
        for (chunk, name) in &empty {
            let unit = self.synthesize_placeholder(name);
            graph.attach(self, unit, *chunk);
        }
        empty.len()
    }

    /// Returns the empty placeholder unit for `chunk_name`, registering it on
    /// first use.
    pub fn synthesize_placeholder(&mut self, chunk_name: &str) -> UnitId {
        let name = format!("[fill:{chunk_name}]");
        let input_id = InputId::new(&name);
        if let Some(id) = self.lookup(&input_id) {
            return id;
        }
        let file = self.sources.add_source(name, String::new());
        let mut unit = Unit::new(input_id.clone(), file, false, false, BTreeMap::new());
        unit.is_synthetic = true;
        let id = self.units.alloc(unit);
        self.index.insert(input_id, id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkSpec;
    use crate::errors::{W100, W101};

    fn build(chunks: Vec<ChunkSpec>) -> (InputCatalog, ChunkGraph, DiagnosticSink) {
        let mut catalog = InputCatalog::new();
        let sink = DiagnosticSink::new();
        let graph = ChunkGraph::build(chunks, &mut catalog, &sink).unwrap();
        (catalog, graph, sink)
    }

    fn files(names: &[&str]) -> Vec<UnitSpec> {
        names.iter().map(|n| UnitSpec::inline(*n, "")).collect()
    }

    fn ids(catalog: &InputCatalog, units: &[UnitId]) -> Vec<String> {
        units
            .iter()
            .map(|&u| catalog.unit(u).input_id.to_string())
            .collect()
    }

    #[test]
    fn extern_registered_first_wins_over_source() {
        let mut catalog = InputCatalog::new();
        let sink = DiagnosticSink::new();
        let ext = catalog
            .register(UnitSpec::inline("x.js", "extern text"), true, &sink)
            .unwrap();
        let dup = catalog
            .register(UnitSpec::inline("x.js", "source text"), false, &sink)
            .unwrap_err();
        assert_eq!(dup.existing, ext);
        assert_eq!(sink.count_code(W100), 1);
        assert!(!sink.has_errors());
        assert_eq!(catalog.file(ext).text(), Some("extern text"));
        assert!(catalog.unit(ext).is_extern);
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn duplicate_extern_reports_extern_kind() {
        let mut catalog = InputCatalog::new();
        let sink = DiagnosticSink::new();
        catalog.register(UnitSpec::inline("e.js", ""), true, &sink).unwrap();
        assert!(catalog.register(UnitSpec::inline("./e.js", ""), true, &sink).is_err());
        assert_eq!(sink.count_code(W101), 1);
        assert_eq!(catalog.externs().len(), 1);
    }

    #[test]
    fn hoist_preserves_relative_order() {
        let (mut catalog, mut graph, sink) = build(vec![
            ChunkSpec::new("A", &[], files(&["a1.js", "ext1.js", "a2.js"])),
            ChunkSpec::new("B", &["A"], files(&["ext2.js", "b1.js", "ext3.js"])),
        ]);
        catalog
            .register(UnitSpec::inline("base.js", ""), true, &sink)
            .unwrap();

        let hoisted =
            catalog.hoist_annotated(&mut graph, |u| u.input_id.as_str().starts_with("ext"));
        assert_eq!(ids(&catalog, &hoisted), vec!["ext1.js", "ext2.js", "ext3.js"]);
        assert_eq!(
            ids(&catalog, catalog.externs()),
            vec!["base.js", "ext1.js", "ext2.js", "ext3.js"]
        );
        assert_eq!(
            ids(&catalog, &graph.units_in_order()),
            vec!["a1.js", "a2.js", "b1.js"]
        );
        for &u in &hoisted {
            assert!(catalog.unit(u).is_extern);
            assert_eq!(catalog.unit(u).chunk, None);
        }
    }

    #[test]
    fn hoisting_everything_fills_chunk() {
        let (mut catalog, mut graph, _sink) =
            build(vec![ChunkSpec::new("A", &[], files(&["e.js"]))]);
        catalog.hoist_annotated(&mut graph, |_| true);
        let a = graph.chunk_by_name("A").unwrap();
        let members = &graph.chunk(a).units;
        assert_eq!(ids(&catalog, members), vec!["[fill:A]"]);
        assert!(catalog.unit(members[0]).is_synthetic);
        assert_eq!(catalog.file(members[0]).text(), Some(""));
    }

    #[test]
    fn filter_keeps_index_entry() {
        let (mut catalog, mut graph, _sink) =
            build(vec![ChunkSpec::new("A", &[], files(&["keep.js", "skip.js"]))]);
        let removed = catalog.filter_annotated(&mut graph, |u| u.input_id.as_str() == "skip.js");
        assert_eq!(removed.len(), 1);
        assert_eq!(ids(&catalog, &graph.units_in_order()), vec!["keep.js"]);
        let skip = catalog.lookup(&"skip.js".into()).unwrap();
        assert_eq!(catalog.unit(skip).chunk, None);
        assert!(!catalog.unit(skip).is_extern);
    }

    #[test]
    fn fill_empty_chunks_is_idempotent_and_skips_weak() {
        let (mut catalog, mut graph, _sink) = build(vec![
            ChunkSpec::new("A", &[], files(&["a.js"])),
            ChunkSpec::new("B", &["A"], vec![]),
            ChunkSpec::new("C", &["A"], vec![]),
        ]);
        graph.ensure_weak_chunk();
        assert_eq!(catalog.fill_empty_chunks(&mut graph), 2);
        let snapshot: Vec<_> = graph.chunks().map(|(_, c)| c.units.clone()).collect();
        assert_eq!(catalog.fill_empty_chunks(&mut graph), 0);
        let again: Vec<_> = graph.chunks().map(|(_, c)| c.units.clone()).collect();
        assert_eq!(snapshot, again);
        let weak = graph.weak_chunk().unwrap();
        assert!(graph.chunk(weak).units.is_empty());
    }

    #[test]
    fn placeholder_is_reused() {
        let mut catalog = InputCatalog::new();
        let a = catalog.synthesize_placeholder("main");
        let b = catalog.synthesize_placeholder("main");
        assert_eq!(a, b);
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn mark_externs_flags_without_moving() {
        let (mut catalog, graph, _sink) =
            build(vec![ChunkSpec::new("A", &[], files(&["a.js", "x.js"]))]);
        let marked = catalog.mark_externs(&graph, |u| u.input_id.as_str() == "x.js");
        assert_eq!(marked, 1);
        let x = catalog.lookup(&"x.js".into()).unwrap();
        assert!(catalog.unit(x).is_extern);
        assert!(catalog.unit(x).chunk.is_some());
        assert!(catalog.externs().is_empty());
    }
}
