//! Dependency management: ordering inputs and pruning them to entry points.
//!
//! Units reference each other through namespaces. A require resolves first to
//! the unit providing that namespace and, failing that, to the unit whose
//! module identifier matches (a module import). Pruning walks those edges from
//! the entry points with a single visited set:
//!
//! * requires and dynamic requires are strong edges;
//! * type requires are weak edges. A unit reached only through weak edges is
//!   kept but moved to the weak chunk;
//! * when module-import resolution is enabled, a plain script reached through a
//!   module import is reclassified as [`ModuleKind::ImportedScript`].
//!
//! Units that provide nothing and are not modules ("moochers") are implicit
//! entry points unless the mode drops them.

use kiln_common::{Ident, Interner};
use kiln_config::{CompilerOptions, DependencyMode};
use kiln_diagnostics::Diagnostic;
use kiln_source::InputId;
use std::collections::{HashMap, HashSet};

use crate::catalog::InputCatalog;
use crate::chunk::ChunkId;
use crate::errors;
use crate::graph::ChunkGraph;
use crate::unit::{ModuleKind, UnitId};

/// An entry point: a namespace or module path, optionally pinned to a chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    /// Chunk the entry unit must end up in, from the `chunk:name` form.
    pub chunk: Option<String>,
    /// The namespace or module path.
    pub name: String,
}

impl EntryPoint {
    /// Parses `name` or `chunk:name`.
    pub fn parse(s: &str) -> Self {
        match s.split_once(':') {
            Some((chunk, name)) if !chunk.is_empty() && !name.is_empty() => Self {
                chunk: Some(chunk.to_string()),
                name: name.to_string(),
            },
            _ => Self {
                chunk: None,
                name: s.to_string(),
            },
        }
    }
}

/// Settings for [`manage_dependencies`].
#[derive(Debug, Clone, Default)]
pub struct DependencyOptions {
    /// What to do.
    pub mode: DependencyMode,
    /// Where pruning starts.
    pub entry_points: Vec<EntryPoint>,
    /// Follow module imports (ES6 or CommonJS).
    pub resolve_imports: bool,
}

impl DependencyOptions {
    /// Extracts the dependency settings from compiler options.
    pub fn from_options(options: &CompilerOptions) -> Self {
        Self {
            mode: options.dependencies.mode,
            entry_points: options
                .dependencies
                .entry_points
                .iter()
                .map(|e| EntryPoint::parse(e))
                .collect(),
            resolve_imports: options.modules.resolves_imports(),
        }
    }
}

/// An entry point problem. Dependency management stops without changing the
/// graph when one occurs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DependencyError {
    /// Nothing provides the entry point.
    #[error("required entry point `{0}` never provided")]
    MissingEntryPoint(String),
    /// The entry point names an unknown chunk.
    #[error("unknown chunk `{0}` specified in entry point")]
    MissingChunk(String),
}

impl DependencyError {
    /// Converts this error into its halting diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            DependencyError::MissingEntryPoint(name) => errors::error_missing_entry_point(name),
            DependencyError::MissingChunk(name) => errors::error_missing_chunk(name),
        }
    }
}

/// What pruning did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneSummary {
    /// Chunk members kept in a strong chunk.
    pub kept: usize,
    /// Chunk members moved to the weak chunk.
    pub weak: usize,
    /// Chunk members removed from the graph.
    pub dropped: Vec<UnitId>,
    /// Units reclassified as imported scripts.
    pub imported_scripts: usize,
}

/// Applies the configured dependency mode to the graph.
#[tracing::instrument(level = "debug", skip_all, fields(mode = ?options.mode))]
pub fn manage_dependencies(
    catalog: &mut InputCatalog,
    graph: &mut ChunkGraph,
    options: &DependencyOptions,
    interner: &Interner,
) -> Result<PruneSummary, DependencyError> {
    match options.mode {
        DependencyMode::None => Ok(PruneSummary::default()),
        DependencyMode::SortOnly => {
            let resolver = Resolver::new(catalog, graph, interner, options.resolve_imports);
            sort_chunks(catalog, graph, &resolver);
            Ok(PruneSummary {
                kept: graph.units_in_order().len(),
                ..PruneSummary::default()
            })
        }
        DependencyMode::PruneLegacy | DependencyMode::Prune => {
            prune_to_entry_points(catalog, graph, options, interner)
        }
    }
}

/// Namespace and module-identifier lookup over the current chunk members.
struct Resolver {
    by_provide: HashMap<Ident, UnitId>,
    by_module: HashMap<Ident, UnitId>,
    resolve_imports: bool,
}

impl Resolver {
    fn new(
        catalog: &InputCatalog,
        graph: &ChunkGraph,
        interner: &Interner,
        resolve_imports: bool,
    ) -> Self {
        let mut by_provide = HashMap::new();
        let mut by_module = HashMap::new();
        for unit in graph.units_in_order() {
            let u = catalog.unit(unit);
            for &ns in &u.dependency_info().provides {
                by_provide.entry(ns).or_insert(unit);
            }
            let module = interner.get_or_intern(u.input_id.module_name());
            by_module.entry(module).or_insert(unit);
        }
        Self {
            by_provide,
            by_module,
            resolve_imports,
        }
    }

    /// Resolves a reference; the flag is `true` for a module import.
    fn resolve(&self, name: Ident) -> Option<(UnitId, bool)> {
        if let Some(&unit) = self.by_provide.get(&name) {
            return Some((unit, false));
        }
        if self.resolve_imports {
            return self.by_module.get(&name).map(|&u| (u, true));
        }
        None
    }

    /// Resolves an entry point by namespace, then by module identifier.
    fn resolve_entry(&self, name: &str, interner: &Interner) -> Option<UnitId> {
        if let Some(unit) = interner.get(name).and_then(|i| self.by_provide.get(&i)) {
            return Some(*unit);
        }
        let module = InputId::new(name);
        interner
            .get(module.module_name())
            .and_then(|i| self.by_module.get(&i))
            .copied()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Reach {
    Strong,
    Weak,
}

/// Prunes every chunk to the units reachable from the entry points.
///
/// Entry points are resolved before anything changes; an unresolvable one
/// leaves the graph untouched. Placeholders and units already marked extern
/// are always kept. Empty chunks are filled before returning.
pub fn prune_to_entry_points(
    catalog: &mut InputCatalog,
    graph: &mut ChunkGraph,
    options: &DependencyOptions,
    interner: &Interner,
) -> Result<PruneSummary, DependencyError> {
    let resolver = Resolver::new(catalog, graph, interner, options.resolve_imports);

    let mut roots: Vec<UnitId> = Vec::new();
    let mut pins: Vec<(UnitId, ChunkId)> = Vec::new();
    for entry in &options.entry_points {
        let unit = resolver
            .resolve_entry(&entry.name, interner)
            .ok_or_else(|| DependencyError::MissingEntryPoint(entry.name.clone()))?;
        if let Some(chunk_name) = &entry.chunk {
            let chunk = graph
                .chunk_by_name(chunk_name)
                .ok_or_else(|| DependencyError::MissingChunk(chunk_name.clone()))?;
            pins.push((unit, chunk));
        }
        roots.push(unit);
    }

    let members = graph.units_in_order();
    for &unit in &members {
        let u = catalog.unit(unit);
        let implicit = !options.mode.drops_moochers() && u.is_moocher();
        if implicit || u.is_synthetic || u.is_extern {
            roots.push(unit);
        }
    }

    let mut reach: HashMap<UnitId, Reach> = HashMap::new();
    let mut imported: HashSet<UnitId> = HashSet::new();
    let mut weak_roots: Vec<UnitId> = Vec::new();

    let mut stack: Vec<UnitId> = roots.into_iter().rev().collect();
    while let Some(unit) = stack.pop() {
        if reach.insert(unit, Reach::Strong).is_some() {
            continue;
        }
        let info = catalog.unit(unit).dependency_info();
        for name in info.strong_requires() {
            if let Some((target, via_module)) = resolver.resolve(name) {
                if via_module {
                    imported.insert(target);
                }
                if !reach.contains_key(&target) {
                    stack.push(target);
                }
            }
        }
        for &name in &info.type_requires {
            if let Some((target, _)) = resolver.resolve(name) {
                weak_roots.push(target);
            }
        }
    }

    let mut stack: Vec<UnitId> = weak_roots.into_iter().rev().collect();
    while let Some(unit) = stack.pop() {
        if reach.contains_key(&unit) {
            continue;
        }
        reach.insert(unit, Reach::Weak);
        let info = catalog.unit(unit).dependency_info();
        for name in info.strong_requires().chain(info.type_requires.iter().copied()) {
            if let Some((target, _)) = resolver.resolve(name) {
                if !reach.contains_key(&target) {
                    stack.push(target);
                }
            }
        }
    }

    let mut summary = PruneSummary::default();
    for &unit in &imported {
        let u = catalog.unit_mut(unit);
        if u.module_kind() == ModuleKind::None {
            u.force_module_kind(ModuleKind::ImportedScript);
            summary.imported_scripts += 1;
        }
    }

    for &unit in &members {
        match reach.get(&unit) {
            Some(Reach::Strong) => summary.kept += 1,
            Some(Reach::Weak) => {
                let weak = graph.ensure_weak_chunk();
                if catalog.unit(unit).chunk != Some(weak) {
                    graph.attach(catalog, unit, weak);
                }
                summary.weak += 1;
            }
            None => {
                graph.detach(catalog, unit);
                summary.dropped.push(unit);
            }
        }
    }
    // A pinned unit is strong in its chunk even if it was registered weak.
    for (unit, chunk) in pins {
        catalog.unit_mut(unit).is_weak = false;
        if catalog.unit(unit).chunk != Some(chunk) {
            graph.attach(catalog, unit, chunk);
        }
    }

    sort_chunks(catalog, graph, &resolver);
    catalog.fill_empty_chunks(graph);
    tracing::debug!(
        kept = summary.kept,
        weak = summary.weak,
        dropped = summary.dropped.len(),
        imported_scripts = summary.imported_scripts,
        "pruned to entry points"
    );
    Ok(summary)
}

/// Reorders each chunk so a unit follows the members of the same chunk it
/// requires. Ties keep the current order.
fn sort_chunks(catalog: &InputCatalog, graph: &mut ChunkGraph, resolver: &Resolver) {
    let chunk_ids: Vec<ChunkId> = graph.topological_order().to_vec();
    for chunk in chunk_ids {
        let members = graph.chunk(chunk).units.clone();
        let in_chunk: HashSet<UnitId> = members.iter().copied().collect();
        let mut visited: HashSet<UnitId> = HashSet::new();
        let mut sorted = Vec::with_capacity(members.len());
        for &unit in &members {
            visit(unit, catalog, resolver, &in_chunk, &mut visited, &mut sorted);
        }
        graph.reorder(chunk, sorted);
    }
}

/// Depth-first post-order over same-chunk requires. A unit is marked before
/// its requires are visited, so cycles terminate.
fn visit(
    unit: UnitId,
    catalog: &InputCatalog,
    resolver: &Resolver,
    in_chunk: &HashSet<UnitId>,
    visited: &mut HashSet<UnitId>,
    sorted: &mut Vec<UnitId>,
) {
    if !visited.insert(unit) {
        return;
    }
    let info = catalog.unit(unit).dependency_info();
    for name in info.strong_requires().chain(info.type_requires.iter().copied()) {
        if let Some((target, _)) = resolver.resolve(name) {
            if in_chunk.contains(&target) {
                visit(target, catalog, resolver, in_chunk, visited, sorted);
            }
        }
    }
    sorted.push(unit);
}
