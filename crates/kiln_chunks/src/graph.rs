//! The chunk dependency graph.
//!
//! Chunks are declared with the names of the chunks they depend on. The graph
//! validates those edges, rejects cycles, and computes a topological order in
//! which every chunk follows its dependencies. Among chunks whose dependencies
//! are all satisfied, the one declared first comes first, so the order is
//! deterministic and equals the declaration order whenever that is valid.
//!
//! The graph also owns chunk membership. Every move of a unit into or out of a
//! chunk goes through [`ChunkGraph::attach`] and [`ChunkGraph::detach`], which
//! keep [`Unit::chunk`](crate::Unit::chunk) in sync.

use kiln_common::Arena;
use kiln_diagnostics::{Diagnostic, DiagnosticSink};
use petgraph::algo::{has_path_connecting, is_cyclic_directed, kosaraju_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::catalog::InputCatalog;
use crate::chunk::{Chunk, ChunkDecl, ChunkId, ChunkSpec, WEAK_CHUNK_NAME};
use crate::errors;
use crate::unit::UnitId;

/// A configuration error that prevents a graph from being built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// No chunks were supplied.
    #[error("at least one chunk must be provided")]
    EmptyModuleList,

    /// The first chunk is empty while other chunks exist.
    #[error("root chunk `{name}` must contain at least one input")]
    EmptyRootModule {
        /// Name of the root chunk.
        name: String,
    },

    /// A dependency names an unknown chunk, targets the weak chunk, repeats a
    /// chunk name, or closes a cycle.
    #[error("bad dependency: `{from}` -> `{to}`")]
    ModuleDependency {
        /// The depending chunk.
        from: String,
        /// The dependency.
        to: String,
    },
}

impl GraphError {
    /// Converts this error into its halting diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            GraphError::EmptyModuleList => errors::error_empty_module_list(),
            GraphError::EmptyRootModule { name } => errors::error_empty_root_module(name),
            GraphError::ModuleDependency { from, to } => errors::error_module_dependency(from, to),
        }
    }
}

/// A validated, acyclic graph of chunks and their members.
#[derive(Debug)]
pub struct ChunkGraph {
    chunks: Arena<ChunkId, Chunk>,
    /// Edge `a -> b` means `a` depends on `b`.
    graph: DiGraph<ChunkId, ()>,
    nodes: Vec<NodeIndex>,
    by_name: HashMap<String, ChunkId>,
    order: Vec<ChunkId>,
    weak: Option<ChunkId>,
}

impl ChunkGraph {
    fn empty() -> Self {
        Self {
            chunks: Arena::new(),
            graph: DiGraph::new(),
            nodes: Vec::new(),
            by_name: HashMap::new(),
            order: Vec::new(),
            weak: None,
        }
    }

    /// Builds a graph from chunk specs, registering each chunk's inputs into
    /// `catalog` in order.
    ///
    /// Inputs are registered after validation succeeds. A duplicate input is
    /// reported by the catalog and left out of every chunk; weak inputs are
    /// placed in the weak chunk, which is created on demand.
    #[tracing::instrument(level = "debug", skip_all, fields(chunks = specs.len()))]
    pub fn build(
        specs: Vec<ChunkSpec>,
        catalog: &mut InputCatalog,
        sink: &DiagnosticSink,
    ) -> Result<Self, GraphError> {
        if let Some(root) = specs.first() {
            if specs.len() > 1 && root.inputs.is_empty() {
                return Err(GraphError::EmptyRootModule {
                    name: root.decl.name.clone(),
                });
            }
        }
        let decls: Vec<ChunkDecl> = specs.iter().map(|s| s.decl.clone()).collect();
        let mut graph = Self::declare(&decls)?;

        for (index, spec) in specs.into_iter().enumerate() {
            let chunk = ChunkId::from_raw(index as u32);
            for input in spec.inputs {
                let weak = input.weak;
                let Ok(unit) = catalog.register(input, false, sink) else {
                    continue;
                };
                let target = if weak {
                    graph.ensure_weak_chunk()
                } else {
                    chunk
                };
                graph.attach(catalog, unit, target);
            }
        }
        tracing::debug!(
            order = ?graph.order.iter().map(|&c| graph.chunks[c].name.as_str()).collect::<Vec<_>>(),
            "chunk graph built"
        );
        Ok(graph)
    }

    /// Declares chunks without members and validates their dependencies.
    pub fn declare(decls: &[ChunkDecl]) -> Result<Self, GraphError> {
        if decls.is_empty() {
            return Err(GraphError::EmptyModuleList);
        }
        let mut g = Self::empty();
        for decl in decls {
            if g.by_name.contains_key(&decl.name) {
                return Err(GraphError::ModuleDependency {
                    from: decl.name.clone(),
                    to: decl.name.clone(),
                });
            }
            g.push_chunk(decl.name.clone());
        }

        for (index, decl) in decls.iter().enumerate() {
            let from = ChunkId::from_raw(index as u32);
            for dep in &decl.deps {
                let bad = || GraphError::ModuleDependency {
                    from: decl.name.clone(),
                    to: dep.clone(),
                };
                let to = g.by_name.get(dep).copied().ok_or_else(bad)?;
                if to == from || g.chunks[to].is_weak() {
                    return Err(bad());
                }
                g.add_dep(from, to);
            }
        }

        if let Some(weak) = g.by_name.get(WEAK_CHUNK_NAME).copied() {
            g.weak = Some(weak);
            let others: Vec<ChunkId> = g
                .chunks
                .iter()
                .map(|(id, _)| id)
                .filter(|&id| id != weak)
                .collect();
            for other in others {
                g.add_dep(weak, other);
            }
        }

        if is_cyclic_directed(&g.graph) {
            if let Some((from, to)) = g.find_cycle_edge() {
                return Err(GraphError::ModuleDependency {
                    from: g.chunks[from].name.clone(),
                    to: g.chunks[to].name.clone(),
                });
            }
        }
        g.order = g.compute_order();
        Ok(g)
    }

    fn push_chunk(&mut self, name: String) -> ChunkId {
        let id = self.chunks.alloc(Chunk::new(name.clone()));
        self.nodes.push(self.graph.add_node(id));
        self.by_name.insert(name, id);
        id
    }

    fn add_dep(&mut self, from: ChunkId, to: ChunkId) {
        if self.chunks[from].deps.contains(&to) {
            return;
        }
        self.chunks[from].deps.push(to);
        let (a, b) = (self.node(from), self.node(to));
        self.graph.add_edge(a, b, ());
    }

    fn node(&self, id: ChunkId) -> NodeIndex {
        self.nodes[id.as_raw() as usize]
    }

    /// An edge inside some strongly connected component, picking the member
    /// declared first and its first declared dependency in the component.
    fn find_cycle_edge(&self) -> Option<(ChunkId, ChunkId)> {
        for scc in kosaraju_scc(&self.graph) {
            if scc.len() < 2 {
                continue;
            }
            let members: HashSet<ChunkId> = scc.iter().map(|&n| self.graph[n]).collect();
            let from = members.iter().copied().min()?;
            let to = self.chunks[from]
                .deps
                .iter()
                .copied()
                .find(|d| members.contains(d))?;
            return Some((from, to));
        }
        None
    }

    /// Kahn's algorithm with a min-heap on declaration index.
    fn compute_order(&self) -> Vec<ChunkId> {
        let mut remaining: Vec<usize> = self.chunks.values().map(|c| c.deps.len()).collect();
        let mut ready: BinaryHeap<Reverse<u32>> = remaining
            .iter()
            .enumerate()
            .filter(|(_, n)| **n == 0)
            .map(|(i, _)| Reverse(i as u32))
            .collect();
        let mut order = Vec::with_capacity(self.chunks.len());
        while let Some(Reverse(raw)) = ready.pop() {
            let id = ChunkId::from_raw(raw);
            order.push(id);
            for dependent in self
                .graph
                .neighbors_directed(self.node(id), Direction::Incoming)
            {
                let d = self.graph[dependent].as_raw() as usize;
                remaining[d] -= 1;
                if remaining[d] == 0 {
                    ready.push(Reverse(d as u32));
                }
            }
        }
        order
    }

    /// Returns the weak chunk, creating it after every other chunk if needed.
    pub fn ensure_weak_chunk(&mut self) -> ChunkId {
        if let Some(weak) = self.weak {
            return weak;
        }
        let weak = self.push_chunk(WEAK_CHUNK_NAME.to_string());
        let others: Vec<ChunkId> = self.order.clone();
        for other in others {
            self.add_dep(weak, other);
        }
        self.order.push(weak);
        self.weak = Some(weak);
        weak
    }

    /// Moves `unit` to the end of `chunk`, out of whatever chunk held it.
    pub fn attach(&mut self, catalog: &mut InputCatalog, unit: UnitId, chunk: ChunkId) {
        self.detach(catalog, unit);
        self.chunks[chunk].units.push(unit);
        catalog.unit_mut(unit).chunk = Some(chunk);
    }

    /// Removes `unit` from its chunk, if any. The unit stays registered.
    pub fn detach(&mut self, catalog: &mut InputCatalog, unit: UnitId) {
        if let Some(chunk) = catalog.unit_mut(unit).chunk.take() {
            self.chunks[chunk].units.retain(|&u| u != unit);
        }
    }

    /// Reorders the members of `chunk`. `units` must be a permutation of the
    /// current members.
    pub(crate) fn reorder(&mut self, chunk: ChunkId, units: Vec<UnitId>) {
        debug_assert_eq!(units.len(), self.chunks[chunk].units.len());
        self.chunks[chunk].units = units;
    }

    /// Returns the chunk with the given id.
    pub fn chunk(&self, id: ChunkId) -> &Chunk {
        &self.chunks[id]
    }

    /// Looks a chunk up by name.
    pub fn chunk_by_name(&self, name: &str) -> Option<ChunkId> {
        self.by_name.get(name).copied()
    }

    /// Chunk ids in topological order: every chunk after its dependencies.
    pub fn topological_order(&self) -> &[ChunkId] {
        &self.order
    }

    /// Iterates over chunks in topological order.
    pub fn chunks(&self) -> impl Iterator<Item = (ChunkId, &Chunk)> {
        self.order.iter().map(|&id| (id, &self.chunks[id]))
    }

    /// The weak chunk, if one exists.
    pub fn weak_chunk(&self) -> Option<ChunkId> {
        self.weak
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns `true` if the graph has no chunks. Never the case once built.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Returns `true` if `a` depends on `b`, directly or transitively.
    pub fn depends_on(&self, a: ChunkId, b: ChunkId) -> bool {
        a != b && has_path_connecting(&self.graph, self.node(a), self.node(b), None)
    }

    /// All chunk members in compilation order: chunks in topological order,
    /// then members in chunk order.
    pub fn units_in_order(&self) -> Vec<UnitId> {
        self.chunks()
            .flat_map(|(_, c)| c.units.iter().copied())
            .collect()
    }

    /// Declarations in topological order, enough to rebuild an equivalent
    /// graph with [`declare`](Self::declare).
    pub fn decls(&self) -> Vec<ChunkDecl> {
        self.chunks()
            .map(|(_, c)| ChunkDecl {
                name: c.name.clone(),
                deps: c.deps.iter().map(|&d| self.chunks[d].name.clone()).collect(),
            })
            .collect()
    }
}
