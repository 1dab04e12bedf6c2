//! Saving compiler state between stages and resuming from it.
//!
//! A [`Snapshot`] pairs a [`CheckpointRecord`] (chunk layout, externs, the
//! reached stage and session bookkeeping) with the program tree as encoded by
//! a host-supplied [`TreeCodec`]. Restoring requires a fresh compiler that was
//! given the same inputs through `init`; units are matched by input id.

use kiln_chunks::{ChunkDecl, ChunkGraph, UnitId};
use kiln_checkpoint::{
    CheckpointError, CheckpointRecord, CheckpointStore, ChunkRecord, CHECKPOINT_SCHEMA_VERSION,
};
use kiln_common::{ensure_state, InternalError, KilnResult};
use std::collections::BTreeSet;

use crate::compiler::{Compiler, Core};
use crate::frontend::{Frontend, TreeCodec, UnitIndex};
use crate::pipeline::PipelineState;

/// Version stamped into every checkpoint. Restoring across versions fails.
pub const COMPILER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Saved compiler state.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Everything but the tree.
    pub record: CheckpointRecord,
    /// The program tree, as produced by the codec.
    pub tree: Vec<u8>,
}

impl Snapshot {
    /// Writes the snapshot into `store`.
    pub fn save(&self, store: &CheckpointStore) -> Result<(), CheckpointError> {
        store.save(&self.record, &self.tree)
    }

    /// Reads a snapshot from `store`.
    pub fn load(store: &CheckpointStore) -> Result<Self, CheckpointError> {
        let (record, tree) = store.load()?;
        Ok(Self { record, tree })
    }
}

impl<F: Frontend> Core<F> {
    pub(crate) fn snapshot_record(&self) -> KilnResult<CheckpointRecord> {
        let graph = self
            .graph
            .as_ref()
            .ok_or_else(|| InternalError::new("nothing to checkpoint: no chunk graph"))?;
        ensure_state!(
            self.state != PipelineState::Uninitialized,
            "nothing to checkpoint before parsing"
        );

        let id_of = |unit: UnitId| self.catalog.unit(unit).input_id.as_str().to_string();
        let chunks = graph
            .decls()
            .into_iter()
            .zip(graph.chunks())
            .map(|(decl, (_, chunk))| ChunkRecord {
                name: decl.name,
                deps: decl.deps,
                inputs: chunk
                    .units
                    .iter()
                    .copied()
                    .filter(|&u| !self.catalog.unit(u).is_synthetic)
                    .map(id_of)
                    .collect(),
            })
            .collect();
        let mut registered: Vec<String> = self
            .catalog
            .units()
            .filter(|(_, u)| !u.is_synthetic)
            .map(|(_, u)| u.input_id.as_str().to_string())
            .collect();
        registered.sort();

        Ok(CheckpointRecord {
            schema_version: CHECKPOINT_SCHEMA_VERSION,
            compiler_version: COMPILER_VERSION.to_string(),
            stage: self.state.as_str().to_string(),
            feature_set: self.session.feature_set.clone(),
            chunks,
            externs: self.catalog.externs().iter().map(|&u| id_of(u)).collect(),
            registered,
            change_stamp: self.changes.stamp(),
            unique_name_id: self.session.unique_name_id,
            generated_names: self.session.generated_names.clone(),
            id_generators: self.session.id_generators.clone(),
            injected_libraries: self.session.injected_libraries().to_vec(),
        })
    }

    #[tracing::instrument(level = "debug", skip_all, fields(stage = %self.state))]
    pub(crate) fn snapshot(&self, codec: &dyn TreeCodec<F::Ast>) -> KilnResult<Snapshot> {
        let record = self.snapshot_record()?;
        let tree = codec
            .serialize(&self.program)
            .map_err(|e| InternalError::new(format!("cannot encode program tree: {e}")))?;
        Ok(Snapshot { record, tree })
    }

    fn lookup_input(&self, input: &str) -> KilnResult<UnitId> {
        self.catalog
            .lookup(&kiln_source::InputId::new(input))
            .ok_or_else(|| InternalError::new(format!("checkpoint names unknown input `{input}`")))
    }

    /// Replaces chunk layout, externs, program and session state with the
    /// checkpoint's. On error the compiler should be discarded.
    #[tracing::instrument(level = "debug", skip_all, fields(stage = %record.stage))]
    pub(crate) fn restore(
        &mut self,
        record: CheckpointRecord,
        tree: &[u8],
        codec: &dyn TreeCodec<F::Ast>,
    ) -> KilnResult<()> {
        ensure_state!(self.initialized, "restore needs the inputs registered through init");
        ensure_state!(
            self.state == PipelineState::Uninitialized,
            "restore must happen before any stage runs"
        );
        ensure_state!(
            record.compiler_version == COMPILER_VERSION,
            "checkpoint from compiler {} cannot be restored by {COMPILER_VERSION}",
            record.compiler_version
        );
        let state = PipelineState::from_name(&record.stage)
            .ok_or_else(|| InternalError::new(format!("unknown stage `{}`", record.stage)))?;

        let registered: BTreeSet<&str> = self
            .catalog
            .units()
            .filter(|(_, u)| !u.is_synthetic)
            .map(|(_, u)| u.input_id.as_str())
            .collect();
        let expected: BTreeSet<&str> = record.registered.iter().map(String::as_str).collect();
        ensure_state!(
            registered == expected,
            "registered inputs do not match the checkpoint ({} here, {} saved)",
            registered.len(),
            expected.len()
        );

        let decls: Vec<ChunkDecl> = record
            .chunks
            .iter()
            .map(|c| ChunkDecl {
                name: c.name.clone(),
                deps: c.deps.clone(),
            })
            .collect();
        let mut graph = ChunkGraph::declare(&decls)
            .map_err(|e| InternalError::new(format!("checkpoint chunk graph is invalid: {e}")))?;
        let mut placement = Vec::new();
        for chunk in &record.chunks {
            let id = graph.chunk_by_name(&chunk.name).ok_or_else(|| {
                InternalError::new(format!("checkpoint chunk `{}` missing", chunk.name))
            })?;
            for input in &chunk.inputs {
                placement.push((self.lookup_input(input)?, id));
            }
        }
        let externs = record
            .externs
            .iter()
            .map(|input| self.lookup_input(input))
            .collect::<KilnResult<Vec<_>>>()?;

        let all: Vec<UnitId> = self.catalog.units().map(|(id, _)| id).collect();
        for unit in all {
            let u = self.catalog.unit_mut(unit);
            u.chunk = None;
            u.is_extern = false;
        }
        let weak = graph.weak_chunk();
        for (unit, chunk) in placement {
            graph.attach(&mut self.catalog, unit, chunk);
            if Some(chunk) != weak {
                self.catalog.unit_mut(unit).is_weak = false;
            }
        }
        self.catalog.fill_empty_chunks(&mut graph);
        self.catalog.set_externs(externs);

        let index: UnitIndex = self
            .catalog
            .units()
            .map(|(id, u)| (u.input_id.clone(), id))
            .collect();
        let program = codec
            .deserialize(tree, &index)
            .map_err(|e| InternalError::new(format!("cannot decode program tree: {e}")))?;
        for script in &program.externs {
            let unit = self.catalog.lookup(&script.input_id);
            ensure_state!(
                unit == Some(script.unit) && self.catalog.unit(script.unit).is_extern,
                "restored extern script `{}` is not a registered extern",
                script.input_id
            );
        }
        for script in &program.sources {
            let unit = self.catalog.lookup(&script.input_id);
            ensure_state!(
                unit == Some(script.unit) && self.catalog.unit(script.unit).chunk.is_some(),
                "restored script `{}` is not a chunk member",
                script.input_id
            );
        }

        self.changes.resume_at(record.change_stamp)?;
        self.graph = Some(graph);
        self.program = program;
        self.script_index = None;
        self.session.feature_set = record.feature_set;
        self.session.unique_name_id = record.unique_name_id;
        self.session.generated_names = record.generated_names;
        self.session.id_generators = record.id_generators;
        self.session.set_injected_libraries(record.injected_libraries);
        self.state = state;
        tracing::debug!(stage = %state, scripts = self.program.len(), "state restored");
        Ok(())
    }
}

impl<F: Frontend> Compiler<F> {
    /// Captures the compiler's state after a stage.
    pub fn snapshot<C>(&mut self, codec: C) -> KilnResult<Snapshot>
    where
        C: TreeCodec<F::Ast> + Send + 'static,
    {
        self.call(move |core| core.snapshot(&codec))
    }

    /// Resumes from `snapshot`. The compiler must have run `init` with the
    /// same inputs and no stage since.
    pub fn restore<C>(&mut self, snapshot: Snapshot, codec: C) -> KilnResult<()>
    where
        C: TreeCodec<F::Ast> + Send + 'static,
    {
        self.call(move |core| core.restore(snapshot.record, &snapshot.tree, &codec))
    }
}
