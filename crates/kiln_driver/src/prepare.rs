//! The parallel prepare phase: load, scan and parse every unit.
//!
//! Each unit is handled by exactly one worker, which writes the unit's
//! content, dependency summary and tree into write-once slots. The pool's
//! `install` returns only when every worker is done; everything after it is
//! single-threaded.

use kiln_chunks::{InputCatalog, UnitId};
use kiln_common::{InternalError, Interner, KilnResult};
use kiln_diagnostics::DiagnosticSink;
use kiln_source::{SourceLoader, Span};
use rayon::prelude::*;
use std::sync::OnceLock;

use crate::errors;
use crate::frontend::Frontend;

/// Shared inputs of the prepare phase.
pub(crate) struct Prepare<'a, F: Frontend> {
    pub catalog: &'a InputCatalog,
    pub frontend: &'a F,
    pub loader: &'a dyn SourceLoader,
    pub interner: &'a Interner,
    pub sink: &'a DiagnosticSink,
}

impl<F: Frontend> Prepare<'_, F> {
    /// Prepares `units` on a pool of `threads` workers. The result holds one
    /// tree per unit, `None` where the content could not be loaded.
    #[tracing::instrument(level = "debug", skip_all, fields(units = units.len(), threads))]
    pub(crate) fn run(
        &self,
        units: &[UnitId],
        threads: usize,
    ) -> KilnResult<Vec<Option<F::Ast>>> {
        let slots: Vec<OnceLock<F::Ast>> = units.iter().map(|_| OnceLock::new()).collect();

        if threads <= 1 || units.len() <= 1 {
            for (slot, &unit) in slots.iter().zip(units) {
                self.prepare_one(unit, slot);
            }
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("kiln-parse-{i}"))
                .build()
                .map_err(|e| InternalError::new(format!("cannot build parse pool: {e}")))?;
            pool.install(|| {
                slots
                    .par_iter()
                    .zip(units.par_iter())
                    .for_each(|(slot, &unit)| self.prepare_one(unit, slot));
            });
        }

        Ok(slots.into_iter().map(OnceLock::into_inner).collect())
    }

    fn prepare_one(&self, unit: UnitId, slot: &OnceLock<F::Ast>) {
        let u = self.catalog.unit(unit);
        let text = match self.catalog.file(unit).load(self.loader) {
            Ok(text) => text,
            Err(e) => {
                self.sink.emit(errors::error_unreadable_input(
                    u.input_id.as_str(),
                    &e.message,
                    Span::file(u.file),
                ));
                return;
            }
        };
        u.set_dependency_info(self.frontend.scan(&u.input_id, text, self.interner));
        let _ = slot.set(self.frontend.parse(&u.input_id, text, self.sink));
    }
}
