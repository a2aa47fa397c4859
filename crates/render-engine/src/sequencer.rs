//! Ordered rendering of all work items.

use std::path::PathBuf;
use std::sync::Arc;

use easycut_common::error::{EasycutError, EasycutResult};

use crate::backend::{EncoderBackend, JobObserver};
use crate::executor::{RenderContext, TranscodeExecutor};

/// Renders work items strictly one after another.
///
/// Item `i + 1` is submitted only after item `i` finished successfully;
/// the first failure stops the walk and nothing after it is submitted.
#[derive(Clone)]
pub struct RenderSequencer {
    executor: TranscodeExecutor,
}

impl RenderSequencer {
    pub fn new(backend: Arc<dyn EncoderBackend>) -> Self {
        Self {
            executor: TranscodeExecutor::new(backend),
        }
    }

    /// Render every item from `start_index` to the end, returning fragment
    /// paths in order. `make_observer` builds the observer for each index.
    pub async fn render_all<F, O>(
        &self,
        ctx: &RenderContext,
        start_index: usize,
        make_observer: F,
    ) -> EasycutResult<Vec<PathBuf>>
    where
        F: Fn(usize) -> O + Send + Sync,
        O: JobObserver,
    {
        if ctx.work_items.is_empty() {
            return Err(EasycutError::EmptyInput);
        }

        let total = ctx.work_items.len();
        tracing::info!(total, start_index, "Rendering work items");

        let mut fragments = Vec::with_capacity(total.saturating_sub(start_index));
        for (index, item) in ctx.work_items.iter().enumerate().skip(start_index) {
            if ctx.cancel.is_cancelled() {
                return Err(EasycutError::Cancelled);
            }
            let observer = make_observer(index);
            let fragment = self.executor.execute(ctx, index, item, &observer).await?;
            fragments.push(fragment);
        }
        Ok(fragments)
    }
}
