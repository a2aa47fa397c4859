//! Transcoding one work item into one fragment.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use easycut_common::error::{EasycutError, EasycutResult};
use easycut_project_model::{Scheme, WorkItem, WorkItemRegistry};

use crate::backend::{CancelSignal, EncoderBackend, JobObserver};
use crate::job::RenderJob;
use crate::workdir::Workdir;

/// Lifecycle of one fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentState {
    Pending,
    Complete,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FragmentRecord {
    pub index: usize,
    pub file_name: String,
    pub state: FragmentState,
}

/// Fragments of the current render, in submission order.
///
/// A record is appended when its job is submitted, before the encoder
/// runs, and updated when the job ends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FragmentList {
    records: Vec<FragmentRecord>,
}

impl FragmentList {
    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn push_pending(&mut self, index: usize, file_name: impl Into<String>) {
        self.records.push(FragmentRecord {
            index,
            file_name: file_name.into(),
            state: FragmentState::Pending,
        });
    }

    pub fn mark(&mut self, index: usize, state: FragmentState) {
        if let Some(record) = self.records.iter_mut().rev().find(|r| r.index == index) {
            record.state = state;
        }
    }

    pub fn records(&self) -> &[FragmentRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// File names in submission order, which is also playback order.
    pub fn file_names(&self) -> Vec<String> {
        self.records.iter().map(|r| r.file_name.clone()).collect()
    }

    pub fn all_complete(&self) -> bool {
        self.records
            .iter()
            .all(|r| r.state == FragmentState::Complete)
    }
}

/// Fragment list shared between a running render and its controller.
pub type SharedFragments = Arc<Mutex<FragmentList>>;

pub(crate) fn lock_fragments(fragments: &SharedFragments) -> MutexGuard<'_, FragmentList> {
    fragments
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Everything a render needs, fixed when the render starts.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub scheme: Scheme,
    pub work_items: WorkItemRegistry,
    pub workdir: Workdir,
    pub fragments: SharedFragments,
    pub cancel: CancelSignal,
}

/// Runs one work item through the encoder.
#[derive(Clone)]
pub struct TranscodeExecutor {
    backend: Arc<dyn EncoderBackend>,
}

impl TranscodeExecutor {
    pub fn new(backend: Arc<dyn EncoderBackend>) -> Self {
        Self { backend }
    }

    /// Render the item at `index` to its fragment and wait for the job to end.
    ///
    /// The observer receives the terminal `on_end`/`on_error` event exactly
    /// once, after the fragment list has been updated.
    pub async fn execute(
        &self,
        ctx: &RenderContext,
        index: usize,
        item: &WorkItem,
        observer: &dyn JobObserver,
    ) -> EasycutResult<PathBuf> {
        let result = self.submit(ctx, index, item, observer).await;
        match &result {
            Ok(_) => observer.on_end().await,
            Err(e) => observer.on_error(&e.to_string()).await,
        }
        result
    }

    async fn submit(
        &self,
        ctx: &RenderContext,
        index: usize,
        item: &WorkItem,
        observer: &dyn JobObserver,
    ) -> EasycutResult<PathBuf> {
        if ctx.cancel.is_cancelled() {
            return Err(EasycutError::Cancelled);
        }
        let output = ctx.workdir.fragment_path(index, &ctx.scheme);
        let job = RenderJob::plan(item, &ctx.scheme, &output)?;
        for input in job.inputs() {
            ensure_input_exists(&input.path)?;
        }

        let file_name = ctx.scheme.fragment_name(index);
        lock_fragments(&ctx.fragments).push_pending(index, &file_name);
        tracing::info!(
            index,
            fragment = %file_name,
            mode = job.mode(),
            input = %item.file.display(),
            "Submitting transcode job"
        );

        let result = self
            .backend
            .run(&job.invocation(), observer, &ctx.cancel)
            .await;

        let state = if result.is_ok() {
            FragmentState::Complete
        } else {
            remove_partial_output(&output);
            FragmentState::Failed
        };
        lock_fragments(&ctx.fragments).mark(index, state);

        match result {
            Ok(()) => {
                tracing::info!(index, fragment = %file_name, "Fragment rendered");
                Ok(output)
            }
            Err(EasycutError::Job { message }) => {
                tracing::error!(index, fragment = %file_name, "Transcode job failed: {message}");
                Err(EasycutError::job(format!(
                    "work item {index} ({}): {message}",
                    item.file.display()
                )))
            }
            Err(e) => Err(e),
        }
    }
}

/// A failed or cancelled encode may leave a truncated fragment behind.
fn remove_partial_output(path: &std::path::Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(fragment = %path.display(), "Removed partial fragment"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(fragment = %path.display(), "Failed to remove partial fragment: {e}"),
    }
}

/// Check a local input exists; URLs and other protocol inputs are left to
/// the encoder.
fn ensure_input_exists(path: &std::path::Path) -> EasycutResult<()> {
    let is_url = path.to_str().is_some_and(|p| p.contains("://"));
    if is_url || path.exists() {
        Ok(())
    } else {
        Err(EasycutError::job(format!(
            "Input not found: {}",
            path.display()
        )))
    }
}
