//! Render session controller: the host-facing entry point.
//!
//! The controller holds the pending scheme, work items and output path,
//! starts renders in the background and exposes them through a
//! [`RenderHandle`]. At most one render runs per controller (and per
//! working directory, through the workdir lock).
//!
//! ```text
//!            render()             all fragments + concat ok
//!   Idle ───────────────▶ Rendering ─────────────────────────▶ Completed
//!    ▲                        │                                    │
//!    │                        │ job/concat error, cancel           │ render()
//!    │                        ▼                                    │
//!    └──────────────────── Failed ◀──── render() ──────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use easycut_common::config::AppConfig;
use easycut_common::error::{EasycutError, EasycutResult};
use easycut_project_model::{FilterSpec, RenderSessionConfig, Scheme, WorkItem, WorkItemRegistry};

use crate::backend::{
    cancel_pair, CancelSignal, CancelTrigger, EncoderBackend, FfmpegBackend, JobObserver,
    NoopObserver,
};
use crate::binaries::EncoderBinaries;
use crate::concat::Concatenator;
use crate::executor::{lock_fragments, FragmentList, RenderContext, SharedFragments};
use crate::job::RenderJob;
use crate::preview::{PreviewRequest, PreviewStreamer};
use crate::probe::MediaInfo;
use crate::progress::{overall_percent, JobProgress};
use crate::sequencer::RenderSequencer;
use crate::workdir::{import_media, Workdir, WorkdirLock};

/// Buffered events before a slow consumer starts holding the render back.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Rendering,
    Completed,
    Failed,
}

/// Events emitted by a running render, in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderEvent {
    Started {
        total_items: usize,
    },
    JobStarted {
        index: usize,
        command_line: String,
    },
    Progress {
        index: usize,
        job_percent: Option<f64>,
        /// Whole-session percentage across all items.
        percent: f64,
    },
    Diagnostic {
        index: usize,
        line: String,
    },
    FragmentRendered {
        index: usize,
        file_name: String,
    },
    Concatenating {
        fragments: usize,
    },
    Completed {
        output: PathBuf,
    },
    Failed {
        message: String,
    },
}

/// Result of a successful render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderOutcome {
    pub output: PathBuf,
    pub fragments: Vec<PathBuf>,
    pub started_at: String,
    pub elapsed_secs: f64,
}

/// Handle on a render running in the background.
///
/// Dropping the handle does not stop the render. Progress and diagnostic
/// events are dropped while the event buffer is full; lifecycle events
/// (job start, fragment rendered, concatenation, completion) are not, so a
/// host that never reads events holds the render back once the buffer fills.
/// Call [`RenderHandle::wait`] to discard events instead.
pub struct RenderHandle {
    events: mpsc::Receiver<RenderEvent>,
    cancel: CancelTrigger,
    task: JoinHandle<EasycutResult<RenderOutcome>>,
}

impl RenderHandle {
    /// Next event, or `None` once the render has finished and every event
    /// has been received.
    pub async fn next_event(&mut self) -> Option<RenderEvent> {
        self.events.recv().await
    }

    /// Request cancellation. The running encoder job is killed and the
    /// render fails with [`EasycutError::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the render to finish, discarding unread events.
    pub async fn wait(self) -> EasycutResult<RenderOutcome> {
        let RenderHandle {
            events,
            cancel: _cancel,
            task,
        } = self;
        drop(events);
        task.await
            .map_err(|e| EasycutError::Other(anyhow::anyhow!("Render task failed: {e}")))?
    }
}

struct Pending {
    state: SessionState,
    config: RenderSessionConfig,
}

/// Controls render sessions for one working directory.
#[derive(Clone)]
pub struct RenderSessionController {
    backend: Arc<dyn EncoderBackend>,
    workdir: Workdir,
    pending: Arc<Mutex<Pending>>,
    fragments: SharedFragments,
}

impl RenderSessionController {
    pub fn new(backend: Arc<dyn EncoderBackend>, workdir: Workdir) -> Self {
        Self {
            backend,
            workdir,
            pending: Arc::new(Mutex::new(Pending {
                state: SessionState::Idle,
                config: RenderSessionConfig::default(),
            })),
            fragments: SharedFragments::default(),
        }
    }

    /// Controller backed by ffmpeg, with binaries and workdir from `config`.
    pub fn from_config(config: &AppConfig) -> EasycutResult<Self> {
        let binaries = EncoderBinaries::resolve(&config.encoder.binaries)?;
        let workdir = Workdir::ensure(&config.workdir)?;
        Ok(Self::new(Arc::new(FfmpegBackend::new(binaries)), workdir))
    }

    fn pending(&self) -> MutexGuard<'_, Pending> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_not_rendering(pending: &Pending, operation: &str) -> EasycutResult<()> {
        if pending.state == SessionState::Rendering {
            return Err(EasycutError::precondition(format!(
                "cannot {operation} while a render is in progress"
            )));
        }
        Ok(())
    }

    pub fn workdir(&self) -> &Workdir {
        &self.workdir
    }

    pub fn backend(&self) -> &Arc<dyn EncoderBackend> {
        &self.backend
    }

    pub fn state(&self) -> SessionState {
        self.pending().state
    }

    /// Replace the scheme. Always accepted; a running render keeps the
    /// scheme it started with.
    pub fn set_scheme(&self, scheme: Scheme) {
        self.pending().config.scheme = scheme;
    }

    pub fn scheme(&self) -> Scheme {
        self.pending().config.scheme.clone()
    }

    /// Set the master output base path (extension comes from the scheme).
    pub fn set_output(&self, base: Option<PathBuf>) {
        self.pending().config.output = base;
    }

    pub fn output_path(&self) -> PathBuf {
        self.pending()
            .config
            .output_path(&self.workdir.default_output_base())
    }

    pub fn set_work_items(&self, items: impl Into<WorkItemRegistry>) -> EasycutResult<()> {
        let mut pending = self.pending();
        Self::ensure_not_rendering(&pending, "replace work items")?;
        pending.config.work_items = items.into();
        Ok(())
    }

    pub fn add_work_item(&self, item: WorkItem) -> EasycutResult<()> {
        let mut pending = self.pending();
        Self::ensure_not_rendering(&pending, "add a work item")?;
        pending.config.work_items.push(item);
        Ok(())
    }

    pub fn add_work_item_filter(&self, index: usize, filter: FilterSpec) -> EasycutResult<()> {
        let mut pending = self.pending();
        Self::ensure_not_rendering(&pending, "change work item filters")?;
        pending
            .config
            .work_items
            .add_filter(index, filter)
            .map_err(|e| EasycutError::precondition(e.to_string()))
    }

    pub fn work_items(&self) -> WorkItemRegistry {
        self.pending().config.work_items.clone()
    }

    /// Snapshot of the fragments of the current or last render.
    pub fn fragments(&self) -> FragmentList {
        lock_fragments(&self.fragments).clone()
    }

    /// Load scheme, work items and output from a session config.
    pub fn load_session(&self, config: RenderSessionConfig) -> EasycutResult<()> {
        let mut pending = self.pending();
        Self::ensure_not_rendering(&pending, "load a session")?;
        pending.config = config;
        Ok(())
    }

    /// Start rendering the pending configuration.
    pub fn render(&self) -> EasycutResult<RenderHandle> {
        let config = self.pending().config.clone();
        self.render_with(config)
    }

    /// Start rendering `config`.
    ///
    /// Returns an error without starting when a render is already running
    /// here or in the same workdir, or when the scheme is invalid. Every
    /// other failure, including an empty item list, ends the render and is
    /// reported through the handle.
    pub fn render_with(&self, config: RenderSessionConfig) -> EasycutResult<RenderHandle> {
        config
            .scheme
            .validate()
            .map_err(|e| EasycutError::config(e.to_string()))?;

        let lock = {
            let mut pending = self.pending();
            Self::ensure_not_rendering(&pending, "start a render")?;
            let lock = self.workdir.lock()?;
            self.workdir.clear_fragments()?;
            pending.state = SessionState::Rendering;
            lock
        };
        lock_fragments(&self.fragments).clear();

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (trigger, signal) = cancel_pair();
        let session = Session {
            backend: Arc::clone(&self.backend),
            pending: Arc::clone(&self.pending),
            ctx: RenderContext {
                scheme: config.scheme.clone(),
                work_items: config.work_items.clone(),
                workdir: self.workdir.clone(),
                fragments: Arc::clone(&self.fragments),
                cancel: signal,
            },
            output: config.output_path(&self.workdir.default_output_base()),
            events: tx,
        };

        tracing::info!(
            items = config.work_items.len(),
            workdir = %self.workdir.root().display(),
            "Render session started"
        );
        let task = tokio::spawn(session.run(lock));
        Ok(RenderHandle {
            events: rx,
            cancel: trigger,
            task,
        })
    }

    /// Container and stream metadata of `path`.
    pub async fn get_meta(&self, path: &Path) -> EasycutResult<MediaInfo> {
        self.backend.probe(path).await
    }

    /// Stream a preview into `sink`. Allowed during a render.
    pub async fn render_preview<W>(&self, request: &PreviewRequest, sink: &mut W) -> EasycutResult<u64>
    where
        W: AsyncWrite + Unpin + Send,
    {
        PreviewStreamer::new(Arc::clone(&self.backend))
            .render_preview(request, sink)
            .await
    }

    /// Re-encode `input` with the current scheme to `<workdir>/<name><ext>`.
    pub async fn convert_to_compliant(&self, input: &Path, name: &str) -> EasycutResult<PathBuf> {
        if name.trim().is_empty() || name.contains(['/', '\\']) {
            return Err(EasycutError::config(format!("invalid conversion name '{name}'")));
        }
        if !input.exists() {
            return Err(EasycutError::FileNotFound {
                path: input.to_path_buf(),
            });
        }
        let scheme = self.scheme();
        scheme
            .validate()
            .map_err(|e| EasycutError::config(e.to_string()))?;
        self.workdir.ensure_master_dir()?;

        let output = self.workdir.conversion_path(name, &scheme);
        let job = RenderJob::plan(&WorkItem::new(input), &scheme, &output)?;

        tracing::info!(input = %input.display(), output = %output.display(), "Converting to scheme");
        self.backend
            .run(&job.invocation(), &NoopObserver, &CancelSignal::never())
            .await?;
        Ok(output)
    }

    /// Copy `original` into the project's `videos/` directory.
    pub async fn import_media(&self, original: &Path, project_file: &Path) -> EasycutResult<PathBuf> {
        import_media(original, project_file).await
    }
}

/// One running render.
struct Session {
    backend: Arc<dyn EncoderBackend>,
    pending: Arc<Mutex<Pending>>,
    ctx: RenderContext,
    output: PathBuf,
    events: mpsc::Sender<RenderEvent>,
}

impl Session {
    async fn run(self, lock: WorkdirLock) -> EasycutResult<RenderOutcome> {
        let start = Instant::now();
        let started_at = chrono::Utc::now().to_rfc3339();

        let result = self.drive().await.map(|(output, fragments)| RenderOutcome {
            output,
            fragments,
            started_at,
            elapsed_secs: start.elapsed().as_secs_f64(),
        });
        drop(lock);

        let (state, event) = match &result {
            Ok(outcome) => {
                tracing::info!(
                    output = %outcome.output.display(),
                    elapsed_secs = outcome.elapsed_secs,
                    "Render completed"
                );
                (
                    SessionState::Completed,
                    RenderEvent::Completed {
                        output: outcome.output.clone(),
                    },
                )
            }
            Err(e) => {
                tracing::error!("Render failed: {e}");
                (
                    SessionState::Failed,
                    RenderEvent::Failed {
                        message: e.to_string(),
                    },
                )
            }
        };
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .state = state;
        let _ = self.events.send(event).await;
        result
    }

    async fn drive(&self) -> EasycutResult<(PathBuf, Vec<PathBuf>)> {
        let total = self.ctx.work_items.len();
        self.emit(RenderEvent::Started { total_items: total }).await;

        let sequencer = RenderSequencer::new(Arc::clone(&self.backend));
        let fragments = sequencer
            .render_all(&self.ctx, 0, |index| EventRelay {
                index,
                total,
                file_name: self.ctx.scheme.fragment_name(index),
                events: self.events.clone(),
            })
            .await?;

        let names = lock_fragments(&self.ctx.fragments).file_names();
        self.emit(RenderEvent::Concatenating {
            fragments: names.len(),
        })
        .await;
        let output = Concatenator::new(Arc::clone(&self.backend))
            .concat(
                &self.ctx.workdir,
                &names,
                &self.output,
                &NoopObserver,
                &self.ctx.cancel,
            )
            .await?;
        Ok((output, fragments))
    }

    async fn emit(&self, event: RenderEvent) {
        // A dropped receiver means nobody is listening; the render goes on.
        let _ = self.events.send(event).await;
    }
}

/// Forwards one job's lifecycle to the session event channel.
struct EventRelay {
    index: usize,
    total: usize,
    file_name: String,
    events: mpsc::Sender<RenderEvent>,
}

#[async_trait]
impl JobObserver for EventRelay {
    async fn on_start(&self, command_line: &str) {
        let _ = self
            .events
            .send(RenderEvent::JobStarted {
                index: self.index,
                command_line: command_line.to_string(),
            })
            .await;
    }

    async fn on_progress(&self, progress: &JobProgress) {
        let _ = self
            .events
            .try_send(RenderEvent::Progress {
                index: self.index,
                job_percent: progress.percent,
                percent: overall_percent(self.index, self.total, progress.percent),
            });
    }

    async fn on_stderr(&self, line: &str) {
        let _ = self
            .events
            .try_send(RenderEvent::Diagnostic {
                index: self.index,
                line: line.to_string(),
            });
    }

    async fn on_end(&self) {
        let _ = self
            .events
            .send(RenderEvent::FragmentRendered {
                index: self.index,
                file_name: self.file_name.clone(),
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_full_event_buffer_drops_progress_not_lifecycle() {
        let (tx, mut rx) = mpsc::channel(1);
        let relay = EventRelay {
            index: 0,
            total: 1,
            file_name: "master0.mp4".to_string(),
            events: tx,
        };

        let noisy = async {
            for _ in 0..10 {
                relay.on_progress(&JobProgress::default()).await;
                relay.on_stderr("frame=  12 fps=0.0").await;
            }
        };
        tokio::time::timeout(Duration::from_secs(1), noisy)
            .await
            .expect("progress must not wait on a full buffer");

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, RenderEvent::Progress { index: 0, .. }));

        relay.on_end().await;
        let next = rx.recv().await.unwrap();
        assert_eq!(
            next,
            RenderEvent::FragmentRendered {
                index: 0,
                file_name: "master0.mp4".to_string()
            }
        );
    }
}
