//! In-process encoder used by the render-engine integration tests.
//!
//! Fragment jobs write a small text file to their output; concat jobs read
//! the manifest and join the listed files, so tests can check ordering by
//! reading the master output.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Semaphore;

use easycut_common::error::{EasycutError, EasycutResult};
use easycut_project_model::WorkItem;
use easycut_render_engine::{
    CancelSignal, EncodeInvocation, EncoderBackend, JobObserver, JobProgress, MediaInfo,
    RenderEvent, RenderHandle, Workdir,
};

#[derive(Default)]
pub struct FakeBackend {
    fail_output: Option<String>,
    gate: Option<Arc<Semaphore>>,
    runs: Mutex<Vec<EncodeInvocation>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the job whose output file is named `file_name`.
    pub fn failing_on(file_name: &str) -> Self {
        Self {
            fail_output: Some(file_name.to_string()),
            ..Self::default()
        }
    }

    /// Every job blocks until a permit is added to the returned semaphore.
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        (
            Self {
                gate: Some(Arc::clone(&gate)),
                ..Self::default()
            },
            gate,
        )
    }

    pub fn invocations(&self) -> Vec<EncodeInvocation> {
        self.runs.lock().unwrap().clone()
    }

    pub fn concat_invocations(&self) -> Vec<EncodeInvocation> {
        self.invocations()
            .into_iter()
            .filter(|inv| inv.args.iter().any(|a| a == "concat"))
            .collect()
    }

    pub fn fragment_invocations(&self) -> Vec<EncodeInvocation> {
        self.invocations()
            .into_iter()
            .filter(|inv| !inv.args.iter().any(|a| a == "concat"))
            .collect()
    }
}

pub fn arg_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

#[async_trait]
impl EncoderBackend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn probe(&self, path: &Path) -> EasycutResult<MediaInfo> {
        if !path.exists() {
            return Err(EasycutError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        MediaInfo::from_ffprobe_json(
            br#"{"streams":[{"codec_type":"video","width":640,"height":360}],"format":{"duration":"3.0"}}"#,
        )
    }

    async fn run(
        &self,
        invocation: &EncodeInvocation,
        observer: &dyn JobObserver,
        cancel: &CancelSignal,
    ) -> EasycutResult<()> {
        self.runs.lock().unwrap().push(invocation.clone());
        observer
            .on_start(&invocation.command_line(Path::new("fake-ffmpeg")))
            .await;

        if let Some(gate) = &self.gate {
            tokio::select! {
                permit = gate.acquire() => permit.unwrap().forget(),
                _ = cancel.cancelled() => return Err(EasycutError::Cancelled),
            }
        }

        observer
            .on_progress(&JobProgress {
                percent: Some(50.0),
                ..JobProgress::default()
            })
            .await;
        observer.on_stderr("fake: encoding").await;

        let output = invocation.output.clone().unwrap();
        let file_name = output.file_name().unwrap().to_string_lossy().into_owned();
        if self.fail_output.as_deref() == Some(file_name.as_str()) {
            std::fs::write(&output, b"truncated").unwrap();
            return Err(EasycutError::job("simulated encoder failure"));
        }

        let contents = if invocation.args.iter().any(|a| a == "concat") {
            let manifest = PathBuf::from(arg_after(&invocation.args, "-i").unwrap());
            let dir = manifest.parent().unwrap().to_path_buf();
            std::fs::read_to_string(&manifest)
                .unwrap()
                .lines()
                .filter_map(|line| line.strip_prefix("file "))
                .map(|name| std::fs::read_to_string(dir.join(name)).unwrap())
                .collect::<String>()
        } else {
            let input = invocation
                .args
                .iter()
                .enumerate()
                .filter(|(_, a)| *a == "-i")
                .map(|(i, _)| invocation.args[i + 1].clone())
                .last()
                .unwrap();
            format!("[{input}]")
        };
        std::fs::write(&output, contents).unwrap();
        Ok(())
    }

    async fn stream(
        &self,
        invocation: &EncodeInvocation,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> EasycutResult<u64> {
        let payload = format!("fake-mp4 {}", invocation.args.join(" "));
        sink.write_all(payload.as_bytes())
            .await
            .map_err(|e| EasycutError::stream(e.to_string()))?;
        Ok(payload.len() as u64)
    }
}

/// Fresh workdir under the system temp dir.
pub fn temp_workdir(name: &str) -> Workdir {
    let root = std::env::temp_dir().join(format!("easycut_it_{name}"));
    let _ = std::fs::remove_dir_all(&root);
    Workdir::ensure(root).unwrap()
}

/// Create `count` source files in the workdir root and return work items for them.
pub fn source_items(workdir: &Workdir, count: usize) -> Vec<WorkItem> {
    (0..count)
        .map(|i| {
            let path = workdir.root().join(format!("source{i}.mov"));
            std::fs::write(&path, format!("source {i}")).unwrap();
            WorkItem::new(path)
        })
        .collect()
}

/// Drain every event of a render.
pub async fn collect_events(handle: &mut RenderHandle) -> Vec<RenderEvent> {
    let mut events = Vec::new();
    while let Some(event) = handle.next_event().await {
        events.push(event);
    }
    events
}

/// Read events until the job at `index` has started.
pub async fn wait_for_job_start(handle: &mut RenderHandle, index: usize) {
    while let Some(event) = handle.next_event().await {
        if matches!(event, RenderEvent::JobStarted { index: i, .. } if i == index) {
            return;
        }
    }
    panic!("render ended before job {index} started");
}

pub fn master_fragments_on_disk(workdir: &Workdir) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(workdir.master_dir())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("master"))
        .collect();
    names.sort();
    names
}
