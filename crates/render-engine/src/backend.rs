//! Encoder backends.
//!
//! [`EncoderBackend`] is the seam between the render pipeline and the
//! transcoding tool. [`FfmpegBackend`] drives the ffmpeg CLI through
//! `tokio::process`; tests substitute in-process fakes.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{ChildStderr, ChildStdout, Command};
use tokio::sync::{mpsc, watch};

use easycut_common::error::{EasycutError, EasycutResult};

use crate::binaries::EncoderBinaries;
use crate::probe::{MediaInfo, FFPROBE_ARGS};
use crate::progress::{parse_stderr_duration, JobProgress, ProgressState};

/// Diagnostic lines kept for error messages.
const STDERR_TAIL_LINES: usize = 20;

/// Stderr lines buffered between the drain task and the progress pump.
const STDERR_CHANNEL_LINES: usize = 64;

/// One encoder invocation: arguments (without the binary) plus what the
/// backend needs to report progress.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeInvocation {
    pub args: Vec<String>,

    /// Output file, or `None` when the output is piped to stdout.
    pub output: Option<PathBuf>,

    /// Expected output duration. When unknown, the backend falls back to
    /// the input duration it reports, minus `input_skip_secs`.
    pub expected_duration_secs: Option<f64>,

    /// Seek offset applied to the primary input.
    pub input_skip_secs: f64,
}

impl EncodeInvocation {
    pub fn new(args: Vec<String>) -> Self {
        Self {
            args,
            output: None,
            expected_duration_secs: None,
            input_skip_secs: 0.0,
        }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_expected_duration(mut self, secs: Option<f64>) -> Self {
        self.expected_duration_secs = secs;
        self
    }

    pub fn with_input_skip(mut self, secs: f64) -> Self {
        self.input_skip_secs = secs.max(0.0);
        self
    }

    /// Human-readable command line, used for logs and start events.
    pub fn command_line(&self, program: &Path) -> String {
        std::iter::once(program.display().to_string())
            .chain(self.args.iter().map(|arg| shell_quote(arg)))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn shell_quote(arg: &str) -> String {
    if !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=+,@%".contains(c))
    {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Receives lifecycle events of one encoder job.
///
/// Every method defaults to a no-op.
#[async_trait]
pub trait JobObserver: Send + Sync {
    async fn on_start(&self, _command_line: &str) {}
    async fn on_progress(&self, _progress: &JobProgress) {}
    async fn on_stderr(&self, _line: &str) {}
    async fn on_end(&self) {}
    async fn on_error(&self, _reason: &str) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl JobObserver for NoopObserver {}

/// Read side of a cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

/// Write side of a cancellation flag.
#[derive(Debug)]
pub struct CancelTrigger {
    tx: watch::Sender<bool>,
}

/// Create a linked trigger/signal pair.
pub fn cancel_pair() -> (CancelTrigger, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelTrigger { tx }, CancelSignal { rx: Some(rx) })
}

impl CancelTrigger {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once cancellation is requested. Never resolves if the
    /// trigger is dropped without firing.
    pub async fn cancelled(&self) {
        let Some(rx) = &self.rx else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        let fired = rx.wait_for(|cancelled| *cancelled).await.is_ok();
        if !fired {
            std::future::pending::<()>().await;
        }
    }
}

/// A transcoding tool the pipeline can drive.
#[async_trait]
pub trait EncoderBackend: Send + Sync {
    /// Backend name.
    fn name(&self) -> &str;

    /// Check if this backend is available on the system.
    fn is_available(&self) -> bool;

    /// Read container and stream metadata.
    async fn probe(&self, path: &Path) -> EasycutResult<MediaInfo>;

    /// Run a file-to-file job to completion.
    ///
    /// Reports start, progress, and diagnostic lines to `observer`; the
    /// caller reports the terminal event. Kills the process and returns
    /// [`EasycutError::Cancelled`] when `cancel` fires.
    async fn run(
        &self,
        invocation: &EncodeInvocation,
        observer: &dyn JobObserver,
        cancel: &CancelSignal,
    ) -> EasycutResult<()>;

    /// Run a job whose output goes to stdout, copying it into `sink`.
    /// Returns the number of bytes written.
    async fn stream(
        &self,
        invocation: &EncodeInvocation,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> EasycutResult<u64>;
}

/// Backend driving the ffmpeg and ffprobe command-line tools.
#[derive(Debug, Clone, Default)]
pub struct FfmpegBackend {
    binaries: EncoderBinaries,
}

impl FfmpegBackend {
    pub fn new(binaries: EncoderBinaries) -> Self {
        Self { binaries }
    }

    pub fn binaries(&self) -> &EncoderBinaries {
        &self.binaries
    }
}

#[async_trait]
impl EncoderBackend for FfmpegBackend {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn is_available(&self) -> bool {
        self.binaries.is_available()
    }

    async fn probe(&self, path: &Path) -> EasycutResult<MediaInfo> {
        if !path.exists() {
            return Err(EasycutError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let output = Command::new(&self.binaries.ffprobe)
            .args(FFPROBE_ARGS)
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| EasycutError::job(format!("Failed to start ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(EasycutError::job(format!(
                "ffprobe failed for {} (status {}): {}",
                path.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        MediaInfo::from_ffprobe_json(&output.stdout)
    }

    async fn run(
        &self,
        invocation: &EncodeInvocation,
        observer: &dyn JobObserver,
        cancel: &CancelSignal,
    ) -> EasycutResult<()> {
        if cancel.is_cancelled() {
            return Err(EasycutError::Cancelled);
        }

        let mut args = vec![
            "-progress".to_string(),
            "pipe:1".to_string(),
            "-nostats".to_string(),
        ];
        args.extend(invocation.args.iter().cloned());
        let full = EncodeInvocation {
            args,
            ..invocation.clone()
        };
        let command_line = full.command_line(&self.binaries.ffmpeg);
        tracing::debug!(command = %command_line, "Running ffmpeg");

        let start = Instant::now();
        let mut child = Command::new(&self.binaries.ffmpeg)
            .args(&full.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EasycutError::job(format!("Failed to start ffmpeg: {e}")))?;

        tracing::info!(
            pid = child.id(),
            output = ?invocation.output,
            "ffmpeg process started"
        );
        observer.on_start(&command_line).await;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EasycutError::job("Failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EasycutError::job("Failed to capture ffmpeg stderr"))?;

        let pumped = tokio::select! {
            result = pump_output(stdout, stderr, invocation, observer, start) => result,
            _ = cancel.cancelled() => {
                tracing::info!(pid = child.id(), "Cancelling ffmpeg");
                if let Err(e) = child.start_kill() {
                    tracing::warn!("Failed to kill ffmpeg: {e}");
                }
                let _ = child.wait().await;
                return Err(EasycutError::Cancelled);
            }
        };
        let (final_state, tail) = pumped?;

        let status = child
            .wait()
            .await
            .map_err(|e| EasycutError::job(format!("Failed to wait on ffmpeg: {e}")))?;

        if !status.success() {
            return Err(EasycutError::job(format!(
                "ffmpeg exited with {status}: {}",
                tail.join("\n").trim()
            )));
        }

        observer
            .on_progress(&JobProgress::finished(final_state.out_time_secs))
            .await;
        tracing::info!(
            elapsed_secs = start.elapsed().as_secs_f64(),
            output = ?invocation.output,
            "ffmpeg job finished"
        );
        Ok(())
    }

    async fn stream(
        &self,
        invocation: &EncodeInvocation,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> EasycutResult<u64> {
        tracing::debug!(
            command = %invocation.command_line(&self.binaries.ffmpeg),
            "Streaming ffmpeg output"
        );
        let mut child = Command::new(&self.binaries.ffmpeg)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EasycutError::stream(format!("Failed to start ffmpeg: {e}")))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| EasycutError::stream("Failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EasycutError::stream("Failed to capture ffmpeg stderr"))?;

        // Drain stderr concurrently so ffmpeg never blocks on a full pipe.
        let stderr_task = tokio::spawn(collect_tail(stderr));

        let bytes = tokio::io::copy(&mut stdout, &mut *sink)
            .await
            .map_err(|e| EasycutError::stream(format!("Preview stream interrupted: {e}")))?;
        sink.flush()
            .await
            .map_err(|e| EasycutError::stream(format!("Preview stream interrupted: {e}")))?;

        let status = child
            .wait()
            .await
            .map_err(|e| EasycutError::stream(format!("Failed to wait on ffmpeg: {e}")))?;
        let tail = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(EasycutError::stream(format!(
                "ffmpeg exited with {status}: {}",
                tail.join("\n").trim()
            )));
        }
        Ok(bytes)
    }
}

/// Read progress blocks from stdout and diagnostic lines from stderr
/// until both pipes close.
async fn pump_output(
    stdout: ChildStdout,
    stderr: ChildStderr,
    invocation: &EncodeInvocation,
    observer: &dyn JobObserver,
    start: Instant,
) -> EasycutResult<(ProgressState, Vec<String>)> {
    let mut progress = BufReader::new(stdout);
    let mut progress_buf = Vec::new();
    let (line_tx, mut stderr_lines) = mpsc::channel(STDERR_CHANNEL_LINES);
    tokio::spawn(forward_lines(stderr, line_tx));

    let mut state = ProgressState::default();
    let mut tail = Vec::with_capacity(STDERR_TAIL_LINES);
    let mut input_duration: Option<f64> = None;
    let (mut stdout_open, mut stderr_open) = (true, true);

    while stdout_open || stderr_open {
        tokio::select! {
            line = read_lossy_line(&mut progress, &mut progress_buf), if stdout_open => match line {
                Ok(Some(line)) => {
                    if let Some((key, value)) = line.trim().split_once('=') {
                        state.update(key, value);
                        if key == "progress" {
                            let expected = invocation.expected_duration_secs.or_else(|| {
                                input_duration.map(|d| (d - invocation.input_skip_secs).max(0.0))
                            });
                            let report = state.report(expected, start.elapsed().as_secs_f64());
                            observer.on_progress(&report).await;
                        }
                    }
                }
                Ok(None) => stdout_open = false,
                Err(e) => {
                    return Err(EasycutError::job(format!("Failed reading ffmpeg progress: {e}")));
                }
            },
            line = stderr_lines.recv(), if stderr_open => match line {
                Some(line) => {
                    if input_duration.is_none() {
                        input_duration = parse_stderr_duration(&line);
                    }
                    tracing::trace!(target: "ffmpeg", "{line}");
                    push_tail(&mut tail, &line);
                    observer.on_stderr(&line).await;
                }
                None => stderr_open = false,
            },
        }
    }
    Ok((state, tail))
}

/// Read one `\n`-terminated line, decoding invalid UTF-8 lossily.
///
/// Partial reads stay in `buf`, so the future can be dropped by `select!`
/// without losing bytes.
async fn read_lossy_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> std::io::Result<Option<String>> {
    let read = reader.read_until(b'\n', buf).await?;
    if read == 0 && buf.is_empty() {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(&buf[..])
        .trim_end_matches(['\n', '\r'])
        .to_string();
    buf.clear();
    Ok(Some(line))
}

/// Send every line of `reader` to `lines`, then keep draining the pipe
/// until EOF so the encoder never blocks on a full stderr buffer.
async fn forward_lines<R: AsyncRead + Unpin>(reader: R, lines: mpsc::Sender<String>) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        match read_lossy_line(&mut reader, &mut buf).await {
            Ok(Some(line)) => {
                if lines.send(line).await.is_err() {
                    break;
                }
            }
            Ok(None) => return,
            Err(e) => {
                tracing::warn!("Failed reading ffmpeg stderr: {e}");
                break;
            }
        }
    }
    drop(lines);
    if let Err(e) = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await {
        tracing::debug!("Stopped draining ffmpeg stderr: {e}");
    }
}

async fn collect_tail<R: AsyncRead + Unpin>(reader: R) -> Vec<String> {
    let (line_tx, mut lines) = mpsc::channel::<String>(STDERR_CHANNEL_LINES);
    let collect = async {
        let mut tail = Vec::with_capacity(STDERR_TAIL_LINES);
        while let Some(line) = lines.recv().await {
            push_tail(&mut tail, &line);
        }
        tail
    };
    let ((), tail) = tokio::join!(forward_lines(reader, line_tx), collect);
    tail
}

fn push_tail(tail: &mut Vec<String>, line: &str) {
    let line = line.trim_end();
    if line.is_empty() {
        return;
    }
    if tail.len() == STDERR_TAIL_LINES {
        tail.remove(0);
    }
    tail.push(line.to_string());
}
