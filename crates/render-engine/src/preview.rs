//! Short low-resolution previews streamed to a caller-supplied sink.
//!
//! Previews are independent of any render: they read the source directly,
//! never touch the working directory and may run while a render is in
//! flight.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWrite;

use easycut_common::error::{EasycutError, EasycutResult};
use easycut_project_model::{filter_chain, format_number, FilterSpec};

use crate::backend::{EncodeInvocation, EncoderBackend};

/// Longest preview produced.
pub const PREVIEW_MAX_SECS: f64 = 10.0;

/// Preview frame height; width follows the source aspect.
pub const PREVIEW_HEIGHT: u32 = 480;

/// Flags producing an MP4 that can be played while it is still being written.
pub const FRAGMENTED_MP4_FLAGS: &str = "frag_keyframe+empty_moov";

/// What to preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    pub path: PathBuf,

    /// Start offset in the source, seconds.
    #[serde(default)]
    pub seek: f64,

    #[serde(default)]
    pub filters: Vec<FilterSpec>,
}

impl PreviewRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            seek: 0.0,
            filters: Vec::new(),
        }
    }

    pub fn with_seek(mut self, seek: f64) -> Self {
        self.seek = seek;
        self
    }

    pub fn with_filters(mut self, filters: Vec<FilterSpec>) -> Self {
        self.filters = filters;
        self
    }

    /// Encoder arguments streaming the preview to stdout.
    pub fn to_args(&self) -> EasycutResult<Vec<String>> {
        let mut chain = filter_chain(&self.filters)
            .map_err(|e| EasycutError::stream(format!("Invalid preview filter: {e}")))?;
        // Never upscale; both sides stay even for yuv420p.
        chain.push(format!("scale=-2:'min({PREVIEW_HEIGHT},trunc(ih/2)*2)'"));

        let seek = if self.seek.is_finite() {
            self.seek.max(0.0)
        } else {
            0.0
        };
        Ok(vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-ss".to_string(),
            format_number(seek),
            "-i".to_string(),
            self.path.to_string_lossy().into_owned(),
            "-t".to_string(),
            format_number(PREVIEW_MAX_SECS),
            "-vf".to_string(),
            chain.join(","),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-f".to_string(),
            "mp4".to_string(),
            "-movflags".to_string(),
            FRAGMENTED_MP4_FLAGS.to_string(),
            "pipe:1".to_string(),
        ])
    }
}

#[derive(Clone)]
pub struct PreviewStreamer {
    backend: Arc<dyn EncoderBackend>,
}

impl PreviewStreamer {
    pub fn new(backend: Arc<dyn EncoderBackend>) -> Self {
        Self { backend }
    }

    /// Stream a preview of `request` into `sink`, returning bytes written.
    ///
    /// Errors are local to this request.
    pub async fn render_preview<W>(&self, request: &PreviewRequest, sink: &mut W) -> EasycutResult<u64>
    where
        W: AsyncWrite + Unpin + Send,
    {
        if !request.path.exists() {
            return Err(EasycutError::stream(format!(
                "Preview source not found: {}",
                request.path.display()
            )));
        }
        let invocation = EncodeInvocation::new(request.to_args()?)
            .with_expected_duration(Some(PREVIEW_MAX_SECS));

        tracing::debug!(path = %request.path.display(), seek = request.seek, "Streaming preview");
        let bytes = self.backend.stream(&invocation, sink).await?;
        tracing::debug!(path = %request.path.display(), bytes, "Preview finished");
        Ok(bytes)
    }
}
