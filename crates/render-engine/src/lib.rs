//! EasyCut Render Engine
//!
//! Turns an ordered list of work items into one master video by
//! transcoding each item to a uniform fragment and joining the fragments
//! without re-encoding. Also streams short previews of single sources.
//!
//! # Pipeline Architecture
//!
//! ```text
//! work item 0 ──▶ Transcode (scheme or filter graph) ──▶ master/master0.mp4 ──┐
//! work item 1 ──▶ Transcode ─────────────────────────▶ master/master1.mp4 ──┤
//!     ⋮              (strictly one after another)             ⋮              │
//! work item N ──▶ Transcode ─────────────────────────▶ master/masterN.mp4 ──┤
//!                                                                            ▼
//!                                                       master/list.txt ──▶ Concat (stream copy)
//!                                                                            │
//!                                                                            ▼
//!                                                                    masterOutput.mp4
//!
//! source ──▶ Seek ──▶ Filters ──▶ Scale 480p ──▶ H.264, fragmented MP4 ──▶ sink (≤ 10 s)
//! ```
//!
//! The encoder is reached only through [`backend::EncoderBackend`];
//! [`backend::FfmpegBackend`] drives the ffmpeg CLI.

pub mod backend;
pub mod binaries;
pub mod concat;
pub mod controller;
pub mod executor;
pub mod job;
pub mod preview;
pub mod probe;
pub mod progress;
pub mod sequencer;
pub mod workdir;

pub use backend::{
    cancel_pair, CancelSignal, CancelTrigger, EncodeInvocation, EncoderBackend, FfmpegBackend,
    JobObserver, NoopObserver,
};
pub use binaries::EncoderBinaries;
pub use controller::*;
pub use executor::{FragmentList, FragmentRecord, FragmentState, RenderContext, TranscodeExecutor};
pub use job::RenderJob;
pub use preview::{PreviewRequest, PreviewStreamer, PREVIEW_MAX_SECS};
pub use probe::MediaInfo;
pub use progress::JobProgress;
pub use sequencer::RenderSequencer;
pub use workdir::{import_media, Workdir};
