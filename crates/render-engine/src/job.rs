//! Planning encoder jobs from work items.
//!
//! A work item renders either in simple mode (the scheme's size, fps,
//! bitrate and codec applied after the item's own filters) or in complex
//! mode (the item's filter graph used verbatim, nothing from the scheme).

use std::path::{Path, PathBuf};

use easycut_common::error::{EasycutError, EasycutResult};
use easycut_project_model::{filter_chain, format_number, FrameSize, Scheme, WorkItem};

use crate::backend::EncodeInvocation;

/// Square the pixels so the display aspect ratio survives later scaling.
pub const KEEP_DAR_FILTER: &str =
    "scale=w='if(gt(sar,1),iw*sar,iw)':h='if(lt(sar,1),ih/sar,ih)',setsar=1";

/// One encoder input.
#[derive(Debug, Clone, PartialEq)]
pub struct JobInput {
    pub path: PathBuf,
    pub seek_secs: Option<f64>,
}

/// Job that applies the scheme.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleJob {
    pub inputs: Vec<JobInput>,
    /// Item filters, applied before aspect normalization and sizing.
    pub filters: Vec<String>,
    pub size: FrameSize,
    pub pad: bool,
    pub fps: String,
    pub bitrate: String,
    pub codec: String,
    pub duration_secs: Option<f64>,
    pub output: PathBuf,
}

/// Job driven by a caller-supplied filter graph.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexJob {
    pub inputs: Vec<JobInput>,
    pub filter_graph: Option<String>,
    pub duration_secs: Option<f64>,
    pub output: PathBuf,
}

/// A planned encoder job.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderJob {
    Simple(SimpleJob),
    Complex(ComplexJob),
}

impl RenderJob {
    /// Plan the job rendering `item` to `output`.
    ///
    /// Inputs are the item's advanced inputs followed by its own file; the
    /// seek offset applies to the item's own file only.
    pub fn plan(item: &WorkItem, scheme: &Scheme, output: impl Into<PathBuf>) -> EasycutResult<Self> {
        let props = &item.properties;
        let mut inputs: Vec<JobInput> = props
            .extra_inputs()
            .iter()
            .map(|path| JobInput {
                path: path.clone(),
                seek_secs: None,
            })
            .collect();
        inputs.push(JobInput {
            path: item.file.clone(),
            seek_secs: props.seek_offset(),
        });
        let output = output.into();
        let duration_secs = props.duration_cap();

        if props.is_complex() {
            let filter_graph = props
                .complex_filter
                .as_deref()
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(str::to_string);
            return Ok(RenderJob::Complex(ComplexJob {
                inputs,
                filter_graph,
                duration_secs,
                output,
            }));
        }

        let filters = filter_chain(&props.filters).map_err(|e| {
            EasycutError::job(format!("{}: {e}", item.file.display()))
        })?;
        let size = scheme
            .frame_size()
            .map_err(|e| EasycutError::config(e.to_string()))?;

        Ok(RenderJob::Simple(SimpleJob {
            inputs,
            filters,
            size,
            pad: scheme.pad,
            fps: scheme.fps_arg(),
            bitrate: scheme.bitrate.to_arg(),
            codec: scheme.codec.trim().to_string(),
            duration_secs,
            output,
        }))
    }

    pub fn mode(&self) -> &'static str {
        match self {
            RenderJob::Simple(_) => "simple",
            RenderJob::Complex(_) => "complex",
        }
    }

    pub fn inputs(&self) -> &[JobInput] {
        match self {
            RenderJob::Simple(job) => &job.inputs,
            RenderJob::Complex(job) => &job.inputs,
        }
    }

    pub fn output(&self) -> &Path {
        match self {
            RenderJob::Simple(job) => &job.output,
            RenderJob::Complex(job) => &job.output,
        }
    }

    pub fn duration_secs(&self) -> Option<f64> {
        match self {
            RenderJob::Simple(job) => job.duration_secs,
            RenderJob::Complex(job) => job.duration_secs,
        }
    }

    /// Seek offset of the item's own (last) input.
    pub fn primary_seek_secs(&self) -> f64 {
        self.inputs()
            .last()
            .and_then(|input| input.seek_secs)
            .unwrap_or(0.0)
    }

    /// Encoder arguments, without the binary.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["-y".to_string(), "-hide_banner".to_string()];
        for input in self.inputs() {
            if let Some(seek) = input.seek_secs {
                args.push("-ss".to_string());
                args.push(format_number(seek));
            }
            args.push("-i".to_string());
            args.push(input.path.to_string_lossy().into_owned());
        }

        match self {
            RenderJob::Simple(job) => {
                let mut chain = job.filters.clone();
                chain.push(KEEP_DAR_FILTER.to_string());
                chain.push(size_filter(job.size, job.pad));
                args.extend([
                    "-vf".to_string(),
                    chain.join(","),
                    "-r".to_string(),
                    job.fps.clone(),
                    "-b:v".to_string(),
                    job.bitrate.clone(),
                    "-c:v".to_string(),
                    job.codec.clone(),
                ]);
            }
            RenderJob::Complex(job) => match &job.filter_graph {
                Some(graph) => args.extend(["-filter_complex".to_string(), graph.clone()]),
                None => args.extend(["-vf".to_string(), KEEP_DAR_FILTER.to_string()]),
            },
        }

        if let Some(duration) = self.duration_secs() {
            args.push("-t".to_string());
            args.push(format_number(duration));
        }
        args.push(self.output().to_string_lossy().into_owned());
        args
    }

    /// The invocation handed to the backend.
    pub fn invocation(&self) -> EncodeInvocation {
        EncodeInvocation::new(self.to_args())
            .with_output(self.output())
            .with_expected_duration(self.duration_secs())
            .with_input_skip(self.primary_seek_secs())
    }
}

/// Size filter for the target frame: letterboxed with `pad`, stretched
/// otherwise.
pub fn size_filter(size: FrameSize, pad: bool) -> String {
    let FrameSize { width, height } = size;
    if pad {
        format!(
            "scale={width}:{height}:force_original_aspect_ratio=decrease,\
             pad={width}:{height}:(ow-iw)/2:(oh-ih)/2:color=black"
        )
    } else {
        format!("scale={width}:{height}")
    }
}
