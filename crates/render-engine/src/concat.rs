//! Joining fragments into the master output.
//!
//! Fragments share the scheme's codec, size and frame rate, so they are
//! joined with the concat demuxer and stream copy; nothing is re-encoded.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use easycut_common::error::{EasycutError, EasycutResult};

use crate::backend::{CancelSignal, EncodeInvocation, EncoderBackend, JobObserver};
use crate::workdir::Workdir;

/// Concat-demuxer manifest listing `names` in order. Names are relative to
/// the manifest's directory.
pub fn build_manifest<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(|name| format!("file {}\n", name.as_ref()))
        .collect()
}

pub fn concat_args(manifest: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        manifest.to_string_lossy().into_owned(),
        "-c".to_string(),
        "copy".to_string(),
        output.to_string_lossy().into_owned(),
    ]
}

#[derive(Clone)]
pub struct Concatenator {
    backend: Arc<dyn EncoderBackend>,
}

impl Concatenator {
    pub fn new(backend: Arc<dyn EncoderBackend>) -> Self {
        Self { backend }
    }

    /// Write `<workdir>/master/list.txt` for `fragment_names` and join the
    /// fragments into `output`.
    pub async fn concat(
        &self,
        workdir: &Workdir,
        fragment_names: &[String],
        output: &Path,
        observer: &dyn JobObserver,
        cancel: &CancelSignal,
    ) -> EasycutResult<PathBuf> {
        if fragment_names.is_empty() {
            return Err(EasycutError::job("No fragments to concatenate"));
        }

        let manifest_path = workdir.manifest_path();
        std::fs::write(&manifest_path, build_manifest(fragment_names)).map_err(|e| {
            EasycutError::job(format!(
                "Failed to write concat manifest {}: {e}",
                manifest_path.display()
            ))
        })?;
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        tracing::info!(
            fragments = fragment_names.len(),
            output = %output.display(),
            "Concatenating fragments"
        );
        let invocation =
            EncodeInvocation::new(concat_args(&manifest_path, output)).with_output(output);

        let result = self.backend.run(&invocation, observer, cancel).await;
        match result {
            Ok(()) => {
                observer.on_end().await;
                tracing::info!(output = %output.display(), "Master output written");
                Ok(output.to_path_buf())
            }
            Err(e) => {
                observer.on_error(&e.to_string()).await;
                match e {
                    EasycutError::Job { message } => {
                        Err(EasycutError::job(format!("concatenation: {message}")))
                    }
                    other => Err(other),
                }
            }
        }
    }
}
