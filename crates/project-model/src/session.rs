//! Render session configuration.
//!
//! A [`RenderSessionConfig`] is the complete, immutable input of one render:
//! scheme, ordered work items, and output base path. The controller takes
//! it by value when a render starts, so nothing the host does afterwards
//! can change what the running render sees.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::scheme::Scheme;
use crate::work_item::{WorkItem, WorkItemRegistry};

/// Everything a render session needs, accepted atomically at session start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderSessionConfig {
    /// Encode parameters applied to every fragment.
    #[serde(default)]
    pub scheme: Scheme,

    /// Ordered work items.
    #[serde(default)]
    pub work_items: WorkItemRegistry,

    /// Master output base path, without extension. `None` uses
    /// `<workdir>/masterOutput`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

impl RenderSessionConfig {
    pub fn builder() -> RenderSessionConfigBuilder {
        RenderSessionConfigBuilder::default()
    }

    /// Load a session file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ModelError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|e| ModelError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.scheme.validate()?;
        Ok(config)
    }

    /// Save as a pretty-printed session file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ModelError::IoError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| ModelError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        std::fs::write(path, json).map_err(|e| ModelError::IoError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Final output path: output base (or `default_base`) plus the scheme's
    /// container extension.
    pub fn output_path(&self, default_base: &Path) -> PathBuf {
        let base = self.output.as_deref().unwrap_or(default_base);
        let mut raw = base.as_os_str().to_os_string();
        raw.push(self.scheme.file_suffix());
        PathBuf::from(raw)
    }
}

/// Builder for [`RenderSessionConfig`].
#[derive(Debug, Clone, Default)]
pub struct RenderSessionConfigBuilder {
    scheme: Scheme,
    work_items: WorkItemRegistry,
    output: Option<PathBuf>,
}

impl RenderSessionConfigBuilder {
    pub fn scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn work_item(mut self, item: WorkItem) -> Self {
        self.work_items.push(item);
        self
    }

    pub fn work_items(mut self, items: impl Into<WorkItemRegistry>) -> Self {
        self.work_items = items.into();
        self
    }

    pub fn output(mut self, base: impl Into<PathBuf>) -> Self {
        self.output = Some(base.into());
        self
    }

    /// Validate the scheme and build the config.
    ///
    /// An empty work-item list is accepted here; the render itself rejects it.
    pub fn build(self) -> Result<RenderSessionConfig, ModelError> {
        self.scheme.validate()?;
        Ok(RenderSessionConfig {
            scheme: self.scheme,
            work_items: self.work_items,
            output: self.output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_collects_items_in_order() {
        let config = RenderSessionConfig::builder()
            .work_item(WorkItem::new("a.mp4"))
            .work_item(WorkItem::new("b.mp4"))
            .output("/tmp/out/final")
            .build()
            .unwrap();

        assert_eq!(config.work_items.len(), 2);
        assert_eq!(config.work_items.get(1).unwrap().file, PathBuf::from("b.mp4"));
        assert_eq!(
            config.output_path(Path::new("/unused")),
            PathBuf::from("/tmp/out/final.mp4")
        );
    }

    #[test]
    fn test_builder_rejects_invalid_scheme() {
        let scheme = Scheme {
            size: "wide".to_string(),
            ..Scheme::default()
        };
        assert!(RenderSessionConfig::builder().scheme(scheme).build().is_err());
    }

    #[test]
    fn test_output_path_defaults_to_base() {
        let config = RenderSessionConfig::default();
        assert_eq!(
            config.output_path(Path::new("/wd/masterOutput")),
            PathBuf::from("/wd/masterOutput.mp4")
        );
    }

    #[test]
    fn test_session_file_roundtrip() {
        let dir = std::env::temp_dir().join("easycut_test_session_file");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("session.json");

        let config = RenderSessionConfig::builder()
            .work_item(WorkItem::new("clip.mov"))
            .build()
            .unwrap();
        config.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("workItems"));

        let loaded = RenderSessionConfig::load(&path).unwrap();
        assert_eq!(loaded, config);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_reports_missing_file() {
        let err = RenderSessionConfig::load("/nonexistent/easycut/session.json").unwrap_err();
        assert!(matches!(err, ModelError::IoError { .. }));
    }
}
