//! Work items: source media plus per-item edit properties, and the ordered
//! registry that the render pipeline walks.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// One source media reference and its edit properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Source media file.
    pub file: PathBuf,

    /// Trim, filters, and advanced multi-input settings.
    #[serde(default)]
    pub properties: WorkItemProperties,
}

/// Per-item edit properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItemProperties {
    /// Output duration cap in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    /// Input seek offset in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seek: Option<f64>,

    /// Video filter chain, applied in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterSpec>,

    /// Multi-input / complex-graph settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advanced: Option<AdvancedOptions>,

    /// Filter graph used verbatim in complex mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complex_filter: Option<String>,
}

/// Advanced rendering directives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvancedOptions {
    /// Extra inputs added ahead of the item's own file.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<PathBuf>,

    /// Switch to complex mode: the scheme is not applied and
    /// `complexFilter` is used as the filter graph.
    #[serde(default)]
    pub complex: bool,
}

/// A video filter, either a ready expression (`"hflip"`,
/// `"scale=640:-2"`) or a filter name with options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterSpec {
    Expr(String),
    Named {
        filter: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        options: Option<FilterOptions>,
    },
}

/// Options of a named filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterOptions {
    /// Key/value options, serialized as `key=value` joined by `:`.
    Map(BTreeMap<String, serde_json::Value>),
    /// Pre-formatted option string, e.g. `"640:480"`.
    Raw(String),
}

impl WorkItem {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            properties: WorkItemProperties::default(),
        }
    }

    pub fn with_properties(file: impl Into<PathBuf>, properties: WorkItemProperties) -> Self {
        Self {
            file: file.into(),
            properties,
        }
    }
}

impl WorkItemProperties {
    /// Duration cap, ignoring zero and negative values.
    pub fn duration_cap(&self) -> Option<f64> {
        self.duration.filter(|d| d.is_finite() && *d > 0.0)
    }

    /// Seek offset, ignoring zero and negative values.
    pub fn seek_offset(&self) -> Option<f64> {
        self.seek.filter(|s| s.is_finite() && *s > 0.0)
    }

    /// Whether the item renders in complex mode.
    pub fn is_complex(&self) -> bool {
        self.advanced.as_ref().is_some_and(|a| a.complex)
    }

    /// Extra inputs from the advanced block.
    pub fn extra_inputs(&self) -> &[PathBuf] {
        self.advanced
            .as_ref()
            .map(|a| a.inputs.as_slice())
            .unwrap_or(&[])
    }
}

impl FilterSpec {
    /// Filter given as a ready expression.
    pub fn expr(expression: impl Into<String>) -> Self {
        FilterSpec::Expr(expression.into())
    }

    /// Named filter with key/value options.
    pub fn with_options<K, V>(filter: impl Into<String>, options: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<serde_json::Value>,
    {
        let map = options
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect::<BTreeMap<_, _>>();
        FilterSpec::Named {
            filter: filter.into(),
            options: Some(FilterOptions::Map(map)),
        }
    }

    /// Render the filter as an encoder filter expression.
    pub fn to_expression(&self) -> Result<String, ModelError> {
        match self {
            FilterSpec::Expr(expr) => {
                let expr = expr.trim();
                if expr.is_empty() {
                    return Err(ModelError::InvalidFilter {
                        message: "empty filter expression".to_string(),
                    });
                }
                Ok(expr.to_string())
            }
            FilterSpec::Named { filter, options } => {
                let name = filter.trim();
                if name.is_empty() || name.contains(|c: char| c.is_whitespace() || c == '=') {
                    return Err(ModelError::InvalidFilter {
                        message: format!("invalid filter name '{filter}'"),
                    });
                }
                match options {
                    None => Ok(name.to_string()),
                    Some(FilterOptions::Raw(raw)) if raw.trim().is_empty() => Ok(name.to_string()),
                    Some(FilterOptions::Raw(raw)) => Ok(format!("{name}={}", raw.trim())),
                    Some(FilterOptions::Map(map)) if map.is_empty() => Ok(name.to_string()),
                    Some(FilterOptions::Map(map)) => {
                        let mut pairs = Vec::with_capacity(map.len());
                        for (key, value) in map {
                            if key.trim().is_empty() {
                                return Err(ModelError::InvalidFilter {
                                    message: format!("filter '{name}' has an empty option key"),
                                });
                            }
                            pairs.push(format!("{key}={}", option_value(value)));
                        }
                        Ok(format!("{name}={}", pairs.join(":")))
                    }
                }
            }
        }
    }
}

fn option_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Render a list of filters into encoder expressions, in order.
pub fn filter_chain(filters: &[FilterSpec]) -> Result<Vec<String>, ModelError> {
    filters.iter().map(FilterSpec::to_expression).collect()
}

/// Ordered collection of work items.
///
/// Order is playback order: item `i` renders to fragment `master<i>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkItemRegistry {
    items: Vec<WorkItem>,
}

impl WorkItemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: WorkItem) {
        self.items.push(item);
    }

    pub fn get(&self, index: usize) -> Option<&WorkItem> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, WorkItem> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[WorkItem] {
        &self.items
    }

    /// Append a filter to the item at `index`.
    pub fn add_filter(&mut self, index: usize, filter: FilterSpec) -> Result<(), ModelError> {
        let len = self.items.len();
        let item = self
            .items
            .get_mut(index)
            .ok_or(ModelError::IndexOutOfRange { index, len })?;
        item.properties.filters.push(filter);
        Ok(())
    }
}

impl From<Vec<WorkItem>> for WorkItemRegistry {
    fn from(items: Vec<WorkItem>) -> Self {
        Self { items }
    }
}

impl FromIterator<WorkItem> for WorkItemRegistry {
    fn from_iter<T: IntoIterator<Item = WorkItem>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a WorkItemRegistry {
    type Item = &'a WorkItem;
    type IntoIter = std::slice::Iter<'a, WorkItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
