//! Static mapping from classifier class index to human-readable label

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Ordered index → label mapping, immutable once built.
///
/// Classifier label identifiers carry the class index as a `_<index>` suffix
/// (`LABEL_0`, `LABEL_1`, ...). [`LabelTable::resolve`] validates that format
/// and reports violations as classifier errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    /// Build a table; index `i` maps to `labels[i]`
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(Error::config("label table must contain at least one label"));
        }
        if let Some(blank) = labels.iter().position(|l| l.trim().is_empty()) {
            return Err(Error::config(format!("label at index {} is blank", blank)));
        }
        Ok(Self { labels })
    }

    /// Label for a class index
    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Resolve a classifier label identifier such as `LABEL_1` to its label
    pub fn resolve(&self, identifier: &str) -> Result<&str> {
        let index = parse_class_index(identifier)?;
        self.get(index).ok_or_else(|| {
            Error::classifier(format!(
                "class index {} from label '{}' is outside the label table (size {})",
                index,
                identifier,
                self.labels.len()
            ))
        })
    }

    /// Whether `label` is one of the table's values
    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl Default for LabelTable {
    fn default() -> Self {
        Self {
            labels: vec!["NON-HATE".to_string(), "HATE".to_string()],
        }
    }
}

impl TryFrom<Vec<String>> for LabelTable {
    type Error = Error;

    fn try_from(labels: Vec<String>) -> Result<Self> {
        Self::new(labels)
    }
}

impl From<LabelTable> for Vec<String> {
    fn from(table: LabelTable) -> Self {
        table.labels
    }
}

/// Extract the class index from a `<prefix>_<index>` label identifier
pub fn parse_class_index(identifier: &str) -> Result<usize> {
    let (_, suffix) = identifier.rsplit_once('_').ok_or_else(|| {
        Error::classifier(format!(
            "label '{}' does not follow the '<prefix>_<index>' convention",
            identifier
        ))
    })?;

    suffix.parse::<usize>().map_err(|_| {
        Error::classifier(format!(
            "label '{}' has non-numeric class index '{}'",
            identifier, suffix
        ))
    })
}
