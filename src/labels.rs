//! Class index to label mapping.
//!
//! The training run assigned class indices by sorting the distinct labels of
//! the training dataset, so the mapping is rebuilt the same way at startup.
//! When the dataset is unavailable the checkpoint's own `id2label` is used if
//! it carries real names, and the table the model was trained with otherwise.

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Labels of the shipped checkpoint, in class index order.
pub const BUILTIN_LABELS: [&str; 9] = [
    "abuse_of_dominance",
    "anti_competitive_merger",
    "bid_rigging",
    "clean",
    "customer_sharing",
    "exclusive_contracts",
    "market_allocation",
    "other_competition_violation",
    "price_fixing",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    labels: Vec<String>,
}

/// Where a resolved [`LabelMap`] came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelSource {
    Dataset,
    /// Dataset failed to load; the message is kept for display.
    Checkpoint { dataset_error: String },
    Builtin { dataset_error: String },
}

impl LabelSource {
    pub fn dataset_error(&self) -> Option<&str> {
        match self {
            Self::Dataset => None,
            Self::Checkpoint { dataset_error } | Self::Builtin { dataset_error } => {
                Some(dataset_error.as_str())
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dataset => "dataset",
            Self::Checkpoint { .. } => "checkpoint",
            Self::Builtin { .. } => "builtin",
        }
    }
}

#[derive(Deserialize)]
struct LabelledRecord {
    label: String,
}

impl LabelMap {
    /// Scan a JSON-Lines training file and index its sorted distinct labels.
    pub fn from_dataset<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let unreadable = |source| Error::Dataset {
            path: path.to_path_buf(),
            source,
        };
        let reader = BufReader::new(File::open(path).map_err(unreadable)?);

        let mut distinct = BTreeSet::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(unreadable)?;
            if line.trim().is_empty() {
                continue;
            }
            let record: LabelledRecord =
                serde_json::from_str(&line).map_err(|source| Error::DatasetLine {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    source,
                })?;
            distinct.insert(record.label);
        }

        if distinct.is_empty() {
            return Err(Error::EmptyDataset(path.to_path_buf()));
        }
        Ok(Self {
            labels: distinct.into_iter().collect(),
        })
    }

    pub fn builtin() -> Self {
        Self {
            labels: BUILTIN_LABELS.iter().map(|l| l.to_string()).collect(),
        }
    }

    /// Build from a checkpoint `id2label` object.
    ///
    /// Fails when the keys are not exactly `0..n` or when the names are the
    /// `LABEL_<n>` placeholders written by untuned configs.
    pub fn from_id2label(id2label: &HashMap<String, String>) -> Result<Self> {
        if id2label.is_empty() {
            return Err(Error::InvalidLabelMap("id2label is empty".into()));
        }
        let mut indexed = Vec::with_capacity(id2label.len());
        for (key, label) in id2label {
            let idx: usize = key
                .parse()
                .map_err(|_| Error::InvalidLabelMap(format!("non-numeric class index {key:?}")))?;
            if is_placeholder(label) {
                return Err(Error::InvalidLabelMap(format!(
                    "placeholder label {label:?}"
                )));
            }
            indexed.push((idx, label.clone()));
        }
        indexed.sort_by_key(|(idx, _)| *idx);
        if indexed.iter().enumerate().any(|(pos, (idx, _))| pos != *idx) {
            return Err(Error::InvalidLabelMap(
                "class indices are not contiguous from 0".into(),
            ));
        }
        Ok(Self {
            labels: indexed.into_iter().map(|(_, label)| label).collect(),
        })
    }

    /// Dataset first, then the checkpoint's `id2label`, then [`BUILTIN_LABELS`].
    pub fn resolve(
        dataset: &Path,
        checkpoint_id2label: Option<&HashMap<String, String>>,
    ) -> (Self, LabelSource) {
        let dataset_error = match Self::from_dataset(dataset) {
            Ok(map) => {
                tracing::info!(
                    dataset = %dataset.display(),
                    classes = map.len(),
                    "built label mapping from dataset"
                );
                return (map, LabelSource::Dataset);
            }
            Err(e) => e.to_string(),
        };
        tracing::warn!(error = %dataset_error, "could not build label mapping from dataset");

        if let Some(id2label) = checkpoint_id2label {
            match Self::from_id2label(id2label) {
                Ok(map) => {
                    tracing::info!(classes = map.len(), "using checkpoint id2label");
                    return (map, LabelSource::Checkpoint { dataset_error });
                }
                Err(e) => tracing::debug!(error = %e, "checkpoint id2label unusable"),
            }
        }

        tracing::info!("using built-in label table");
        (Self::builtin(), LabelSource::Builtin { dataset_error })
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// `(index, label)` pairs in class order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.labels.iter().map(String::as_str).enumerate()
    }
}

fn is_placeholder(label: &str) -> bool {
    label
        .strip_prefix("LABEL_")
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}
