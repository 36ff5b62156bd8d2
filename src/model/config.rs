use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};

/// Fields of a Hugging Face `config.json` needed before the backbone config
/// is parsed.
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
pub struct CheckpointConfig {
    #[serde(default)]
    pub model_type: Option<String>,
    #[serde(default)]
    pub architectures: Vec<String>,
    #[serde(default)]
    pub id2label: HashMap<String, String>,
    #[serde(default)]
    pub num_labels: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    ModernBert,
    Bert,
}

impl Architecture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ModernBert => "modernbert",
            Self::Bert => "bert",
        }
    }
}

impl CheckpointConfig {
    /// Reads `config.json`, returning the parsed header and the raw text so
    /// the architecture-specific config can be parsed from the same bytes.
    pub fn read(path: &Path) -> Result<(Self, String)> {
        if !path.exists() {
            return Err(Error::MissingFile(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&raw)?;
        Ok((config, raw))
    }

    pub fn architecture(&self) -> Result<Architecture> {
        let name = match (&self.model_type, self.architectures.first()) {
            (Some(model_type), _) => model_type.to_lowercase(),
            (None, Some(arch)) => arch.to_lowercase(),
            (None, None) => {
                return Err(Error::InvalidConfig(
                    "neither model_type nor architectures is set".into(),
                ))
            }
        };
        if name.starts_with("modernbert") {
            Ok(Architecture::ModernBert)
        } else if name == "bert" || name.starts_with("bertfor") || name == "bertmodel" {
            Ok(Architecture::Bert)
        } else {
            Err(Error::UnsupportedArchitecture(name))
        }
    }

    /// Number of output classes of the classification head.
    pub fn num_labels(&self) -> Result<usize> {
        match (self.id2label.len(), self.num_labels) {
            (0, None) => Err(Error::InvalidConfig(
                "config has neither id2label nor num_labels".into(),
            )),
            (0, Some(n)) => Ok(n),
            (n, _) => Ok(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn parse(json: &str) -> CheckpointConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn detects_architecture_from_model_type() {
        let config = parse(r#"{"model_type": "bert", "architectures": ["Whatever"]}"#);
        assert_eq!(config.architecture().unwrap(), Architecture::Bert);

        let config = parse(r#"{"model_type": "modernbert"}"#);
        assert_eq!(config.architecture().unwrap(), Architecture::ModernBert);
    }

    #[test]
    fn falls_back_to_architectures_list() {
        let config = parse(r#"{"architectures": ["BertForSequenceClassification"]}"#);
        assert_eq!(config.architecture().unwrap(), Architecture::Bert);

        let config = parse(r#"{"architectures": ["ModernBertForSequenceClassification"]}"#);
        assert_eq!(config.architecture().unwrap(), Architecture::ModernBert);
    }

    #[test]
    fn rejects_unknown_architectures() {
        let config = parse(r#"{"model_type": "roberta"}"#);
        assert_matches!(
            config.architecture(),
            Err(Error::UnsupportedArchitecture(name)) if name == "roberta"
        );
        assert_matches!(parse("{}").architecture(), Err(Error::InvalidConfig(_)));
    }

    #[test]
    fn num_labels_prefers_id2label() {
        let config = parse(r#"{"id2label": {"0": "a", "1": "b"}, "num_labels": 5}"#);
        assert_eq!(config.num_labels().unwrap(), 2);

        let config = parse(r#"{"num_labels": 9}"#);
        assert_eq!(config.num_labels().unwrap(), 9);

        assert_matches!(parse("{}").num_labels(), Err(Error::InvalidConfig(_)));
    }

    #[test]
    fn read_rejects_malformed_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{\"model_type\": ").unwrap();
        assert_matches!(CheckpointConfig::read(&path), Err(Error::Serialization(_)));
    }

    #[test]
    fn read_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        assert_matches!(CheckpointConfig::read(&path), Err(Error::MissingFile(p)) if p == path);
    }
}
