use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("tokenizer error: {0}")]
    Tokenizer(#[from] tokenizers::Error),
    #[error("candle error: {0}")]
    Candle(#[from] candle_core::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("checkpoint file not found: {}", .0.display())]
    MissingFile(PathBuf),
    #[error("unsupported model architecture: {0}")]
    UnsupportedArchitecture(String),
    #[error("invalid checkpoint config: {0}")]
    InvalidConfig(String),
    #[error("cannot read dataset {}: {source}", .path.display())]
    Dataset {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("dataset {} contains no labels", .0.display())]
    EmptyDataset(PathBuf),
    #[error("dataset {}:{line}: {source}", .path.display())]
    DatasetLine {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid label map: {0}")]
    InvalidLabelMap(String),
    #[error("predicted class {0} has no label")]
    UnknownLabel(usize),
    #[error("model returned no class scores")]
    EmptyLogits,
    #[error("cannot use {device} device: {source}")]
    Device {
        device: &'static str,
        #[source]
        source: candle_core::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
