//! Checkpoint loading and the per-architecture forward pass.

pub mod bert;
pub mod config;

use std::path::{Path, PathBuf};

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::Config as BertConfig;
use candle_transformers::models::modernbert::{
    Config as ModernBertConfig, ModernBertForSequenceClassification,
};
use tokenizers::{Tokenizer, TruncationParams};

use self::bert::BertForSequenceClassification;
pub use self::config::{Architecture, CheckpointConfig};
use crate::error::{Error, Result};

pub const CONFIG_FILE: &str = "config.json";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const WEIGHTS_FILE: &str = "model.safetensors";

pub enum SequenceClassifier {
    ModernBert(ModernBertForSequenceClassification),
    Bert(BertForSequenceClassification),
}

impl SequenceClassifier {
    /// Per-class logits for a single tokenized sequence.
    pub fn logits(
        &self,
        input_ids: &[u32],
        type_ids: &[u32],
        attention_mask: &[u32],
        device: &Device,
    ) -> Result<Vec<f32>> {
        let ids = Tensor::new(input_ids, device)?.unsqueeze(0)?;
        let mask = Tensor::new(attention_mask, device)?.unsqueeze(0)?;
        let (xs, sigmoid_head) = match self {
            Self::ModernBert(model) => (model.forward(&ids, &mask)?, true),
            Self::Bert(model) => {
                let type_ids = Tensor::new(type_ids, device)?.unsqueeze(0)?;
                (model.forward(&ids, &type_ids, &mask)?, false)
            }
        };
        let mut rows: Vec<Vec<f32>> = xs.to_dtype(DType::F32)?.to_vec2()?;
        let row = rows.pop().ok_or(Error::EmptyLogits)?;
        // The ModernBERT head ends in a sigmoid.
        Ok(if sigmoid_head {
            row.into_iter().map(logit).collect()
        } else {
            row
        })
    }
}

const SIGMOID_EPS: f32 = 1e-7;

/// Inverse of the sigmoid, clamped so saturated outputs stay finite.
pub fn logit(p: f32) -> f32 {
    let p = p.clamp(SIGMOID_EPS, 1.0 - SIGMOID_EPS);
    p.ln() - (1.0 - p).ln()
}

/// A checkpoint directory loaded into memory.
pub struct Checkpoint {
    pub architecture: Architecture,
    pub config: CheckpointConfig,
    pub model: SequenceClassifier,
    pub tokenizer: Tokenizer,
    pub num_labels: usize,
}

impl Checkpoint {
    pub fn load<P: AsRef<Path>>(path: P, device: &Device, max_length: usize) -> Result<Self> {
        let mut dir = PathBuf::from(path.as_ref());

        dir.push(CONFIG_FILE);
        let (config, raw_config) = CheckpointConfig::read(&dir)?;
        dir.pop();
        let architecture = config.architecture()?;
        let num_labels = config.num_labels()?;

        dir.push(TOKENIZER_FILE);
        let tokenizer = load_tokenizer(&dir, max_length)?;
        dir.pop();

        dir.push(WEIGHTS_FILE);
        if !dir.exists() {
            return Err(Error::MissingFile(dir));
        }
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[&dir], DType::F32, device) }?;
        dir.pop();

        let model = match architecture {
            Architecture::ModernBert => {
                let backbone: ModernBertConfig = serde_json::from_str(&raw_config)?;
                SequenceClassifier::ModernBert(ModernBertForSequenceClassification::load(
                    vb, &backbone,
                )?)
            }
            Architecture::Bert => {
                let backbone: BertConfig = serde_json::from_str(&raw_config)?;
                SequenceClassifier::Bert(BertForSequenceClassification::load(
                    vb, &backbone, num_labels,
                )?)
            }
        };

        tracing::info!(
            checkpoint = %dir.display(),
            architecture = architecture.as_str(),
            num_labels,
            max_length,
            "loaded checkpoint"
        );
        Ok(Self {
            architecture,
            config,
            model,
            tokenizer,
            num_labels,
        })
    }
}

/// Loads `tokenizer.json` configured for one unpadded sequence truncated
/// on the right at `max_length` tokens.
pub fn load_tokenizer(path: &Path, max_length: usize) -> Result<Tokenizer> {
    if !path.exists() {
        return Err(Error::MissingFile(path.to_path_buf()));
    }
    let mut tokenizer = Tokenizer::from_file(path)?;
    tokenizer.with_padding(None).with_truncation(Some(TruncationParams {
        max_length,
        ..Default::default()
    }))?;
    tracing::debug!(tokenizer = %path.display(), max_length, "loaded tokenizer");
    Ok(tokenizer)
}
