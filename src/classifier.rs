use std::fmt::Display;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokenizers::{Encoding, Tokenizer};

use crate::device::{device_name, Device};
use crate::error::{Error, Result};
use crate::labels::{LabelMap, LabelSource};
use crate::model::{Checkpoint, SequenceClassifier};

pub const DEFAULT_MAX_LENGTH: usize = 512;

/// Anything that can turn an email into a [`Prediction`].
pub trait Predictor {
    /// Names of the classes `predict` can return.
    fn labels(&self) -> &LabelMap;

    fn predict(&self, subject: &str, body: &str) -> Result<Prediction>;
}

/// A loaded checkpoint plus the label mapping used to name its classes.
///
/// Built once at startup and borrowed for the rest of the process.
pub struct EmailClassifier {
    model: SequenceClassifier,
    tokenizer: Tokenizer,
    labels: LabelMap,
    label_source: LabelSource,
    device: Device,
}

impl EmailClassifier {
    pub fn load<P: AsRef<Path>, D: AsRef<Path>>(
        path: P,
        dataset: D,
        device: Device,
        max_length: usize,
    ) -> Result<Self> {
        let checkpoint = Checkpoint::load(path, &device, max_length)?;
        let id2label = Some(&checkpoint.config.id2label).filter(|m| !m.is_empty());
        let (labels, label_source) = LabelMap::resolve(dataset.as_ref(), id2label);
        if labels.len() != checkpoint.num_labels {
            tracing::warn!(
                labels = labels.len(),
                classes = checkpoint.num_labels,
                "label mapping size differs from the classification head"
            );
        }
        Ok(Self::new(
            checkpoint.model,
            checkpoint.tokenizer,
            labels,
            label_source,
            device,
        ))
    }

    pub fn new(
        model: SequenceClassifier,
        tokenizer: Tokenizer,
        labels: LabelMap,
        label_source: LabelSource,
        device: Device,
    ) -> Self {
        Self {
            model,
            tokenizer,
            labels,
            label_source,
            device,
        }
    }

    pub fn label_source(&self) -> &LabelSource {
        &self.label_source
    }

    pub fn device_name(&self) -> &'static str {
        device_name(&self.device)
    }

    /// Tokenizes the composed email with the checkpoint's truncation.
    pub fn encode(&self, subject: &str, body: &str) -> Result<Encoding> {
        Ok(self.tokenizer.encode(compose_text(subject, body), true)?)
    }
}

impl Predictor for EmailClassifier {
    fn labels(&self) -> &LabelMap {
        &self.labels
    }

    fn predict(&self, subject: &str, body: &str) -> Result<Prediction> {
        let encoding = self.encode(subject, body)?;
        let logits = self.model.logits(
            encoding.get_ids(),
            encoding.get_type_ids(),
            encoding.get_attention_mask(),
            &self.device,
        )?;
        let prediction = Prediction::from_logits(logits, &self.labels)?;
        tracing::debug!(
            tokens = encoding.get_ids().len(),
            label = %prediction.label,
            confidence = prediction.confidence,
            "classified email"
        );
        Ok(prediction)
    }
}

/// The text the model was fine-tuned on: subject, one space, body.
pub fn compose_text(subject: &str, body: &str) -> String {
    let mut text = String::with_capacity(subject.len() + 1 + body.len());
    text.push_str(subject);
    text.push(' ');
    text.push_str(body);
    text
}

pub fn softmax(logits: &[f32]) -> Result<Vec<f32>> {
    let max = logits
        .iter()
        .copied()
        .max_by(|a, b| a.total_cmp(b))
        .ok_or(Error::EmptyLogits)?;
    let exps: Vec<f32> = logits.iter().map(|x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    Ok(exps.into_iter().map(|e| e / sum).collect())
}

/// Index of the highest probability; the first one wins a tie.
pub fn argmax(probabilities: &[f32]) -> Option<usize> {
    probabilities
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &p)| match best {
            Some((_, bp)) if bp >= p => best,
            _ => Some((i, p)),
        })
        .map(|(i, _)| i)
}

#[derive(Clone, Deserialize, Serialize, Debug, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub label_id: usize,
    pub confidence: f32,
    #[serde(skip)]
    pub probabilities: Vec<f32>,
}

impl Prediction {
    pub fn from_logits(logits: Vec<f32>, labels: &LabelMap) -> Result<Self> {
        let probabilities = softmax(&logits)?;
        let label_id = argmax(&probabilities).ok_or(Error::EmptyLogits)?;
        let label = labels
            .get(label_id)
            .ok_or(Error::UnknownLabel(label_id))?
            .to_string();
        Ok(Self {
            label,
            label_id,
            confidence: probabilities[label_id],
            probabilities,
        })
    }

    /// All classes with a known label, most probable first.
    pub fn ranked<'a>(&self, labels: &'a LabelMap) -> Vec<(&'a str, f32)> {
        let mut ranked: Vec<_> = self
            .probabilities
            .iter()
            .enumerate()
            .filter_map(|(i, &p)| labels.get(i).map(|label| (label, p)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }
}

impl Display for Prediction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Classification: {}\nConfidence: {:.4}",
            self.label, self.confidence
        )
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct EmailInput {
    subject: String,
    body: String,
}

/// Classifies one `{"subject", "body"}` JSON line for the `classify` command.
///
/// Blank lines yield `None`. Malformed rows, rows with nothing to classify and
/// prediction failures become `{"error": ...}` objects.
pub fn classify_line<P: Predictor + ?Sized>(
    predictor: &P,
    line: &str,
    line_no: usize,
) -> Option<serde_json::Value> {
    if line.trim().is_empty() {
        return None;
    }
    let row = serde_json::from_str::<EmailInput>(line)
        .map_err(|e| e.to_string())
        .and_then(|input| {
            if input.subject.trim().is_empty() && input.body.trim().is_empty() {
                Err("subject and body are both empty".to_string())
            } else {
                predictor
                    .predict(&input.subject, &input.body)
                    .map_err(|e| e.to_string())
            }
        })
        .and_then(|prediction| serde_json::to_value(&prediction).map_err(|e| e.to_string()));
    Some(match row {
        Ok(value) => value,
        Err(error) => serde_json::json!({ "error": format!("line {line_no}: {error}") }),
    })
}
