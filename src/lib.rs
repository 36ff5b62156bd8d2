pub mod classifier;
pub mod device;
pub mod error;
pub mod form;
pub mod labels;
pub mod model;
pub mod runtime;
pub mod ui;

pub use crate::classifier::{EmailClassifier, Prediction, Predictor};
pub use crate::error::{Error, Result};
