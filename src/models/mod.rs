pub mod classifier;

pub use classifier::{OnnxClassifier, TumorModel};
