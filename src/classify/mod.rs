pub mod pipeline;
pub mod types;

pub use pipeline::ClassifyPipeline;
pub use types::{CLASS_LABELS, NUM_CLASSES};
