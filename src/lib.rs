pub mod classify;
pub mod config;
pub mod image;
pub mod models;
pub mod utils;
pub mod web;

// 重新导出主要类型
pub use config::Config;
pub use crate::image::postprocessing::PredictionResult;
pub use utils::error::MriError;

pub type Result<T> = std::result::Result<T, MriError>;
