use crate::{
    image::{ImageLoader, ImagePreprocessor, ResultFormatter},
    models::TumorModel,
    PredictionResult, Result,
};
use axum::body::Bytes;
use std::sync::Arc;
use std::time::Instant;

/// 分类处理流水线：解码 → 预处理 → 推理 → 结果排序
pub struct ClassifyPipeline;

impl ClassifyPipeline {
    /// 处理字节流图像
    pub fn process_bytes(
        model: &Arc<dyn TumorModel>,
        bytes: Bytes,
        image_path: &str,
    ) -> Result<PredictionResult> {
        let start_time = Instant::now();

        // 加载图像
        let image = ImageLoader::from_bytes(bytes)?;

        Self::process_image(model, &image, image_path, start_time)
    }

    /// 处理base64图像
    pub fn process_base64(
        model: &Arc<dyn TumorModel>,
        base64_data: &str,
        image_path: &str,
    ) -> Result<PredictionResult> {
        let start_time = Instant::now();

        let image = ImageLoader::from_base64(base64_data)?;

        Self::process_image(model, &image, image_path, start_time)
    }

    /// 核心流水线
    fn process_image(
        model: &Arc<dyn TumorModel>,
        image: &image::DynamicImage,
        image_path: &str,
        start_time: Instant,
    ) -> Result<PredictionResult> {
        // 固定预处理：224x224、[0,1]归一化、批维度
        let input_tensor = ImagePreprocessor::to_model_input(image)?;

        // 推理（对调用方来说是不透明的黑盒）
        let scores = model.predict(input_tensor)?;

        let total_time = start_time.elapsed();

        // 结果排序与置信度提取
        let result = ResultFormatter::format_result(&scores, image_path, total_time.as_secs_f32())?;

        tracing::info!(
            "Classification completed: predicted={}, confidence={:.4}, total_time={:.3}s",
            result.predicted,
            result.confidence,
            total_time.as_secs_f32()
        );

        Ok(result)
    }
}
