use crate::Result;
use image::{imageops::FilterType, DynamicImage};
use ndarray::{Array3, Array4, Axis};

/// 模型输入边长
pub const INPUT_SIZE: u32 = 224;

pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// 把解码后的图像转换成模型输入张量，形状固定为 (1, 224, 224, 3)。
    ///
    /// 流程固定不可配置：
    /// 1. 缩放到 224x224（不保留宽高比）
    /// 2. 转RGB并展开为 HWC f32 数组
    /// 3. 除以255归一化到 [0,1]（与训练侧的预处理保持一致）
    /// 4. 追加批维度
    pub fn to_model_input(image: &DynamicImage) -> Result<Array4<f32>> {
        let resized = image.resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);
        let rgb_image = resized.to_rgb8();

        let data: Vec<f32> = rgb_image
            .into_raw()
            .into_iter()
            .map(|v| v as f32 / 255.0)
            .collect();

        let array = Array3::from_shape_vec((INPUT_SIZE as usize, INPUT_SIZE as usize, 3), data)
            .map_err(|e| crate::MriError::Internal(format!("Tensor shape error: {}", e)))?;

        // (224, 224, 3) -> (1, 224, 224, 3)
        Ok(array.insert_axis(Axis(0)))
    }
}
