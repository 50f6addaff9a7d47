use crate::classify::{CLASS_LABELS, NUM_CLASSES};
use crate::{MriError, Result};
use serde::{Deserialize, Serialize};

/// 单个类别的置信度
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassScore {
    /// 类别标签
    pub label: String,
    /// 置信度分数（直接透传模型输出，不做裁剪）
    pub confidence: f32,
}

/// 完整的分类结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    /// 置信度最高的类别
    pub predicted: String,
    /// 最高类别的置信度
    pub confidence: f32,
    /// 全部类别按置信度降序排列
    pub predictions: Vec<ClassScore>,
    /// 展示用的图片路径
    pub image_path: String,
    /// 处理耗时（秒）
    pub processing_time: f32,
    /// 模型信息
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_info: Option<ModelInfo>,
}

/// 模型信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// 模型名称
    pub model_name: String,
    /// 输入张量形状
    pub input_shape: String,
    /// 输入是否归一化到[0,1]
    pub normalized_input: bool,
}

/// 结果格式化器
pub struct ResultFormatter;

impl ResultFormatter {
    /// 把模型的原始得分向量整理成排好序的分类结果。
    ///
    /// 得分与标签按位置配对（索引0=Glioma，1=Meningioma，2=No Tumor，
    /// 3=Pituitary），argmax并列时取最小索引，降序排序使用稳定排序，
    /// 并列项保持类别表原有顺序。
    pub fn format_result(
        scores: &[f32],
        image_path: &str,
        processing_time: f32,
    ) -> Result<PredictionResult> {
        if scores.len() != NUM_CLASSES {
            return Err(MriError::Inference(format!(
                "Expected {} class scores, got {}",
                NUM_CLASSES,
                scores.len()
            )));
        }

        // 按位置配对标签与得分
        let mut ranked: Vec<ClassScore> = CLASS_LABELS
            .iter()
            .zip(scores.iter())
            .map(|(label, &confidence)| ClassScore {
                label: (*label).to_string(),
                confidence,
            })
            .collect();

        // argmax：并列时保留靠前的索引
        let top_index = scores
            .iter()
            .enumerate()
            .fold(0usize, |best, (i, &s)| if s > scores[best] { i } else { best });

        let predicted = CLASS_LABELS[top_index].to_string();
        let confidence = scores[top_index];

        // 稳定降序排序，并列项维持原索引顺序
        ranked.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(PredictionResult {
            predicted,
            confidence,
            predictions: ranked,
            image_path: image_path.to_string(),
            processing_time,
            model_info: Some(ModelInfo {
                model_name: "best_model".to_string(),
                input_shape: "1x224x224x3".to_string(),
                normalized_input: true,
            }),
        })
    }
}
