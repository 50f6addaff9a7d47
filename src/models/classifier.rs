use crate::utils::error::MriError;
use crate::{Config, Result};
use ndarray::{Array4, Axis};
use ort::{
    inputs,
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use parking_lot::Mutex;

/// 推理边界。
///
/// 实现者拿到形状 (1, 224, 224, 3) 的输入张量，返回与类别表
/// 位置对齐的原始得分向量。任何运行期失败都必须以错误返回，
/// 不允许让请求处理器崩溃。
pub trait TumorModel: Send + Sync {
    fn predict(&self, input: Array4<f32>) -> Result<Vec<f32>>;
}

/// ONNX Runtime实现
pub struct OnnxClassifier {
    session: Mutex<Session>,
    input_name: String,
    output_name: String, // 动态发现的输出名称
}

impl OnnxClassifier {
    pub fn new(config: &Config) -> Result<Self> {
        let model_path = config.model_path();

        if !model_path.exists() {
            return Err(MriError::ModelLoad(format!(
                "Classification model not found: {}",
                model_path.display()
            )));
        }

        tracing::info!("Loading classification model from: {}", model_path.display());

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(config.onnx_config.intra_threads)?
            .commit_from_file(&model_path)?;

        // 动态发现输入输出名称，避免把导出时的命名写死
        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| MriError::ModelLoad("Classification model has no inputs".to_string()))?;

        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| MriError::ModelLoad("Classification model has no outputs".to_string()))?;

        tracing::info!(
            "Classification model ready: input='{}', output='{}'",
            input_name,
            output_name
        );
        for (i, output) in session.outputs.iter().enumerate() {
            tracing::debug!("Classification output[{}]: '{}'", i, output.name);
        }

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }
}

impl TumorModel for OnnxClassifier {
    fn predict(&self, input: Array4<f32>) -> Result<Vec<f32>> {
        let input_tensor = Tensor::from_array(input)?;

        let predictions = {
            let mut session = self.session.lock();
            let outputs = session.run(inputs![self.input_name.as_str() => input_tensor])?;

            // 使用动态发现的输出名称
            match outputs.get(&self.output_name) {
                Some(output) => output.try_extract_array::<f32>()?.into_owned(),
                None => {
                    let available_outputs: Vec<String> =
                        outputs.keys().map(|s| s.to_string()).collect();
                    return Err(MriError::Inference(format!(
                        "Classification output '{}' not found. Available outputs: {:?}",
                        self.output_name, available_outputs
                    )));
                }
            }
        };

        // 期望形状 (1, num_classes)
        let shape = predictions.shape();
        if shape.len() != 2 || shape[0] != 1 {
            return Err(MriError::Inference(format!(
                "Expected classification output of shape (1, num_classes), got {:?}",
                shape
            )));
        }

        Ok(predictions.index_axis(Axis(0), 0).iter().copied().collect())
    }
}
