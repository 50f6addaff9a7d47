/// 肿瘤类别标签表。
///
/// 顺序必须与模型训练时的输出通道顺序完全一致：
/// 0=Glioma, 1=Meningioma, 2=No Tumor, 3=Pituitary。
/// 调整这里的顺序会让所有预测结果被悄悄贴错标签。
pub const CLASS_LABELS: [&str; 4] = ["Glioma", "Meningioma", "No Tumor", "Pituitary"];

/// 模型输出向量的长度
pub const NUM_CLASSES: usize = CLASS_LABELS.len();
