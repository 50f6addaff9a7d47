use crate::utils::error::MriError;
use crate::Result;
use axum::body::Bytes;
use base64::Engine;
use image::{DynamicImage, ImageFormat};

/// 上传数据的最大解码体积
const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024; // 50MB

pub struct ImageLoader;

impl ImageLoader {
    /// 从base64字符串解出原始图像字节
    pub fn decode_base64(base64_data: &str) -> Result<Vec<u8>> {
        // 检测并移除可能的数据URL前缀 (data:image/xxx;base64,)
        let base64_clean = if base64_data.starts_with("data:") {
            base64_data.split(',').nth(1).unwrap_or(base64_data)
        } else {
            base64_data
        };

        let image_bytes = base64::engine::general_purpose::STANDARD
            .decode(base64_clean)
            .map_err(MriError::Base64)?;

        if image_bytes.len() > MAX_IMAGE_BYTES {
            return Err(MriError::FileTooLarge(image_bytes.len(), MAX_IMAGE_BYTES));
        }

        Ok(image_bytes)
    }

    /// 从base64字符串加载图像
    pub fn from_base64(base64_data: &str) -> Result<DynamicImage> {
        let image_bytes = Self::decode_base64(base64_data)?;

        let image = image::load_from_memory(&image_bytes).map_err(MriError::ImageDecode)?;

        Ok(image)
    }

    /// 从字节流加载图像
    pub fn from_bytes(bytes: Bytes) -> Result<DynamicImage> {
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(MriError::FileTooLarge(bytes.len(), MAX_IMAGE_BYTES));
        }

        let image = image::load_from_memory(&bytes).map_err(MriError::ImageDecode)?;

        Ok(image)
    }

    /// 从文件路径加载图像
    pub fn from_path(path: &str) -> Result<DynamicImage> {
        let image = image::open(path).map_err(MriError::ImageDecode)?;

        Ok(image)
    }

    /// 检测图像格式
    pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
        image::guess_format(bytes).ok()
    }
}
