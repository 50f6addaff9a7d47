use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MriError {
    #[error("No file uploaded")]
    NoFile,

    #[error("No file selected")]
    EmptyFilename,

    #[error("Invalid file type: {0}")]
    UnsupportedExtension(String),

    #[error("Image decode error: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File too large: {0} bytes, max allowed: {1} bytes")]
    FileTooLarge(usize, usize),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("ORT error: {0}")]
    Ort(#[from] ort::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl MriError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 请求边界错误：在预处理和推理之前就被拒绝
            MriError::NoFile => StatusCode::BAD_REQUEST,
            MriError::EmptyFilename => StatusCode::BAD_REQUEST,
            MriError::UnsupportedExtension(_) => StatusCode::BAD_REQUEST,
            MriError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            MriError::Base64(_) => StatusCode::BAD_REQUEST,
            MriError::FileTooLarge(_, _) => StatusCode::PAYLOAD_TOO_LARGE,
            MriError::NotFound(_) => StatusCode::NOT_FOUND,
            MriError::ModelLoad(_) => StatusCode::SERVICE_UNAVAILABLE,
            // 预处理/推理阶段的失败在请求边界统一转成500
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            MriError::NoFile => "NO_FILE",
            MriError::EmptyFilename => "EMPTY_FILENAME",
            MriError::UnsupportedExtension(_) => "UNSUPPORTED_EXTENSION",
            MriError::ImageDecode(_) => "IMAGE_DECODE_ERROR",
            MriError::Inference(_) => "INFERENCE_ERROR",
            MriError::ModelLoad(_) => "MODEL_LOAD_ERROR",
            MriError::InvalidInput(_) => "INVALID_INPUT",
            MriError::FileTooLarge(_, _) => "FILE_TOO_LARGE",
            MriError::NotFound(_) => "NOT_FOUND",
            MriError::Config(_) => "CONFIG_ERROR",
            MriError::Io(_) => "IO_ERROR",
            MriError::Base64(_) => "BASE64_DECODE_ERROR",
            MriError::Ort(_) => "ORT_ERROR",
            MriError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for MriError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = serde_json::json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            }
        });

        tracing::error!("Request failed: {} ({})", self, status);

        (status, axum::Json(error_response)).into_response()
    }
}
