use crate::{
    classify::ClassifyPipeline,
    image::ImageLoader,
    utils::error::MriError,
    web::{
        extractors::{SessionId, ValidatedJson},
        AppState,
    },
    PredictionResult, Result,
};
use axum::{
    body::Bytes,
    extract::{Multipart, State},
    response::{AppendHeaders, Json},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;

/// 允许上传的扩展名（只看文件名后缀，不校验内容）
const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// JSON请求体（base64模式）
#[derive(Debug, Deserialize)]
pub struct PredictBase64Request {
    /// Base64编码的图像数据
    pub image: String,

    /// 保存用的文件名，缺省时自动生成
    #[serde(default)]
    pub filename: Option<String>,
}

/// JSON响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub timestamp: String,
    pub request_id: String,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Multipart文件上传处理器
pub async fn predict_handler(
    State(state): State<AppState>,
    session: SessionId,
    mut multipart: Multipart,
) -> Result<impl axum::response::IntoResponse> {
    let start_time = Instant::now();

    tracing::info!("Processing multipart predict request: session_id={}", session.0);

    let mut upload: Option<(String, Bytes)> = None;

    // 解析multipart数据
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| MriError::InvalidInput(format!("Failed to read multipart field: {}", e)))?
    {
        let field_name = field.name().unwrap_or("unknown").to_string();

        match field_name.as_str() {
            "file" => {
                // 文件名与扩展名在读取任何数据之前校验
                let filename = field.file_name().map(str::to_string).unwrap_or_default();

                if filename.is_empty() {
                    return Err(MriError::EmptyFilename);
                }
                if !is_allowed_file(&filename) {
                    return Err(MriError::UnsupportedExtension(filename));
                }

                let data = field.bytes().await.map_err(|e| {
                    MriError::InvalidInput(format!("Failed to read file data: {}", e))
                })?;

                if data.is_empty() {
                    return Err(MriError::InvalidInput("Empty file".to_string()));
                }

                tracing::debug!("Received file '{}': {} bytes", filename, data.len());
                upload = Some((filename, data));
            }
            _ => {
                tracing::debug!("Ignoring unknown field: {}", field_name);
            }
        }
    }

    // 验证必需的文件字段
    let (filename, data) = upload.ok_or(MriError::NoFile)?;

    let image_path = store_upload(&state, &filename, &data).await?;

    // 执行分类流水线
    let result = ClassifyPipeline::process_bytes(&state.model, data, &image_path)?;

    // 缓存本会话的最新结果
    state.sessions.put(&session.0, result.clone());

    let processing_time = start_time.elapsed();
    tracing::info!(
        "Predict completed: session_id={}, predicted={}, time={:.3}s",
        session.0,
        result.predicted,
        processing_time.as_secs_f32()
    );

    Ok((
        AppendHeaders([("x-session-id", session.0)]),
        Json(ApiResponse::success(result)),
    ))
}

/// JSON base64上传处理器
pub async fn predict_base64_handler(
    State(state): State<AppState>,
    session: SessionId,
    ValidatedJson(request): ValidatedJson<PredictBase64Request>,
) -> Result<impl axum::response::IntoResponse> {
    let start_time = Instant::now();

    tracing::info!("Processing base64 predict request: session_id={}", session.0);

    let data = ImageLoader::decode_base64(&request.image)?;

    // 提供文件名时沿用上传端点的扩展名校验，否则按内容生成
    let filename = match request.filename {
        Some(name) if !name.is_empty() => {
            if !is_allowed_file(&name) {
                return Err(MriError::UnsupportedExtension(name));
            }
            name
        }
        _ => {
            let ext = ImageLoader::detect_format(&data)
                .and_then(|format| format.extensions_str().first().copied())
                .unwrap_or("png");
            format!("{}.{}", uuid::Uuid::new_v4(), ext)
        }
    };

    let image_path = store_upload(&state, &filename, &data).await?;

    let result = ClassifyPipeline::process_bytes(&state.model, Bytes::from(data), &image_path)?;

    state.sessions.put(&session.0, result.clone());

    let processing_time = start_time.elapsed();
    tracing::info!(
        "Base64 predict completed: session_id={}, predicted={}, time={:.3}s",
        session.0,
        result.predicted,
        processing_time.as_secs_f32()
    );

    Ok((
        AppendHeaders([("x-session-id", session.0)]),
        Json(ApiResponse::success(result)),
    ))
}

/// 会话结果重放处理器
pub async fn result_handler(
    State(state): State<AppState>,
    session: SessionId,
) -> Result<Json<ApiResponse<PredictionResult>>> {
    let result = state
        .sessions
        .get(&session.0)
        .ok_or_else(|| MriError::NotFound("No cached result for this session".to_string()))?;

    Ok(Json(ApiResponse::success(result)))
}

/// 把上传内容写进公开的静态目录，返回展示用路径。
///
/// 文件按原始文件名存储，同名上传会相互覆盖（接受的限制）。
async fn store_upload(state: &AppState, filename: &str, data: &[u8]) -> Result<String> {
    let safe_name = sanitize_filename(filename)?;

    let uploads_dir = state.config.uploads_dir();
    tokio::fs::create_dir_all(&uploads_dir)
        .await
        .map_err(MriError::Io)?;

    let dest = uploads_dir.join(&safe_name);
    tokio::fs::write(&dest, data).await.map_err(MriError::Io)?;

    Ok(format!("/static/uploads/{}", safe_name))
}

/// 上传文件名只保留basename，防止路径穿越出上传目录
fn sanitize_filename(filename: &str) -> Result<String> {
    Path::new(filename)
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| MriError::InvalidInput(format!("Unusable filename: {}", filename)))
}

/// 与上传表单约定一致的扩展名检查（大小写不敏感）
fn is_allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_allowed_file_accepts_known_extensions() {
        assert!(is_allowed_file("scan.png"));
        assert!(is_allowed_file("scan.jpg"));
        assert!(is_allowed_file("scan.jpeg"));
        assert!(is_allowed_file("SCAN.PNG"));
        assert!(is_allowed_file("brain.scan.JPeG"));
    }

    #[test]
    fn test_is_allowed_file_rejects_everything_else() {
        assert!(!is_allowed_file("scan.txt"));
        assert!(!is_allowed_file("scan.gif"));
        assert!(!is_allowed_file("png")); // 没有点号
        assert!(!is_allowed_file(""));
        assert!(!is_allowed_file("archive.png.zip"));
    }

    #[test]
    fn test_sanitize_filename_strips_directories() {
        assert_eq!(sanitize_filename("scan.png").unwrap(), "scan.png");
        assert_eq!(sanitize_filename("../../etc/passwd.png").unwrap(), "passwd.png");
        assert_eq!(sanitize_filename("/tmp/abs.jpg").unwrap(), "abs.jpg");
    }
}
