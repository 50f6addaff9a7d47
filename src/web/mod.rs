pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod session;
pub mod ui;

#[cfg(test)]
mod tests;

use crate::{
    classify::CLASS_LABELS,
    models::{OnnxClassifier, TumorModel},
    Config, Result,
};
use axum::{
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::json;
use session::SessionStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer, limit::RequestBodyLimitLayer, services::ServeDir, timeout::TimeoutLayer,
};

/// 注入到各处理器的共享状态。
///
/// 模型在进程启动时构建一次，之后只读共享；不使用全局单例。
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub model: Arc<dyn TumorModel>,
    pub sessions: SessionStore,
}

pub async fn serve(config: Config) -> Result<()> {
    // 启动时构建推理会话并显式注入
    let model: Arc<dyn TumorModel> = Arc::new(OnnxClassifier::new(&config)?);

    // 构建应用路由
    let app = create_app(config.clone(), model)?;

    // 解析绑定地址
    let addr: SocketAddr = config.bind_addr.parse().map_err(|e| {
        crate::utils::error::MriError::Config(format!(
            "Invalid bind address {}: {}",
            config.bind_addr, e
        ))
    })?;

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("Worker threads: {}", config.workers);
    tracing::info!("API endpoints:");
    tracing::info!("  POST /predict        - Multipart file upload");
    tracing::info!("  POST /predict/base64 - JSON base64 upload");
    tracing::info!("  GET  /result         - Last result for session");
    tracing::info!("  GET  /               - Web UI");
    tracing::info!("  GET  /upload         - Upload page");
    tracing::info!("  GET  /health         - Health check");
    tracing::info!("  GET  /api/info       - Service information");

    // 启动服务器
    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        crate::utils::error::MriError::Internal(format!("Failed to bind to address {}: {}", addr, e))
    })?;

    axum::serve(listener, app)
        .await
        .map_err(|e| crate::utils::error::MriError::Internal(format!("Server failed: {}", e)))?;

    Ok(())
}

pub fn create_app(config: Config, model: Arc<dyn TumorModel>) -> Result<Router> {
    let state = AppState {
        config: config.clone(),
        model,
        sessions: SessionStore::default(),
    };

    let app = Router::new()
        // 分类API路由
        .route("/predict", post(handlers::predict_handler))
        .route("/predict/base64", post(handlers::predict_base64_handler))
        .route("/result", get(handlers::result_handler))
        // Web UI路由
        .route("/", get(ui::index_handler))
        .route("/upload", get(ui::upload_handler))
        // 系统路由
        .route("/health", get(health_handler))
        .route("/api/info", get(info_handler))
        // 上传的图片通过静态目录公开
        .nest_service("/static", ServeDir::new(&config.static_dir))
        // 添加中间件 - 使用分层模式避免复杂类型嵌套
        .layer(axum::middleware::from_fn(middleware::request_logging))
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(RequestBodyLimitLayer::new(config.server_config.max_request_size))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server_config.request_timeout,
        )))
        .layer(CorsLayer::permissive()) // 开发环境使用宽松CORS
        .with_state(state);

    Ok(app)
}

/// 健康检查端点
async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// 服务信息端点
async fn info_handler(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<serde_json::Value> {
    Json(json!({
        "service": "ONNX MRI Classification Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "model": {
            "path": state.config.model_path(),
            "input_shape": [1, 224, 224, 3],
            "classes": CLASS_LABELS,
            "normalized_input": true
        },
        "features": {
            "multipart_upload": true,
            "base64_upload": true,
            "session_result_cache": true
        }
    }))
}
