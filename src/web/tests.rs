use crate::{
    models::TumorModel,
    web::create_app,
    Config, Result,
};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use base64::Engine;
use http_body_util::BodyExt;
use image::{ImageFormat, Rgb, RgbImage};
use ndarray::Array4;
use serde_json::Value;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt; // for `app.oneshot()`

const BOUNDARY: &str = "x-test-boundary";

/// 返回固定得分向量并统计调用次数的假模型
struct FixedModel {
    scores: Vec<f32>,
    calls: AtomicUsize,
}

impl FixedModel {
    fn new(scores: Vec<f32>) -> Arc<Self> {
        Arc::new(Self {
            scores,
            calls: AtomicUsize::new(0),
        })
    }
}

impl TumorModel for FixedModel {
    fn predict(&self, input: Array4<f32>) -> Result<Vec<f32>> {
        assert_eq!(input.shape(), &[1, 224, 224, 3]);
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.scores.clone())
    }
}

/// 测试应用：静态目录指向临时目录，模型可注入
fn test_app(model: Arc<FixedModel>) -> (Router, TempDir) {
    let static_dir = tempfile::tempdir().unwrap();
    let config = Config::new(
        "127.0.0.1:0".to_string(),
        "models".to_string(),
        static_dir.path().to_str().unwrap().to_string(),
        None,
        false,
    )
    .unwrap();

    let app = create_app(config, model).unwrap();
    (app, static_dir)
}

fn png_bytes() -> Vec<u8> {
    let img = RgbImage::from_pixel(16, 16, Rgb([90, 90, 90]));
    let mut buffer = Vec::new();
    let mut cursor = Cursor::new(&mut buffer);
    img.write_to(&mut cursor, ImageFormat::Png).unwrap();
    buffer
}

fn multipart_body(field: &str, filename: Option<&str>, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    let disposition = match filename {
        Some(name) => format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, name
        ),
        None => format!("Content-Disposition: form-data; name=\"{}\"\r\n", field),
    };
    body.extend_from_slice(disposition.as_bytes());
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn predict_request(session_id: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .header("x-session-id", session_id)
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_predict_classifies_uploaded_image() {
    let model = FixedModel::new(vec![0.7, 0.1, 0.1, 0.1]);
    let (app, static_dir) = test_app(model.clone());

    let body = multipart_body("file", Some("scan.png"), &png_bytes());
    let response = app.oneshot(predict_request("s1", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-session-id").unwrap(),
        "s1"
    );

    let payload = json_body(response).await;
    assert_eq!(payload["success"], true);

    let data = &payload["data"];
    assert_eq!(data["predicted"], "Glioma");
    assert_eq!(data["confidence"].as_f64().unwrap(), 0.7f32 as f64);
    assert_eq!(data["image_path"], "/static/uploads/scan.png");

    // 四个类别各出现一次，按置信度降序，并列按类别表顺序
    let labels: Vec<&str> = data["predictions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["label"].as_str().unwrap())
        .collect();
    assert_eq!(labels, ["Glioma", "Meningioma", "No Tumor", "Pituitary"]);

    // 上传的文件写进了公开目录
    assert!(static_dir.path().join("uploads/scan.png").exists());
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_predict_without_file_field() {
    let model = FixedModel::new(vec![0.25; 4]);
    let (app, _static_dir) = test_app(model.clone());

    let body = multipart_body("note", None, b"no file here");
    let response = app.oneshot(predict_request("s1", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = json_body(response).await;
    assert_eq!(payload["error"]["code"], "NO_FILE");
    assert_eq!(payload["error"]["message"], "No file uploaded");
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_predict_with_empty_filename() {
    let model = FixedModel::new(vec![0.25; 4]);
    let (app, static_dir) = test_app(model.clone());

    let body = multipart_body("file", Some(""), &png_bytes());
    let response = app.oneshot(predict_request("s1", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = json_body(response).await;
    assert_eq!(payload["error"]["code"], "EMPTY_FILENAME");

    // 在任何文件I/O之前就被拒绝
    assert!(!static_dir.path().join("uploads").exists());
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_predict_rejects_txt_extension() {
    let model = FixedModel::new(vec![0.25; 4]);
    let (app, static_dir) = test_app(model.clone());

    let body = multipart_body("file", Some("scan.txt"), b"definitely text");
    let response = app.oneshot(predict_request("s1", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = json_body(response).await;
    assert_eq!(payload["error"]["code"], "UNSUPPORTED_EXTENSION");

    // 预处理和推理都没有被触发
    assert!(!static_dir.path().join("uploads").exists());
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_predict_with_corrupt_image_survives() {
    let model = FixedModel::new(vec![0.7, 0.1, 0.1, 0.1]);
    let (app, _static_dir) = test_app(model.clone());

    // 扩展名合法但内容不是图片
    let body = multipart_body("file", Some("fake.png"), b"plain text in disguise");
    let response = app
        .clone()
        .oneshot(predict_request("s1", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let payload = json_body(response).await;
    assert_eq!(payload["error"]["code"], "IMAGE_DECODE_ERROR");
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);

    // 同一个应用实例随后仍可正常处理请求
    let body = multipart_body("file", Some("real.png"), &png_bytes());
    let response = app.oneshot(predict_request("s1", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_result_replay_roundtrip() {
    let model = FixedModel::new(vec![0.0, 0.05, 0.9, 0.05]);
    let (app, _static_dir) = test_app(model);

    let body = multipart_body("file", Some("scan.jpg"), &png_bytes());
    let response = app
        .clone()
        .oneshot(predict_request("abc", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // 同一会话可以重放最近一次结果
    let replay = Request::builder()
        .method("GET")
        .uri("/result")
        .header("x-session-id", "abc")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(replay).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let payload = json_body(response).await;
    assert_eq!(payload["data"]["predicted"], "No Tumor");

    // 其他会话没有缓存结果
    let miss = Request::builder()
        .method("GET")
        .uri("/result")
        .header("x-session-id", "other")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(miss).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_base64_predict() {
    let model = FixedModel::new(vec![0.1, 0.8, 0.05, 0.05]);
    let (app, _static_dir) = test_app(model);

    let encoded = base64::engine::general_purpose::STANDARD.encode(png_bytes());
    let request = Request::builder()
        .method("POST")
        .uri("/predict/base64")
        .header("content-type", "application/json")
        .header("x-session-id", "s1")
        .body(Body::from(
            serde_json::json!({ "image": encoded, "filename": "scan.png" }).to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let payload = json_body(response).await;
    assert_eq!(payload["data"]["predicted"], "Meningioma");
}

#[tokio::test]
async fn test_base64_predict_rejects_empty_image() {
    let model = FixedModel::new(vec![0.25; 4]);
    let (app, _static_dir) = test_app(model.clone());

    let request = Request::builder()
        .method("POST")
        .uri("/predict/base64")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::json!({ "image": "" }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = json_body(response).await;
    assert_eq!(payload["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_health_and_info_endpoints() {
    let model = FixedModel::new(vec![0.25; 4]);
    let (app, _static_dir) = test_app(model);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let payload = json_body(response).await;
    assert_eq!(payload["status"], "healthy");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/info")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let payload = json_body(response).await;
    assert_eq!(payload["model"]["classes"][0], "Glioma");
    assert_eq!(payload["model"]["classes"][3], "Pituitary");
}
