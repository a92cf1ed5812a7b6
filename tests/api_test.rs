use std::path::{Path, PathBuf};
use std::sync::Arc;

use handsign::api::{create_rest_router, AppState};
use handsign::classifier::{ClassifierModel, DecisionTree, RandomForest, TreeNode};
use handsign::config::{InferenceConfig, ServerConfig};
use handsign::engine::LandmarkExtractor;
use handsign::features::{FeatureGeometry, Landmark, LandmarkSet, NUM_FEATURES, NUM_LANDMARKS};
use handsign::service::SignService;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tempfile::tempdir;
use tokio::net::TcpListener;

enum FakeExtractor {
    Hand,
    NoHand,
    Broken,
}

impl LandmarkExtractor for FakeExtractor {
    fn extract(&self, _image: &DynamicImage) -> anyhow::Result<Option<LandmarkSet>> {
        match self {
            FakeExtractor::Hand => Ok(Some(LandmarkSet::new([Landmark::new(0.5, 0.5); NUM_LANDMARKS]))),
            FakeExtractor::NoHand => Ok(None),
            FakeExtractor::Broken => Err(anyhow::anyhow!("landmark model failed")),
        }
    }
}

/// Scores "A" at 0.92 for every input
fn model() -> ClassifierModel {
    let tree = DecisionTree::new(vec![TreeNode::Leaf {
        distribution: vec![(0, 0.92), (1, 0.05), (2, 0.03)],
    }]);
    let forest = RandomForest::new(vec![tree], 4, NUM_FEATURES);
    let classes = ["A", "B", "C", "D"].iter().map(|c| c.to_string()).collect();
    ClassifierModel::new(classes, FeatureGeometry::Raw, forest).unwrap()
}

async fn spawn_server(extractor: FakeExtractor, frontend_dir: PathBuf) -> String {
    let server = ServerConfig {
        frontend_dir,
        ..ServerConfig::default()
    };
    let service = Arc::new(SignService::new(extractor, model(), &InferenceConfig::default()));
    let router = create_rest_router(Arc::new(AppState { service }), &server);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://{}", addr)
}

fn png_bytes() -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 48, Rgb([200, 160, 140])));
    let mut bytes = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

async fn post_frame(base: &str, bytes: Vec<u8>) -> (StatusCode, Value) {
    let form = Form::new().part("frame", Part::bytes(bytes).file_name("frame.png"));
    let response = reqwest::Client::new()
        .post(format!("{}/predict", base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    let status = response.status();
    (status, response.json().await.unwrap())
}

fn missing(dir: &Path) -> PathBuf {
    dir.join("no-frontend")
}

#[tokio::test]
async fn test_health() {
    let dir = tempdir().unwrap();
    let base = spawn_server(FakeExtractor::Hand, missing(dir.path())).await;

    let response = reqwest::get(format!("{}/health", base)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let dir = tempdir().unwrap();
    let base = spawn_server(FakeExtractor::Hand, missing(dir.path())).await;

    let response = reqwest::Client::new()
        .get(format!("{}/health", base))
        .header("Origin", "http://localhost:3000")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_predict_returns_top_label() {
    let dir = tempdir().unwrap();
    let base = spawn_server(FakeExtractor::Hand, missing(dir.path())).await;

    let (status, body) = post_frame(&base, png_bytes()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["prediction"], "A");
    assert!((body["confidence"].as_f64().unwrap() - 0.92).abs() < 1e-6);
    assert!(body.get("message").is_none());

    let top = body["top_predictions"].as_array().unwrap();
    assert_eq!(top.len(), 3);
    assert_eq!(top[0]["label"], "A");
    let confidences: Vec<f64> = top.iter().map(|t| t["confidence"].as_f64().unwrap()).collect();
    assert!(confidences.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn test_predict_no_hand() {
    let dir = tempdir().unwrap();
    let base = spawn_server(FakeExtractor::NoHand, missing(dir.path())).await;

    let (status, body) = post_frame(&base, png_bytes()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"prediction": null, "message": "no hand detected"}));
}

#[tokio::test]
async fn test_predict_invalid_image() {
    let dir = tempdir().unwrap();
    let base = spawn_server(FakeExtractor::Hand, missing(dir.path())).await;

    let (status, body) = post_frame(&base, b"\x00\x01 definitely not an image".to_vec()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "invalid image"}));
}

#[tokio::test]
async fn test_predict_missing_frame() {
    let dir = tempdir().unwrap();
    let base = spawn_server(FakeExtractor::Hand, missing(dir.path())).await;
    let client = reqwest::Client::new();

    let form = Form::new().text("image", "wrong field");
    let response = client
        .post(format!("{}/predict", base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"error": "missing frame"}));

    // Not multipart at all
    let response = client.post(format!("{}/predict", base)).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"error": "missing frame"}));
}

#[tokio::test]
async fn test_predict_internal_failure() {
    let dir = tempdir().unwrap();
    let base = spawn_server(FakeExtractor::Broken, missing(dir.path())).await;

    let (status, body) = post_frame(&base, png_bytes()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("landmark model failed"));
}

#[tokio::test]
async fn test_api_info_without_frontend() {
    let dir = tempdir().unwrap();
    let base = spawn_server(FakeExtractor::Hand, missing(dir.path())).await;

    let body: Value = reqwest::get(format!("{}/", base)).await.unwrap().json().await.unwrap();
    assert_eq!(
        body,
        json!({"message": "ASL Translator API", "docs": "/health, POST /predict"})
    );

    let response = reqwest::get(format!("{}/script.js", base)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"error": "Not found"}));
}

#[tokio::test]
async fn test_serves_frontend() {
    let dir = tempdir().unwrap();
    let frontend = dir.path().join("frontend");
    std::fs::create_dir_all(frontend.join("assets").join("asl_gifs")).unwrap();
    std::fs::write(frontend.join("index.html"), "<html>sign translator</html>").unwrap();
    std::fs::write(frontend.join("script.js"), "console.log('hi');").unwrap();
    std::fs::write(frontend.join("style.css"), "body {}").unwrap();
    std::fs::write(frontend.join("secret.txt"), "hidden").unwrap();
    std::fs::write(frontend.join("assets").join("asl_gifs").join("A.jpg"), "jpeg").unwrap();

    let base = spawn_server(FakeExtractor::Hand, frontend).await;

    let index = reqwest::get(format!("{}/", base)).await.unwrap();
    assert_eq!(index.status(), StatusCode::OK);
    assert!(index.text().await.unwrap().contains("sign translator"));

    let script = reqwest::get(format!("{}/script.js", base)).await.unwrap();
    assert_eq!(script.text().await.unwrap(), "console.log('hi');");

    let asset = reqwest::get(format!("{}/assets/asl_gifs/A.jpg", base)).await.unwrap();
    assert_eq!(asset.status(), StatusCode::OK);
    assert_eq!(asset.text().await.unwrap(), "jpeg");

    for path in ["secret.txt", "assets/asl_gifs/Z.jpg"] {
        let response = reqwest::get(format!("{}/{}", base, path)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", path);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({"error": "Not found"}));
    }
}
