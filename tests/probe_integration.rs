//! Integration tests for remote metadata probing through the engine.

use std::time::Duration;

use multiloader_core::{DownloadEngine, EngineOptions, ProbeResult};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::socket_guard::{socket_skip_return, start_mock_server_or_skip};

macro_rules! require_mock_server {
    () => {{
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return socket_skip_return();
        };
        mock_server
    }};
}

fn engine() -> DownloadEngine {
    DownloadEngine::new(EngineOptions {
        probe_timeout: Duration::from_secs(5),
        ..EngineOptions::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_probe_uses_range_request_when_head_has_no_name() {
    let mock_server = require_mock_server!();
    Mock::given(method("HEAD"))
        .and(path("/api/download/models/991"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/download/models/991"))
        .and(header("Range", "bytes=0-0"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header(
                    "Content-Disposition",
                    "attachment; filename=\"detail_tweaker.safetensors\"",
                )
                .insert_header("Content-Range", "bytes 0-0/151108832")
                .set_body_bytes(vec![0u8]),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = engine()
        .probe_remote_file(
            &format!("{}/api/download/models/991", mock_server.uri()),
            None,
        )
        .await;

    assert_eq!(
        result,
        ProbeResult {
            file_name: "detail_tweaker.safetensors".to_string(),
            size: Some(151_108_832),
        }
    );
}

#[tokio::test]
async fn test_probe_head_name_skips_range_request() {
    let mock_server = require_mock_server!();
    Mock::given(method("HEAD"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Disposition", "attachment; filename=vae.pt"),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(206))
        .expect(0)
        .mount(&mock_server)
        .await;

    let result = engine()
        .probe_remote_file(&format!("{}/files/5", mock_server.uri()), None)
        .await;

    assert_eq!(result.file_name, "vae.pt");
}

#[tokio::test]
async fn test_probe_redirect_loop_falls_back_to_url_name() {
    let mock_server = require_mock_server!();
    let looping = format!("{}/loop/weights.ckpt", mock_server.uri());
    Mock::given(path("/loop/weights.ckpt"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", looping.as_str()))
        .mount(&mock_server)
        .await;

    let result = engine().probe_remote_file(&looping, None).await;

    assert_eq!(result.file_name, "weights.ckpt");
    assert_eq!(result.size, None);
}

#[tokio::test]
async fn test_probe_follows_redirect_to_named_file() {
    let mock_server = require_mock_server!();
    let target = format!("{}/storage/blob", mock_server.uri());
    Mock::given(path("/start"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", target.as_str()))
        .mount(&mock_server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/storage/blob"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Disposition", "attachment; filename=\"lora.safetensors\""),
        )
        .mount(&mock_server)
        .await;

    let result = engine()
        .probe_remote_file(&format!("{}/start", mock_server.uri()), Some("secret"))
        .await;

    assert_eq!(result.file_name, "lora.safetensors");
}

#[tokio::test]
async fn test_probe_server_errors_fall_back_to_url_name() {
    let mock_server = require_mock_server!();
    Mock::given(path("/models/checkpoint%20final.safetensors"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let result = engine()
        .probe_remote_file(
            &format!("{}/models/checkpoint%20final.safetensors", mock_server.uri()),
            None,
        )
        .await;

    assert_eq!(result.file_name, "checkpoint final.safetensors");
}
