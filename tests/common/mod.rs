//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::request::Builder;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use speakboard::api::{self, AppState};
use speakboard::bootstrap::build_state;
use speakboard::config::Config;
use speakboard::synth::Synthesizer;
use speakboard::SynthesisError;

pub const ADMIN_IP: &str = "127.0.0.1";

#[derive(Default)]
pub struct EchoSynthesizer {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Synthesizer for EchoSynthesizer {
    async fn synthesize(&self, text: &str, _language: &str) -> Result<Vec<u8>, SynthesisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(text.as_bytes().to_vec())
    }
}

pub struct BrokenSynthesizer;

#[async_trait]
impl Synthesizer for BrokenSynthesizer {
    async fn synthesize(&self, _text: &str, _language: &str) -> Result<Vec<u8>, SynthesisError> {
        Err(SynthesisError::Status(503))
    }
}

pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.data_dir = dir.path().join("data");
    config.storage.audio_dir = dir.path().join("audio");
    config
}

pub struct TestApp {
    pub dir: TempDir,
    pub state: AppState,
    pub router: Router,
    pub synth: Arc<EchoSynthesizer>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::in_dir(tempfile::tempdir().unwrap())
    }

    /// Build a fresh app over an existing data directory, as on restart.
    pub fn in_dir(dir: TempDir) -> Self {
        let synth = Arc::new(EchoSynthesizer::default());
        let state = build_state(&test_config(&dir), synth.clone()).unwrap();
        let router = api::router(state.clone());
        Self {
            dir,
            state,
            router,
            synth,
        }
    }

    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(req).await.unwrap()
    }

    pub async fn speak(&self, text: &str, from: &str) -> (u16, String) {
        let body = format!("text={}", form_encode(text));
        let req = from_client(Request::post("/speak"), from, from)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        let resp = self.send(req).await;
        let status = resp.status().as_u16();
        (status, body_string(resp).await)
    }

    pub async fn moderate(&self, action: &str, json: &str, from: &str) -> (u16, String) {
        self.moderate_via(action, json, from, from).await
    }

    /// Moderation request whose socket peer and `X-Forwarded-For` differ.
    pub async fn moderate_via(
        &self,
        action: &str,
        json: &str,
        peer: &str,
        forwarded_for: &str,
    ) -> (u16, String) {
        let req = from_client(Request::post(format!("/admin/{action}")), peer, forwarded_for)
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap();
        let resp = self.send(req).await;
        let status = resp.status().as_u16();
        (status, body_string(resp).await)
    }

    pub async fn get(&self, uri: &str, from: &str) -> (u16, String) {
        self.get_via(uri, from, from).await
    }

    pub async fn get_via(&self, uri: &str, peer: &str, forwarded_for: &str) -> (u16, String) {
        let req = from_client(Request::get(uri), peer, forwarded_for)
            .body(Body::empty())
            .unwrap();
        let resp = self.send(req).await;
        let status = resp.status().as_u16();
        (status, body_string(resp).await)
    }

    pub fn audio_files(&self) -> Vec<String> {
        self.state.pipeline.artifacts().list()
    }
}

/// Attach the connection peer the way `into_make_service_with_connect_info`
/// does, plus a forwarded-for header.
fn from_client(builder: Builder, peer: &str, forwarded_for: &str) -> Builder {
    let ip: IpAddr = peer.parse().unwrap();
    builder
        .extension(ConnectInfo(SocketAddr::new(ip, 4000)))
        .header("x-forwarded-for", forwarded_for)
}

pub async fn body_string(resp: Response<Body>) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn form_encode(text: &str) -> String {
    text.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            b' ' => "+".to_string(),
            _ => format!("%{b:02X}"),
        })
        .collect()
}
