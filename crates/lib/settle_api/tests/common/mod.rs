//! Shared fixtures: in-memory store, recording notifier, request helpers.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use settle_api::config::ApiConfig;
use settle_api::services::notify::{NotifyError, ResetNotice, ResetNotifier};
use settle_api::{AppState, router};
use settle_core::auth::memory::MemoryCredentialStore;
use settle_core::auth::password::hash_password;
use settle_core::models::auth::{PortalAgent, Role, StaffUser};
use tower::ServiceExt;

pub const SECRET: &str = "test-secret-0123456789abcdef-0123456789";

/// Notifier that keeps every notice, or fails every delivery.
#[derive(Default)]
pub struct RecordingNotifier {
    pub notices: Mutex<Vec<ResetNotice>>,
    pub attempts: AtomicUsize,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn notices(&self) -> Vec<ResetNotice> {
        self.notices.lock().unwrap().clone()
    }

    /// Wait for the fire-and-forget delivery task to run.
    pub async fn wait_for_attempts(&self, n: usize) {
        for _ in 0..100 {
            if self.attempts.load(Ordering::SeqCst) >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("notifier saw fewer than {n} attempts");
    }
}

#[async_trait]
impl ResetNotifier for RecordingNotifier {
    async fn deliver(&self, notice: ResetNotice) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(NotifyError("smtp unreachable".into()));
        }
        self.notices.lock().unwrap().push(notice);
        Ok(())
    }
}

pub struct TestApp {
    pub store: Arc<MemoryCredentialStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub state: AppState,
    pub app: Router,
}

pub fn test_config(production: bool) -> ApiConfig {
    ApiConfig {
        jwt_secret: SECRET.into(),
        production,
        public_base_url: "https://app.example.com".into(),
        bcrypt_cost: 4,
    }
}

pub fn test_app_with(production: bool, notifier: RecordingNotifier) -> TestApp {
    test_app_from(test_config(production), notifier)
}

pub fn test_app_from(config: ApiConfig, notifier: RecordingNotifier) -> TestApp {
    let store = Arc::new(MemoryCredentialStore::new());
    let notifier = Arc::new(notifier);
    let state = AppState::new(store.clone(), notifier.clone(), config).expect("app state");
    let app = router(state.clone());
    TestApp {
        store,
        notifier,
        state,
        app,
    }
}

pub fn test_app() -> TestApp {
    test_app_with(false, RecordingNotifier::default())
}

impl TestApp {
    pub fn add_user(&self, id: i64, email: &str, password: &str, role: Role) {
        let cost = self.state.config.bcrypt_cost;
        self.store
            .insert_user(StaffUser {
                id,
                email: email.into(),
                name: Some(format!("User {id}")),
                password_hash: hash_password(password, cost).unwrap(),
                role,
                is_active: true,
            })
            .unwrap();
    }

    pub fn add_agent(&self, id: i64, portal_email: &str, password: &str) {
        let cost = self.state.config.bcrypt_cost;
        self.store
            .insert_agent(PortalAgent {
                id,
                user_id: None,
                name: Some(format!("Agent {id}")),
                portal_email: portal_email.into(),
                portal_password_hash: Some(hash_password(password, cost).unwrap()),
                portal_access_enabled: true,
                is_active: true,
            })
            .unwrap();
    }

    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(req).await.expect("request")
    }

    pub async fn post_json(
        &self,
        path: &str,
        body: serde_json::Value,
        cookie: Option<&str>,
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn post_raw(&self, path: &str, content_type: &str, body: &str) -> Response<Body> {
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(req).await
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method("GET").uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }
}

pub async fn body_json(resp: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse JSON")
}

pub async fn body_text(resp: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

/// Raw `Set-Cookie` header for `name`, if the response sets it.
pub fn set_cookie_header(resp: &Response<Body>, name: &str) -> Option<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{name}=")))
        .map(str::to_string)
}

/// Value assigned to cookie `name` by the response.
pub fn set_cookie_value(resp: &Response<Body>, name: &str) -> Option<String> {
    set_cookie_header(resp, name).map(|raw| {
        raw.split(';')
            .next()
            .unwrap_or_default()
            .trim_start_matches(&format!("{name}="))
            .to_string()
    })
}

pub fn location(resp: &Response<Body>) -> Option<String> {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
