//! In-process stand-in for the service under test, plus a call-counting
//! transport wrapper.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use apicheck::error::TransportError;
use apicheck::http::{ApiRequest, ApiResponse, Transport};
use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

pub const ADMIN_EMAIL: &str = "admin@sxc.edu.in";

#[derive(Default)]
struct Users {
    /// email -> (password, role)
    accounts: BTreeMap<String, (String, String)>,
    /// token -> email
    tokens: BTreeMap<String, String>,
    resources: Vec<Value>,
    next_id: u64,
}

type Shared = Arc<Mutex<Users>>;

pub struct StubServer {
    base_url: String,
    join: JoinHandle<()>,
}

impl StubServer {
    pub async fn spawn() -> Self {
        let state: Shared = Arc::default();
        let app = Router::new()
            .route("/health", get(|| async { Json(json!({"status": "ok"})) }))
            .route("/boom", get(boom))
            .route("/slow", get(slow))
            .route("/text", get(|| async { "plain text, not json" }))
            .route("/api/auth/register", post(register))
            .route("/api/auth/login", post(login))
            .route("/api/auth/verify", get(verify))
            .route("/api/resources", get(list_resources).post(create_resource))
            .route("/api/resources/{id}", delete(delete_resource))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .expect("bind stub server");
        let base_url = format!("http://{}", listener.local_addr().expect("stub addr"));
        let join = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self { base_url, join }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_url(&self) -> String {
        format!("{}/api", self.base_url)
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.join.abort();
    }
}

async fn boom() -> Response {
    let body = Json(json!({"error": "database unavailable"}));
    (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
}

async fn slow() -> Response {
    tokio::time::sleep(Duration::from_secs(30)).await;
    Json(json!({"late": true})).into_response()
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"error": message}))).into_response()
}

fn session(users: &mut Users, email: &str, role: &str) -> Value {
    let token = format!("token-{}", users.tokens.len() + 1);
    users.tokens.insert(token.clone(), email.to_string());
    json!({"token": token, "user": {"email": email, "role": role}})
}

fn bearer_email(users: &Users, headers: &HeaderMap) -> Option<(String, String)> {
    let token = headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")?;
    let email = users.tokens.get(token)?;
    let (_, role) = users.accounts.get(email)?;
    Some((email.clone(), role.clone()))
}

async fn register(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let (Some(email), Some(password)) = (body["email"].as_str(), body["password"].as_str()) else {
        return error(StatusCode::BAD_REQUEST, "email and password are required");
    };
    let mut users = state.lock().expect("stub state");
    if users.accounts.contains_key(email) {
        return error(StatusCode::BAD_REQUEST, "User already exists");
    }
    let role = if email == ADMIN_EMAIL { "admin" } else { "student" };
    users
        .accounts
        .insert(email.to_string(), (password.to_string(), role.to_string()));
    Json(session(&mut users, email, role)).into_response()
}

async fn login(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    let mut users = state.lock().expect("stub state");
    match users.accounts.get(email).cloned() {
        Some((stored, role)) if stored == password => {
            Json(session(&mut users, email, &role)).into_response()
        }
        _ => error(StatusCode::UNAUTHORIZED, "Invalid credentials"),
    }
}

async fn verify(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let users = state.lock().expect("stub state");
    match bearer_email(&users, &headers) {
        Some((email, role)) => {
            Json(json!({"user": {"email": email, "role": role}})).into_response()
        }
        None => error(StatusCode::UNAUTHORIZED, "Access token required"),
    }
}

async fn list_resources(State(state): State<Shared>) -> Response {
    let users = state.lock().expect("stub state");
    Json(json!({"resources": users.resources})).into_response()
}

async fn create_resource(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut users = state.lock().expect("stub state");
    match bearer_email(&users, &headers) {
        None => error(StatusCode::UNAUTHORIZED, "Access token required"),
        Some((_, role)) if role != "admin" => error(StatusCode::FORBIDDEN, "Admin access required"),
        Some(_) => {
            users.next_id += 1;
            let resource = json!({"id": format!("r-{}", users.next_id), "title": body["title"]});
            users.resources.push(resource.clone());
            (StatusCode::CREATED, Json(json!({"resource": resource}))).into_response()
        }
    }
}

async fn delete_resource(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let mut users = state.lock().expect("stub state");
    match bearer_email(&users, &headers) {
        Some((_, role)) if role == "admin" => {
            let before = users.resources.len();
            users.resources.retain(|resource| resource["id"] != id.as_str());
            if users.resources.len() == before {
                error(StatusCode::NOT_FOUND, "Resource not found")
            } else {
                Json(json!({"deleted": id})).into_response()
            }
        }
        Some(_) => error(StatusCode::FORBIDDEN, "Admin access required"),
        None => error(StatusCode::UNAUTHORIZED, "Access token required"),
    }
}

/// Wraps a transport and counts every request handed to it.
pub struct SpyTransport<T> {
    inner: T,
    calls: AtomicUsize,
}

impl<T> SpyTransport<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T: Transport> Transport for SpyTransport<T> {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.send(request).await
    }
}
