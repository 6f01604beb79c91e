//! Integration tests for the gateway: request ids, the authentication gate,
//! proxying to mock upstreams, error mapping, and graceful shutdown.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::{any, get};
use axum::{Json, Router};
use futures::StreamExt;
use serde_json::{json, Value};

use gatehouse::config::model::{Config, ProxySettings, UpstreamAddrs};
use gatehouse::middleware::auth::{AuthError, Claims, CredentialVerifier, PresenceVerifier};
use gatehouse::routes::{RouteEntry, RouteTable};
use gatehouse::server::{self, GatewayState};
use gatehouse::upstream::Service;

struct MockUpstream {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl MockUpstream {
    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn echo(
    State(hits): State<Arc<AtomicUsize>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    hits.fetch_add(1, Ordering::SeqCst);
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(String::from);
    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "body": String::from_utf8_lossy(&body),
        "authorization": header("authorization"),
        "request_id": header("x-request-id"),
        "forwarded_for": header("x-forwarded-for"),
        "host": header("host"),
    }))
}

async fn slow(State(hits): State<Arc<AtomicUsize>>) -> &'static str {
    hits.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(2)).await;
    "too late"
}

async fn teapot() -> impl IntoResponse {
    (
        StatusCode::IM_A_TEAPOT,
        [("x-upstream", "yes")],
        "short and stout",
    )
}

/// Headers and one chunk, then nothing.
async fn stall() -> Body {
    let chunks = futures::stream::iter([Ok::<_, std::io::Error>(Bytes::from("partial"))])
        .chain(futures::stream::pending());
    Body::from_stream(chunks)
}

async fn spawn_upstream() -> MockUpstream {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/slow", any(slow))
        .route("/teapot", get(teapot))
        .route("/stall", get(stall))
        .fallback(echo)
        .with_state(Arc::clone(&hits));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockUpstream { addr, hits }
}

/// An address nothing is listening on.
async fn dead_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

fn config_for(auth: SocketAddr, user: SocketAddr, basket: SocketAddr) -> Config {
    Config {
        upstreams: UpstreamAddrs {
            auth: Some(auth.to_string()),
            user: Some(user.to_string()),
            basket: Some(basket.to_string()),
        },
        ..Config::default()
    }
}

async fn start_gateway(
    config: &Config,
    routes: RouteTable,
    verifier: Arc<dyn CredentialVerifier>,
) -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
    let state = GatewayState::from_config(config, routes, verifier).unwrap();
    let router = server::build_router(&state);
    serve(router).await
}

async fn serve(router: Router) -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .await
        .unwrap();
    });

    (addr, shutdown_tx)
}

/// Three mock services behind a gateway with the standard routes.
async fn standard_setup() -> (
    SocketAddr,
    tokio::sync::oneshot::Sender<()>,
    [MockUpstream; 3],
) {
    let auth = spawn_upstream().await;
    let user = spawn_upstream().await;
    let basket = spawn_upstream().await;
    let config = config_for(auth.addr, user.addr, basket.addr);
    let (addr, shutdown) =
        start_gateway(&config, RouteTable::standard(), Arc::new(PresenceVerifier)).await;
    (addr, shutdown, [auth, user, basket])
}

fn request_id(resp: &reqwest::Response) -> String {
    resp.headers()
        .get("x-request-id")
        .expect("x-request-id header")
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn login_is_forwarded_to_auth_with_body() {
    let (addr, shutdown, [auth, user, basket]) = standard_setup().await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/login?next=%2Fhome"))
        .body(r#"{"user":"ana","password":"pw"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let rid = request_id(&resp);

    let echoed: Value = resp.json().await.unwrap();
    assert_eq!(echoed["method"], "POST");
    assert_eq!(echoed["path"], "/login");
    assert_eq!(echoed["query"], "next=%2Fhome");
    assert_eq!(echoed["body"], r#"{"user":"ana","password":"pw"}"#);
    assert_eq!(echoed["request_id"], rid.as_str());
    assert_eq!(echoed["forwarded_for"], "127.0.0.1");
    assert_eq!(echoed["host"], auth.addr.to_string().as_str());

    assert_eq!(auth.hits(), 1);
    assert_eq!(user.hits(), 0);
    assert_eq!(basket.hits(), 0);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn signup_is_forwarded_to_auth() {
    let (addr, shutdown, [auth, _, _]) = standard_setup().await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/signup"))
        .body("new user")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let echoed: Value = resp.json().await.unwrap();
    assert_eq!(echoed["path"], "/signup");
    assert_eq!(echoed["body"], "new user");
    assert_eq!(auth.hits(), 1);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn every_response_gets_a_fresh_request_id() {
    let (addr, shutdown, [auth, _, _]) = standard_setup().await;
    let client = reqwest::Client::new();

    let requests = (0..20).map(|_| {
        let client = client.clone();
        async move {
            let resp = client
                .post(format!("http://{addr}/login"))
                .header("x-request-id", "client-chosen")
                .send()
                .await
                .unwrap();
            request_id(&resp)
        }
    });
    let ids: Vec<String> = join_spawned(requests).await;

    let unique: HashSet<&String> = ids.iter().collect();
    assert_eq!(unique.len(), 20);
    assert!(ids.iter().all(|id| !id.is_empty() && id != "client-chosen"));
    assert_eq!(auth.hits(), 20);

    let _ = shutdown.send(());
}

/// Run futures concurrently on the test runtime.
async fn join_spawned<F>(futures: impl Iterator<Item = F>) -> Vec<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    let handles: Vec<_> = futures.map(tokio::spawn).collect();
    let mut out = Vec::with_capacity(handles.len());
    for handle in handles {
        out.push(handle.await.unwrap());
    }
    out
}

#[tokio::test]
async fn private_route_without_credential_is_rejected() {
    let (addr, shutdown, [_, user, basket]) = standard_setup().await;
    let client = reqwest::Client::new();

    for path in ["/private/profile", "/private/basket"] {
        let resp = client
            .get(format!("http://{addr}{path}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);
        assert!(!request_id(&resp).is_empty());
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body, json!({"error": "not authenticated"}));
    }

    let resp = client
        .put(format!("http://{addr}/private/basket"))
        .header("authorization", "Bearer ")
        .body("[]")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    assert_eq!(user.hits(), 0);
    assert_eq!(basket.hits(), 0);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn private_route_with_credential_reaches_upstream() {
    let (addr, shutdown, [_, user, basket]) = standard_setup().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{addr}/private/profile"))
        .header("authorization", "Bearer abc123")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let echoed: Value = resp.json().await.unwrap();
    assert_eq!(echoed["method"], "GET");
    assert_eq!(echoed["path"], "/private/profile");
    assert_eq!(echoed["authorization"], "Bearer abc123");

    let resp = client
        .put(format!("http://{addr}/private/basket"))
        .header("authorization", "abc123")
        .body(r#"["apple"]"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let echoed: Value = resp.json().await.unwrap();
    assert_eq!(echoed["method"], "PUT");
    assert_eq!(echoed["body"], r#"["apple"]"#);

    assert_eq!(user.hits(), 1);
    assert_eq!(basket.hits(), 1);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn repeated_requests_are_not_cached() {
    let (addr, shutdown, [_, user, _]) = standard_setup().await;
    let client = reqwest::Client::new();

    for _ in 0..2 {
        let resp = client
            .get(format!("http://{addr}/private/profile"))
            .header("authorization", "token")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }
    assert_eq!(user.hits(), 2);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn wrong_method_on_known_path_is_not_found() {
    let (addr, shutdown, [auth, user, _]) = standard_setup().await;
    let client = reqwest::Client::new();

    let resp = client
        .delete(format!("http://{addr}/login"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"error": "not found"}));

    // The gate only wraps registered methods, so no 401 here.
    let resp = client
        .delete(format!("http://{addr}/private/profile"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    assert_eq!(auth.hits(), 0);
    assert_eq!(user.hits(), 0);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn unmatched_route_returns_404() {
    let (addr, shutdown, _upstreams) = standard_setup().await;

    let resp = reqwest::get(format!("http://{addr}/nonexistent")).await.unwrap();
    assert_eq!(resp.status(), 404);
    assert!(!request_id(&resp).is_empty());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"error": "not found"}));

    let _ = shutdown.send(());
}

#[tokio::test]
async fn unreachable_upstream_is_bad_gateway() {
    let user = spawn_upstream().await;
    let basket = spawn_upstream().await;
    let config = config_for(dead_addr().await, user.addr, basket.addr);
    let (addr, shutdown) =
        start_gateway(&config, RouteTable::standard(), Arc::new(PresenceVerifier)).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/login"))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);
    assert!(!request_id(&resp).is_empty());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"error": "upstream unreachable"}));

    let _ = shutdown.send(());
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let upstream = spawn_upstream().await;
    let mut config = config_for(upstream.addr, upstream.addr, upstream.addr);
    config.proxy = ProxySettings {
        timeout_ms: 100,
        ..ProxySettings::default()
    };
    let routes =
        RouteTable::new(vec![RouteEntry::public("/slow", &[Method::GET], Service::User)]).unwrap();
    let (addr, shutdown) = start_gateway(&config, routes, Arc::new(PresenceVerifier)).await;

    let started = std::time::Instant::now();
    let resp = reqwest::get(format!("http://{addr}/slow")).await.unwrap();
    assert_eq!(resp.status(), 502);
    assert!(started.elapsed() < Duration::from_secs(2));
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"error": "upstream timed out"}));
    assert_eq!(upstream.hits(), 1);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let auth = spawn_upstream().await;
    let mut config = config_for(auth.addr, auth.addr, auth.addr);
    config.proxy.max_body = 16;
    let (addr, shutdown) =
        start_gateway(&config, RouteTable::standard(), Arc::new(PresenceVerifier)).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/login"))
        .body("x".repeat(1024))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 413);
    assert!(!request_id(&resp).is_empty());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"error": "request body too large"}));
    assert_eq!(auth.hits(), 0);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn chunked_oversized_body_is_rejected() {
    let auth = spawn_upstream().await;
    let mut config = config_for(auth.addr, auth.addr, auth.addr);
    config.proxy.max_body = 16;
    let (addr, shutdown) =
        start_gateway(&config, RouteTable::standard(), Arc::new(PresenceVerifier)).await;

    // No content-length: the limit only trips while the body streams.
    let chunks = futures::stream::iter(
        (0..8).map(|_| Ok::<_, std::io::Error>(Bytes::from(vec![b'x'; 64]))),
    );
    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/login"))
        .body(reqwest::Body::wrap_stream(chunks))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 413);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"error": "request body too large"}));
    assert_eq!(auth.hits(), 0);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn upstream_error_status_and_headers_are_relayed() {
    let user = spawn_upstream().await;
    let config = config_for(user.addr, user.addr, user.addr);
    let routes =
        RouteTable::new(vec![RouteEntry::public("/teapot", &[Method::GET], Service::User)])
            .unwrap();
    let (addr, shutdown) = start_gateway(&config, routes, Arc::new(PresenceVerifier)).await;

    let resp = reqwest::Client::new()
        .get(format!("http://{addr}/teapot"))
        .header("origin", "https://shop.example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 418);
    assert_eq!(resp.headers().get("x-upstream").unwrap(), "yes");
    assert_eq!(
        resp.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
    assert!(!request_id(&resp).is_empty());
    assert_eq!(resp.text().await.unwrap(), "short and stout");

    let _ = shutdown.send(());
}

#[tokio::test]
async fn stalled_upstream_body_is_cut_off() {
    let user = spawn_upstream().await;
    let mut config = config_for(user.addr, user.addr, user.addr);
    config.proxy.timeout_ms = 200;
    let routes =
        RouteTable::new(vec![RouteEntry::public("/stall", &[Method::GET], Service::User)])
            .unwrap();
    let (addr, shutdown) = start_gateway(&config, routes, Arc::new(PresenceVerifier)).await;

    let resp = reqwest::get(format!("http://{addr}/stall")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body = tokio::time::timeout(Duration::from_secs(2), resp.bytes())
        .await
        .expect("gateway kept the stalled body open");
    assert!(body.is_err());

    let _ = shutdown.send(());
}

#[tokio::test]
async fn responses_allow_any_origin() {
    let (addr, shutdown, [auth, _, _]) = standard_setup().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{addr}/login"))
        .header("origin", "https://shop.example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );

    let resp = client
        .request(
            reqwest::Method::OPTIONS,
            format!("http://{addr}/private/basket"),
        )
        .header("origin", "https://shop.example.com")
        .header("access-control-request-method", "PUT")
        .header("access-control-request-headers", "authorization")
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
    assert_eq!(auth.hits(), 1);

    let _ = shutdown.send(());
}

struct RoleVerifier;

impl CredentialVerifier for RoleVerifier {
    fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        match token {
            "admin-token" => Ok(Claims {
                subject: Some("root".into()),
                roles: vec!["admin".into()],
            }),
            "user-token" => Ok(Claims {
                subject: Some("ana".into()),
                roles: Vec::new(),
            }),
            _ => Err(AuthError::InvalidCredential("unknown token".into())),
        }
    }
}

#[tokio::test]
async fn roles_are_enforced_by_the_gate() {
    let user = spawn_upstream().await;
    let config = config_for(user.addr, user.addr, user.addr);
    let routes = RouteTable::new(vec![
        RouteEntry::private("/admin", &[Method::GET], Service::User).with_roles(&["admin"]),
    ])
    .unwrap();
    let (addr, shutdown) = start_gateway(&config, routes, Arc::new(RoleVerifier)).await;
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/private/admin");

    let resp = client
        .get(&url)
        .header("authorization", "Bearer forged")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .get(&url)
        .header("authorization", "Bearer user-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"error": "missing required role 'admin'"}));
    assert_eq!(user.hits(), 0);

    let resp = client
        .get(&url)
        .header("authorization", "Bearer admin-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(user.hits(), 1);

    let _ = shutdown.send(());
}

async fn explode() -> &'static str {
    panic!("handler exploded")
}

#[tokio::test]
async fn panicking_handler_returns_500_with_request_id() {
    let router = server::with_middleware(Router::new().route("/boom", get(explode)), 1024);
    let (addr, shutdown) = serve(router).await;

    let resp = reqwest::get(format!("http://{addr}/boom")).await.unwrap();
    assert_eq!(resp.status(), 500);
    assert!(!request_id(&resp).is_empty());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"error": "internal server error"}));

    // The server survives.
    let resp = reqwest::get(format!("http://{addr}/other")).await.unwrap();
    assert_eq!(resp.status(), 404);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn missing_upstream_fails_at_startup() {
    let auth = spawn_upstream().await;
    let config = Config {
        upstreams: UpstreamAddrs {
            auth: Some(auth.addr.to_string()),
            user: None,
            basket: Some("url BasketService".into()),
        },
        ..Config::default()
    };

    let result = GatewayState::from_config(&config, RouteTable::standard(), Arc::new(PresenceVerifier));
    assert!(result.is_err());
}

#[tokio::test]
async fn graceful_shutdown_works() {
    let (addr, shutdown, _upstreams) = standard_setup().await;

    let url = format!("http://{addr}/nonexistent");
    assert!(reqwest::get(&url).await.is_ok());

    let _ = shutdown.send(());

    tokio::time::sleep(Duration::from_millis(100)).await;

    let result = reqwest::get(&url).await;
    assert!(result.is_err());
}
