use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use ndash::{
    AppState, api,
    auth::StaticOperator,
    config::{AppConfig, SessionConfig, UpstreamConfig},
    powerdns::{
        DnsApi,
        client::UpstreamError,
        types::{RrsetPatch, Server, StatEntry, Zone},
    },
    session::{InMemorySessionStore, SessionGate},
};
use serde_json::{Value, json};
use tower::ServiceExt;

/// What the stub answers for reads that are not served from its zone table.
#[derive(Clone, Copy)]
enum Mode {
    Healthy,
    Timeout,
    NotFound,
}

/// In-memory PowerDNS stand-in that counts every call.
struct StubDns {
    mode: Mode,
    calls: AtomicUsize,
    zones: Mutex<Vec<Zone>>,
    patches: Mutex<Vec<RrsetPatch>>,
}

impl StubDns {
    fn new(mode: Mode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            calls: AtomicUsize::new(0),
            zones: Mutex::new(Vec::new()),
            patches: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Result<(), UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            Mode::Timeout => Err(UpstreamError::Unreachable(
                "request timed out: operation timed out".into(),
            )),
            _ => Ok(()),
        }
    }

    fn servers() -> Vec<Server> {
        serde_json::from_value(json!([{
            "id": "localhost",
            "daemon_type": "authoritative",
            "version": "4.9.1",
            "type": "Server",
            "url": "/api/v1/servers/localhost",
            "config_url": "/api/v1/servers/localhost/config{/config_setting}",
            "zones_url": "/api/v1/servers/localhost/zones{/zone}"
        }]))
        .unwrap()
    }
}

#[async_trait]
impl DnsApi for StubDns {
    async fn list_servers(&self) -> Result<Vec<Server>, UpstreamError> {
        self.enter()?;
        Ok(Self::servers())
    }

    async fn list_zones(&self, _server_id: &str) -> Result<Vec<Zone>, UpstreamError> {
        self.enter()?;
        Ok(self.zones.lock().unwrap().clone())
    }

    async fn get_zone(&self, _server_id: &str, zone_id: &str) -> Result<Zone, UpstreamError> {
        self.enter()?;
        if let Mode::NotFound = self.mode {
            return Err(UpstreamError::Rejected {
                status: 404,
                body: "Not Found".into(),
            });
        }
        self.zones
            .lock()
            .unwrap()
            .iter()
            .find(|z| z.id == zone_id)
            .cloned()
            .ok_or(UpstreamError::Rejected {
                status: 404,
                body: "Not Found".into(),
            })
    }

    async fn create_zone(&self, _server_id: &str, spec: &Value) -> Result<Zone, UpstreamError> {
        self.enter()?;
        let mut zone = spec.clone();
        zone["id"] = zone["name"].clone();
        zone["serial"] = json!(2024060101u64);
        zone["rrsets"] = json!([]);
        let zone: Zone = serde_json::from_value(zone)
            .map_err(|e| UpstreamError::Malformed(e.to_string()))?;
        self.zones.lock().unwrap().push(zone.clone());
        Ok(zone)
    }

    async fn delete_zone(&self, _server_id: &str, zone_id: &str) -> Result<(), UpstreamError> {
        self.enter()?;
        self.zones.lock().unwrap().retain(|z| z.id != zone_id);
        Ok(())
    }

    async fn patch_rrsets(
        &self,
        _server_id: &str,
        _zone_id: &str,
        patch: &RrsetPatch,
    ) -> Result<(), UpstreamError> {
        self.enter()?;
        self.patches.lock().unwrap().push(patch.clone());
        Ok(())
    }

    async fn get_statistics(&self, _server_id: &str) -> Result<Vec<StatEntry>, UpstreamError> {
        self.enter()?;
        Ok(serde_json::from_value(json!([
            { "name": "uptime", "type": "StatisticItem", "value": "42" },
            { "name": "response-by-qtype", "type": "MapStatisticItem",
              "value": [{ "name": "A", "value": "7" }] }
        ]))
        .unwrap())
    }
}

fn app(stub: Arc<StubDns>) -> Router {
    app_with(stub, SessionConfig::default())
}

fn app_with(stub: Arc<StubDns>, session: SessionConfig) -> Router {
    let gate = SessionGate::new(
        Arc::new(StaticOperator::new("admin", "admin123")),
        Arc::new(InMemorySessionStore::new()),
        session.clone(),
    );
    let state = Arc::new(AppState {
        config: AppConfig {
            upstream: UpstreamConfig {
                base_url: "http://127.0.0.1:8081".into(),
                api_key: "unused".into(),
                timeout: Duration::from_secs(1),
            },
            session,
        },
        pdns: stub,
        gate,
    });
    api::create_router(state)
}

async fn send(app: &Router, method: Method, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Response {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        req = req.header(header::COOKIE, cookie);
    }
    let req = match body {
        Some(body) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(req).await.unwrap()
}

async fn json_body(resp: Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Log in and return the `name=value` cookie pair.
async fn login(app: &Router) -> String {
    let resp = send(
        app,
        Method::POST,
        "/login",
        None,
        Some(json!({ "username": "admin", "password": "admin123" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let set_cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(set_cookie.contains("HttpOnly"));
    assert_eq!(json_body(resp).await, json!({ "success": true }));

    set_cookie.split(';').next().unwrap().to_string()
}

#[tokio::test]
async fn login_then_list_servers_verbatim() {
    let stub = StubDns::new(Mode::Healthy);
    let app = app(stub.clone());
    let cookie = login(&app).await;

    let resp = send(&app, Method::GET, "/api/servers", Some(&cookie), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        json_body(resp).await,
        serde_json::to_value(StubDns::servers()).unwrap()
    );
    assert_eq!(stub.calls(), 1);
}

#[tokio::test]
async fn wrong_password_is_401_without_cookie() {
    let app = app(StubDns::new(Mode::Healthy));
    let resp = send(
        &app,
        Method::POST,
        "/login",
        None,
        Some(json!({ "username": "admin", "password": "letmein" })),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(json_body(resp).await["error"], "Invalid username or password");
}

#[tokio::test]
async fn cookie_flags_follow_session_config() {
    let session = SessionConfig {
        ttl: chrono::Duration::minutes(30),
        secure_cookie: true,
    };
    let app = app_with(StubDns::new(Mode::Healthy), session);

    let resp = send(
        &app,
        Method::POST,
        "/login",
        None,
        Some(json!({ "username": "admin", "password": "admin123" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let set_cookie = resp.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(set_cookie.contains("Max-Age=1800"));
    assert!(set_cookie.ends_with("; Secure"));
    let cookie = set_cookie.split(';').next().unwrap().to_string();

    let resp = send(&app, Method::GET, "/logout", Some(&cookie), None).await;
    let cleared = resp.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cleared.contains("Max-Age=0"));
    assert!(cleared.ends_with("; Secure"));
}

#[tokio::test]
async fn form_login_is_accepted() {
    let app = app(StubDns::new(Mode::Healthy));
    let req = Request::builder()
        .method(Method::POST)
        .uri("/login")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("username=admin&password=admin123"))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get(header::SET_COOKIE).is_some());
}

#[tokio::test]
async fn protected_api_rejects_without_touching_upstream() {
    let stub = StubDns::new(Mode::Healthy);
    let app = app(stub.clone());
    let zone = json!({ "name": "a.test.", "kind": "Native" });
    let patch = json!({ "rrsets": [] });

    let requests = [
        (Method::GET, "/api/servers", None),
        (Method::GET, "/api/servers/localhost/zones", None),
        (Method::GET, "/api/servers/localhost/zones/a.test.", None),
        (Method::POST, "/api/servers/localhost/zones", Some(zone)),
        (Method::DELETE, "/api/servers/localhost/zones/a.test.", None),
        (Method::PATCH, "/api/servers/localhost/zones/a.test.", Some(patch)),
        (Method::GET, "/api/servers/localhost/statistics", None),
    ];

    for cookie in [None, Some("ndash_session=forged-token")] {
        for (method, uri, body) in requests.iter().cloned() {
            let resp = send(&app, method.clone(), uri, cookie, body).await;
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
            assert_eq!(json_body(resp).await["status"], 401);
        }
    }
    assert_eq!(stub.calls(), 0);
}

#[tokio::test]
async fn pages_redirect_to_login() {
    let app = app(StubDns::new(Mode::Healthy));
    for page in ["/", "/zones", "/statistics", "/settings"] {
        let resp = send(&app, Method::GET, page, None, None).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER, "{page}");
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/login");
    }
}

#[tokio::test]
async fn pages_render_with_session() {
    let app = app(StubDns::new(Mode::Healthy));
    let cookie = login(&app).await;

    let resp = send(&app, Method::GET, "/zones", Some(&cookie), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(
        resp.headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );

    let resp = send(&app, Method::GET, "/login", Some(&cookie), None).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/");
}

#[tokio::test]
async fn logout_ends_session() {
    let stub = StubDns::new(Mode::Healthy);
    let app = app(stub.clone());
    let cookie = login(&app).await;

    let resp = send(&app, Method::GET, "/logout", Some(&cookie), None).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/login");
    assert!(
        resp.headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .contains("Max-Age=0")
    );

    let resp = send(&app, Method::GET, "/api/servers", Some(&cookie), None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(stub.calls(), 0);
}

#[tokio::test]
async fn upstream_404_is_mirrored() {
    let stub = StubDns::new(Mode::NotFound);
    let app = app(stub.clone());
    let cookie = login(&app).await;

    let resp = send(
        &app,
        Method::GET,
        "/api/servers/localhost/zones/missing.test.",
        Some(&cookie),
        None,
    )
    .await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(resp).await,
        json!({ "error": "Not Found", "status": 404 })
    );
    assert_eq!(stub.calls(), 1);
}

#[tokio::test]
async fn upstream_timeout_is_502_and_not_retried() {
    let stub = StubDns::new(Mode::Timeout);
    let app = app(stub.clone());
    let cookie = login(&app).await;

    let resp = send(&app, Method::GET, "/api/servers", Some(&cookie), None).await;

    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(resp).await;
    assert!(body["error"].as_str().unwrap().contains("timed out"));
    assert_eq!(stub.calls(), 1);
}

#[tokio::test]
async fn created_zone_reads_back_unchanged() {
    let stub = StubDns::new(Mode::Healthy);
    let app = app(stub.clone());
    let cookie = login(&app).await;

    let spec = json!({
        "name": "example.org.",
        "kind": "Master",
        "nameservers": ["ns1.example.net."],
        "soa_edit_api": "INCEPTION-INCREMENT"
    });
    let resp = send(
        &app,
        Method::POST,
        "/api/servers/localhost/zones",
        Some(&cookie),
        Some(spec),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let created = json_body(resp).await;
    assert_eq!(created["id"], "example.org.");
    assert_eq!(created["kind"], "Master");
    assert_eq!(created["soa_edit_api"], "INCEPTION-INCREMENT");

    let resp = send(
        &app,
        Method::GET,
        "/api/servers/localhost/zones/example.org.",
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let fetched = json_body(resp).await;
    assert_eq!(fetched, created);

    let resp = send(&app, Method::GET, "/api/servers/localhost/zones", Some(&cookie), None).await;
    assert_eq!(json_body(resp).await.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn patch_forwards_change_set_once() {
    let stub = StubDns::new(Mode::Healthy);
    let app = app(stub.clone());
    let cookie = login(&app).await;

    let patch = json!({
        "rrsets": [
            { "name": "www.example.org.", "type": "A", "ttl": 300, "changetype": "REPLACE",
              "records": [{ "content": "192.0.2.10", "disabled": false }] },
            { "name": "old.example.org.", "type": "CNAME", "changetype": "DELETE", "records": [] }
        ]
    });
    let resp = send(
        &app,
        Method::PATCH,
        "/api/servers/localhost/zones/example.org.",
        Some(&cookie),
        Some(patch.clone()),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await, json!({ "success": true }));
    assert_eq!(stub.calls(), 1);

    let patches = stub.patches.lock().unwrap();
    assert_eq!(patches.len(), 1);
    assert_eq!(serde_json::to_value(&patches[0]).unwrap(), patch);
}

#[tokio::test]
async fn bad_change_type_is_400() {
    let stub = StubDns::new(Mode::Healthy);
    let app = app(stub.clone());
    let cookie = login(&app).await;

    let resp = send(
        &app,
        Method::PATCH,
        "/api/servers/localhost/zones/example.org.",
        Some(&cookie),
        Some(json!({ "rrsets": [{ "name": "x.", "type": "A", "changetype": "UPSERT" }] })),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["status"], 400);
    assert_eq!(stub.calls(), 0);
}

#[tokio::test]
async fn invalid_path_params_are_400() {
    let stub = StubDns::new(Mode::Healthy);
    let app = app(stub.clone());
    let cookie = login(&app).await;

    let resp = send(&app, Method::GET, "/api/servers//zones", Some(&cookie), None).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(resp).await["error"],
        "missing path parameter 'serverId'"
    );

    for uri in [
        "/api/servers/%20/zones",
        "/api/servers/localhost/zones/a%2Fb",
        "/api/servers/localhost/zones/..",
    ] {
        let resp = send(&app, Method::GET, uri, Some(&cookie), None).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
    }

    let resp = send(
        &app,
        Method::POST,
        "/api/servers/localhost/zones",
        Some(&cookie),
        Some(json!(["not", "an", "object"])),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(stub.calls(), 0);
}

#[tokio::test]
async fn delete_and_statistics() {
    let stub = StubDns::new(Mode::Healthy);
    let app = app(stub.clone());
    let cookie = login(&app).await;

    let resp = send(
        &app,
        Method::DELETE,
        "/api/servers/localhost/zones/gone.test.",
        Some(&cookie),
        None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await, json!({ "success": true }));

    let resp = send(&app, Method::GET, "/api/servers/localhost/statistics", Some(&cookie), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let stats = json_body(resp).await;
    assert_eq!(stats[0], json!({ "name": "uptime", "type": "StatisticItem", "value": "42" }));
    assert_eq!(stats[1]["value"][0]["name"], "A");
    assert_eq!(stub.calls(), 2);
}

#[tokio::test]
async fn unknown_routes() {
    let app = app(StubDns::new(Mode::Healthy));

    let resp = send(&app, Method::GET, "/api/nope", None, None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(resp).await["error"], "not found");

    let resp = send(&app, Method::GET, "/no-such-page", None, None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = send(&app, Method::GET, "/static/app.js", None, None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("x-content-type-options").unwrap(), "nosniff");
}
