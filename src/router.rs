/// Adopta HTTP routing module
///
/// This module provides the request/response types, routing and middleware
/// chain for the site. It allows for:
///
/// - Method- and path-parameter-based routing (`/mascotas/:id`, `/media/*path`)
/// - Global and route-specific pre-middleware, plus post-middleware
/// - Session resolution before any middleware runs, so guards can see the user
/// - Transport-free dispatch (`Router::dispatch`) served through axum by `Router::run`
/// - Template live-reload over a websocket while running in debug mode
///
use crate::auth::{self, CurrentUser};
use crate::error::{AppError, AppResult};
use crate::orm::Db;
use crate::payments::PaymentGateway;
use crate::settings::Settings;
use crate::storage::ObjectStorage;
use crate::template::Templates;
use axum::Router as AxumRouter;
use axum::body::{Body, Bytes};
use axum::extract::DefaultBodyLimit;
use axum::extract::ws::{Message, WebSocketUpgrade};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::get;
use notify::event::DataChange;
use notify::event::ModifyKind::Data;
use notify::{EventKind, RecursiveMode, Watcher};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

pub const FLASH_COOKIE: &str = "adopta_flash";

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Db>,
    pub settings: Settings,
    pub templates: Templates,
    pub storage: Arc<dyn ObjectStorage>,
    pub payments: Arc<dyn PaymentGateway>,
}

/// Represents the outcome of an HTTP handler.
/// Supports HTML, JSON, redirects, raw bytes and custom headers.
#[derive(Debug)]
pub struct Response {
    pub status_code: u16,
    pub body: Vec<u8>,
    pub headers: Vec<(String, String)>,
}

impl Response {
    fn with_content_type(status_code: u16, content_type: &str, body: Vec<u8>) -> Self {
        Response {
            status_code,
            body,
            headers: vec![("Content-Type".to_string(), content_type.to_string())],
        }
    }

    /// HTTP 200 with an HTML body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self::html(200, body)
    }

    pub fn html(status_code: u16, body: impl Into<String>) -> Self {
        Self::with_content_type(
            status_code,
            "text/html; charset=utf-8",
            body.into().into_bytes(),
        )
    }

    pub fn text(status_code: u16, body: impl Into<String>) -> Self {
        Self::with_content_type(
            status_code,
            "text/plain; charset=utf-8",
            body.into().into_bytes(),
        )
    }

    pub fn not_found() -> Self {
        Self::text(404, "404 Not Found")
    }

    pub fn method_not_allowed() -> Self {
        Self::text(405, "405 Method Not Allowed")
    }

    pub fn server_error() -> Self {
        Self::text(500, "500 Internal Server Error")
    }

    /// See-other redirect, so a POST is followed by a GET.
    pub fn redirect(location: impl Into<String>) -> Self {
        Response {
            status_code: 303,
            body: Vec::new(),
            headers: vec![("Location".to_string(), location.into())],
        }
    }

    pub fn bytes(content_type: &str, data: Vec<u8>) -> Self {
        Self::with_content_type(200, content_type, data)
    }

    /// Serialize `data` as JSON. A serialization failure becomes a 500 JSON error.
    pub fn json<T: Serialize>(data: T, status_code: u16) -> Self {
        let content_type = "application/json; charset=utf-8";
        match serde_json::to_vec(&data) {
            Ok(body) => Self::with_content_type(status_code, content_type, body),
            Err(e) => {
                log::error!("Response serialization failed: {}", e);
                Self::with_content_type(
                    500,
                    content_type,
                    b"{\"error\": \"Serialization failed\"}".to_vec(),
                )
            }
        }
    }

    /// Render an error for a JSON endpoint.
    pub fn json_error(err: &AppError) -> Self {
        Self::json(
            serde_json::json!({ "error": err.public_message() }),
            err.status_code(),
        )
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn with_cookie(self, cookie: impl Into<String>) -> Self {
        self.with_header("Set-Cookie", cookie)
    }

    /// Attach a one-shot notification shown on the next rendered page.
    pub fn with_flash(self, flash: Flash) -> Self {
        self.with_cookie(flash.to_cookie())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn cookies(&self) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("Set-Cookie"))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut builder = axum::http::Response::builder().status(status);
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }
        match builder.body(Body::from(self.body)) {
            Ok(resp) => resp,
            Err(e) => {
                log::error!("Failed to build HTTP response: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// Transient notification carried across one redirect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Flash {
    pub kind: String,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Flash {
            kind: "success".into(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Flash {
            kind: "error".into(),
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Flash {
            kind: "info".into(),
            message: message.into(),
        }
    }

    pub fn to_cookie(&self) -> String {
        format!(
            "{}={}:{}; Path=/; Max-Age=60; SameSite=Lax",
            FLASH_COOKIE,
            self.kind,
            urlencoding::encode(&self.message)
        )
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let (kind, message) = raw.split_once(':')?;
        let message = urlencoding::decode(message).ok()?.into_owned();
        Some(Flash {
            kind: kind.to_string(),
            message,
        })
    }

    pub fn clear_cookie() -> String {
        format!("{}=; Path=/; Max-Age=0; SameSite=Lax", FLASH_COOKIE)
    }
}

/// An incoming HTTP request, decoupled from the transport.
#[derive(Clone, Debug, Default)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    /// The undecoded query string, without the `?`.
    pub raw_query: String,
    /// Header names are lower-cased.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub user: Option<CurrentUser>,
}

impl Request {
    /// Build a request from a method and a target such as `/adopta?species=dog`.
    pub fn new(method: &str, target: &str) -> Self {
        let (path, raw_query) = target.split_once('?').unwrap_or((target, ""));
        Request {
            method: method.to_uppercase(),
            path: path.to_string(),
            query: parse_urlencoded(raw_query),
            raw_query: raw_query.to_string(),
            ..Default::default()
        }
    }

    pub fn get(target: &str) -> Self {
        Self::new("GET", target)
    }

    pub fn post(target: &str) -> Self {
        Self::new("POST", target)
    }

    pub fn from_http(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        let mut req = Self::new(method.as_str(), uri.path());
        if let Some(q) = uri.query() {
            req.query = parse_urlencoded(q);
            req.raw_query = q.to_string();
        }
        for (name, value) in headers.iter() {
            if let Ok(v) = value.to_str() {
                req.headers.insert(name.as_str().to_lowercase(), v.to_string());
            }
        }
        req.body = body.to_vec();
        req
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_lowercase(), value.into());
        self
    }

    pub fn with_cookie(self, name: &str, value: &str) -> Self {
        let existing = self.headers.get("cookie").cloned();
        let cookie = match existing {
            Some(c) => format!("{}; {}={}", c, name, value),
            None => format!("{}={}", name, value),
        };
        self.with_header("cookie", cookie)
    }

    pub fn with_form(mut self, fields: &[(&str, &str)]) -> Self {
        let body = fields
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        self.body = body.into_bytes();
        self.with_header("content-type", "application/x-www-form-urlencoded")
    }

    pub fn with_json<T: Serialize>(mut self, value: &T) -> Self {
        self.body = serde_json::to_vec(value).unwrap_or_default();
        self.with_header("content-type", "application/json")
    }

    pub fn with_body(mut self, content_type: &str, body: Vec<u8>) -> Self {
        self.body = body;
        self.with_header("content-type", content_type)
    }

    /// Path plus query string, as the client asked for it.
    pub fn target(&self) -> String {
        if self.raw_query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.raw_query)
        }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// A query value, treating empty strings as absent.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim())
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.header("cookie")?.split(';').find_map(|pair| {
            let (k, v) = pair.trim().split_once('=')?;
            (k == name).then(|| v.to_string())
        })
    }

    pub fn flash(&self) -> Option<Flash> {
        self.cookie(FLASH_COOKIE)
            .filter(|raw| !raw.is_empty())
            .and_then(|raw| Flash::parse(&raw))
    }

    /// Decode an `application/x-www-form-urlencoded` body.
    pub fn form(&self) -> HashMap<String, String> {
        parse_urlencoded(&String::from_utf8_lossy(&self.body))
    }

    pub fn json<T: DeserializeOwned>(&self) -> AppResult<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| AppError::InvalidInput(format!("Malformed JSON body: {}", e)))
    }
}

/// Parse `a=1&b=two+words` into a map. Later duplicates win.
pub fn parse_urlencoded(input: &str) -> HashMap<String, String> {
    input
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(k), decode_component(v))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}

/// Holds metadata about the current HTTP request and its extracted path parameters.
/// Middleware can modify/read this context.
pub struct RequestContext {
    pub method: String,
    pub path: String,
    /// Path plus query string.
    pub target: String,
    pub params: HashMap<String, String>,
    pub user: Option<CurrentUser>,
    pub start_time: Option<Instant>,
}

impl RequestContext {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

/// Async handler for an HTTP route.
pub type Handler =
    Arc<dyn Fn(Request, AppState) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync>;

/// Pre-processing middleware. Returning Some(Response) stops the chain and sends it.
pub type Middleware = Arc<dyn Fn(&mut RequestContext) -> Option<Response> + Send + Sync>;

/// Post-processing middleware, run on every response including short-circuited ones.
pub type PostMiddleware = Arc<dyn Fn(&RequestContext, Response) -> Response + Send + Sync>;

/// Wrap an async fn `(Request, AppState) -> Response` into a `Handler`.
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Request, AppState) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(move |req, state| Box::pin(f(req, state)))
}

#[derive(Clone)]
pub struct Route {
    pub method: String,
    pub path_pattern: String,
    pub handler: Handler,
    pub middlewares: Vec<Middleware>,
}

/// The application router.
#[derive(Clone, Default)]
pub struct Router {
    pub routes: Vec<Route>,
    pub middlewares: Vec<Middleware>,
    pub post_middlewares: Vec<PostMiddleware>,
    pub app_state: Option<AppState>,
}

/// Maps status codes to HTTP status text.
pub fn status_text(code: u16) -> &'static str {
    match code {
        200 => "OK",
        201 => "Created",
        303 => "See Other",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        _ => "Unknown",
    }
}

impl Router {
    pub fn new() -> Self {
        Router::default()
    }

    /// Register a route for `method` and `path_pattern` with route-specific middleware.
    pub fn add_route(
        &mut self,
        method: &str,
        path_pattern: &str,
        handler: Handler,
        middlewares: Vec<Middleware>,
    ) {
        self.routes.push(Route {
            method: method.to_uppercase(),
            path_pattern: path_pattern.to_string(),
            handler,
            middlewares,
        });
    }

    pub fn add_middleware(&mut self, middleware: Middleware) {
        self.middlewares.push(middleware);
    }

    pub fn add_post_middleware(&mut self, middleware: PostMiddleware) {
        self.post_middlewares.push(middleware);
    }

    pub fn set_app_state(&mut self, state: AppState) {
        self.app_state = Some(state);
    }

    /// Resolve the session, run the middleware chain and the matching handler.
    pub async fn dispatch(&self, mut req: Request) -> Response {
        let Some(state) = self.app_state.clone() else {
            log::error!("App state not set in Router");
            return Response::server_error();
        };

        if let Some(token) = req.cookie(auth::SESSION_COOKIE) {
            match auth::current_user(&state.db, &token, state.settings.session_ttl).await {
                Ok(user) => req.user = user,
                Err(e) => log::error!("Session lookup failed: {}", e),
            }
        }

        let mut ctx = RequestContext {
            method: req.method.clone(),
            path: req.path.clone(),
            target: req.target(),
            params: HashMap::new(),
            user: req.user.clone(),
            start_time: Some(Instant::now()),
        };

        let response = self.route_request(&mut ctx, req, state).await;
        self.post_middlewares
            .iter()
            .fold(response, |resp, post| post(&ctx, resp))
    }

    async fn route_request(
        &self,
        ctx: &mut RequestContext,
        mut req: Request,
        state: AppState,
    ) -> Response {
        for middleware in &self.middlewares {
            if let Some(response) = middleware(ctx) {
                return response;
            }
        }

        let mut path_matched = false;
        for route in &self.routes {
            let Some(params) = match_path(&route.path_pattern, &ctx.path) else {
                continue;
            };
            path_matched = true;
            if route.method != ctx.method {
                continue;
            }
            ctx.params = params;
            for middleware in &route.middlewares {
                if let Some(response) = middleware(ctx) {
                    return response;
                }
            }
            req.params = ctx.params.clone();
            req.user = ctx.user.clone();
            return (route.handler)(req, state).await;
        }

        if path_matched {
            Response::method_not_allowed()
        } else {
            Response::not_found()
        }
    }

    /// Build the axum application serving this router, plus live-reload when debugging.
    pub fn into_axum(self, settings: &Settings) -> AxumRouter {
        let router = Arc::new(self);
        let mut app = AxumRouter::new();

        if settings.debug {
            let (sender, _) = broadcast::channel::<String>(10);
            setup_reload_watcher(PathBuf::from(&settings.template.dir), sender.clone());
            app = app.route(
                "/ws/reload",
                get(move |ws: WebSocketUpgrade| {
                    let tx = sender.clone();
                    async move {
                        ws.on_upgrade(move |mut socket| async move {
                            let mut rx = tx.subscribe();
                            log::info!("Hot reload client connected");
                            while let Ok(msg) = rx.recv().await {
                                if socket.send(Message::Text(msg.into())).await.is_err() {
                                    break;
                                }
                            }
                        })
                    }
                }),
            );
        }

        app.fallback(
            move |method: Method, uri: Uri, headers: HeaderMap, body: Bytes| {
                let router = router.clone();
                async move {
                    let req = Request::from_http(method, uri, headers, body);
                    router.dispatch(req).await
                }
            },
        )
        .layer(DefaultBodyLimit::max(settings.storage.max_upload_bytes))
    }

    /// Serve the site on `settings.host:settings.port` until the listener fails.
    pub async fn run(
        self,
        settings: Settings,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = settings.http_addr();
        let app = self.into_axum(&settings);
        let listener = TcpListener::bind(&addr).await?;
        log::info!("HTTP server running on http://{}", addr);
        axum::serve(listener, app).await?;
        Ok(())
    }
}

/// Watches the template directory and broadcasts `reload` on content changes.
fn setup_reload_watcher(template_path: PathBuf, sender: broadcast::Sender<String>) {
    tokio::spawn(async move {
        let (tx, mut rx) = tokio::sync::mpsc::channel(32);
        let mut watcher = match notify::recommended_watcher(move |res| {
            let _ = tx.blocking_send(res);
        }) {
            Ok(w) => w,
            Err(e) => {
                log::error!("Failed to create template watcher: {}", e);
                return;
            }
        };

        if let Err(e) = watcher.watch(&template_path, RecursiveMode::Recursive) {
            log::error!("Failed to watch {}: {}", template_path.display(), e);
            return;
        }

        while let Some(res) = rx.recv().await {
            match res {
                Ok(event) => {
                    if let EventKind::Modify(Data(DataChange::Content)) = event.kind {
                        if let Some(name) = event
                            .paths
                            .first()
                            .and_then(|p| p.file_name())
                            .and_then(|n| n.to_str())
                        {
                            log::info!("Template changed: {}", name);
                            let _ = sender.send("reload".to_string());
                        }
                    }
                }
                Err(e) => log::error!("Watch error: {:?}", e),
            }
        }
    });
}

/// Redirects anonymous visitors to the login page, remembering where they were going.
pub fn login_required() -> Middleware {
    Arc::new(|ctx: &mut RequestContext| {
        if ctx.is_authenticated() {
            return None;
        }
        Some(
            Response::redirect(format!("/login?next={}", urlencoding::encode(&ctx.target)))
                .with_flash(Flash::error("Debes iniciar sesión para continuar.")),
        )
    })
}

/// Logs one line per request: method, path, status and elapsed time.
pub fn access_log() -> PostMiddleware {
    Arc::new(|ctx: &RequestContext, resp: Response| {
        let elapsed = ctx.start_time.map(|t| t.elapsed()).unwrap_or_default();
        log::info!(
            "{} {} -> {} {} ({:?})",
            ctx.method,
            ctx.path,
            resp.status_code,
            status_text(resp.status_code),
            elapsed
        );
        resp
    })
}

#[macro_export]
macro_rules! route {
    ($router:expr, $( $method:ident $path:expr => { $handler:expr $(, $middleware:expr )* } ),* $(,)?) => {
        $(
            $router.add_route(
                stringify!($method),
                $path,
                $crate::router::handler($handler),
                vec![$($middleware),*]
            );
        )*
    };
}

/// Matches a path pattern (e.g. `/foo/:id` or `/media/*rest`) against a real path,
/// extracting parameters into a HashMap if matched, or None if not.
pub fn match_path(pattern: &str, path: &str) -> Option<HashMap<String, String>> {
    let pattern_parts: Vec<&str> = pattern.trim_matches('/').split('/').collect();
    let path_parts: Vec<&str> = path.trim_matches('/').split('/').collect();

    let mut params = HashMap::new();

    for (i, p) in pattern_parts.iter().enumerate() {
        if let Some(name) = p.strip_prefix('*') {
            let rest = path_parts.get(i..)?.join("/");
            if rest.is_empty() {
                return None;
            }
            params.insert(name.to_string(), rest);
            return Some(params);
        }
        let a = path_parts.get(i)?;
        if let Some(name) = p.strip_prefix(':') {
            if a.is_empty() {
                return None;
            }
            params.insert(name.to_string(), a.to_string());
        } else if p != a {
            return None;
        }
    }

    if pattern_parts.len() != path_parts.len() {
        return None;
    }
    Some(params)
}
