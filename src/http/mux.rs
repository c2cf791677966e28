//! JSON-RPC mux: method groups mounted on HTTP paths.
//!
//! # Responsibilities
//! - Mount a method group (registry + dispatcher + middleware list) per path
//! - Let unrelated routes (health, metrics) share the same router
//! - Apply the HTTP middleware stack once everything is mounted
//!
//! # Design Decisions
//! - Every method group owns its registry; the container is shared
//! - A path ending in '/' also serves everything below it
//! - Path conflicts are reported as errors instead of router panics

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::HeaderMap,
    routing::{post, MethodRouter},
    Json, Router,
};
use thiserror::Error;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::di::Container;
use crate::http::request;
use crate::rpc::{DispatchOptions, Dispatcher, MethodDeclaration, MethodRegistry, Middleware, RegistrationError, Reply};

/// Error type for mounting routes.
#[derive(Debug, Error)]
pub enum MuxError {
    #[error("path must start with '/' and contain no captures: {0:?}")]
    InvalidPath(String),

    #[error("path already registered: {0}")]
    PathInUse(String),

    #[error("error registering method: {0}")]
    Registration(#[from] RegistrationError),
}

/// Router builder serving JSON-RPC method groups next to plain routes.
pub struct RpcMux {
    router: Router,
    container: Arc<Container>,
    options: DispatchOptions,
    paths: HashSet<String>,
}

impl RpcMux {
    pub fn new(container: Arc<Container>) -> Self {
        Self {
            router: Router::new(),
            container,
            options: DispatchOptions::default(),
            paths: HashSet::new(),
        }
    }

    /// Options for every dispatcher mounted after this call.
    pub fn with_options(mut self, options: DispatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    /// Register `methods` under `path`, wrapped by `middlewares` (first is outermost).
    ///
    /// Returns the group's registry. Nothing is mounted if any method fails
    /// to register.
    pub fn register_methods(
        &mut self,
        path: &str,
        methods: Vec<MethodDeclaration>,
        middlewares: Vec<Middleware>,
    ) -> Result<Arc<MethodRegistry>, MuxError> {
        if path.contains(['{', '}']) {
            return Err(MuxError::InvalidPath(path.to_string()));
        }
        self.check_path(path)?;

        let registry = Arc::new(MethodRegistry::new(self.container.clone()));
        for method in methods {
            registry.register(method)?;
        }

        let dispatcher = Arc::new(
            Dispatcher::new(registry.clone(), middlewares).with_options(self.options.clone()),
        );
        let endpoint = post(rpc_endpoint).with_state(dispatcher);

        let mut router = std::mem::take(&mut self.router).route(path, endpoint.clone());
        if path.ends_with('/') {
            router = router.route(&format!("{path}{{*rest}}"), endpoint);
        }
        self.router = router;
        self.paths.insert(path.to_string());

        tracing::info!(path = %path, methods = ?registry.method_names(), "Mounted JSON-RPC methods");
        Ok(registry)
    }

    /// Mount a plain route next to the rpc endpoints.
    pub fn route(&mut self, path: &str, method_router: MethodRouter) -> Result<(), MuxError> {
        self.check_path(path)?;
        self.router = std::mem::take(&mut self.router).route(path, method_router);
        self.paths.insert(path.to_string());
        Ok(())
    }

    /// Mounted paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.paths.iter().cloned().collect();
        paths.sort();
        paths
    }

    /// Finish the router, applying the HTTP middleware stack.
    #[allow(deprecated)]
    pub fn into_router(self, config: &ServerConfig) -> Router {
        self.router
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(config.rpc.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    fn check_path(&self, path: &str) -> Result<(), MuxError> {
        if !path.starts_with('/') {
            return Err(MuxError::InvalidPath(path.to_string()));
        }
        if self.paths.contains(path) {
            return Err(MuxError::PathInUse(path.to_string()));
        }
        Ok(())
    }
}

/// POST handler shared by every mounted method group.
async fn rpc_endpoint(
    State(dispatcher): State<Arc<Dispatcher>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Reply> {
    let inbound = request::inbound_context(&headers, dispatcher.options().request_timeout);
    // Cancels every call of this request if the connection goes away.
    let _guard = inbound.cancellation_token().clone().drop_guard();

    tracing::debug!(
        request_id = request::request_id(&headers).unwrap_or("-"),
        bytes = body.len(),
        "JSON-RPC request"
    );
    Json(dispatcher.dispatch(&body, &inbound).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::{ResolveError, Scope};
    use crate::rpc::{BaseHandler, Handler, RequestContext, RpcError};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    #[derive(Default)]
    struct Echo {
        base: BaseHandler,
    }

    impl Handler for Echo {
        type Params = Value;
        type Output = Value;

        fn provide(_: &Scope<'_>) -> Result<Self, ResolveError> {
            Ok(Self::default())
        }

        fn set_context(&mut self, ctx: RequestContext) {
            self.base.set_context(ctx);
        }

        fn context(&self) -> Option<&RequestContext> {
            self.base.context()
        }

        async fn handle(&self, params: Value) -> Result<Value, RpcError> {
            Ok(json!({
                "params": params,
                "request_id": self.context().and_then(|c| c.request_id()),
            }))
        }
    }

    fn mux() -> RpcMux {
        let mut mux = RpcMux::new(Arc::new(Container::new()));
        mux.register_methods("/rpc/v1/", vec![MethodDeclaration::of::<Echo>("echo")], vec![])
            .unwrap();
        mux.route("/health", get(|| async { StatusCode::OK })).unwrap();
        mux
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_post_dispatches() {
        let router = mux().into_router(&ServerConfig::default());
        let response = router
            .oneshot(post_json("/rpc/v1/", r#"{"jsonrpc":"2.0","method":"echo","params":[1],"id":1}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let request_id = response.headers().get(request::X_REQUEST_ID).cloned().unwrap();
        let body = body_json(response).await;
        assert_eq!(body["result"]["params"], json!([1]));
        assert_eq!(body["result"]["request_id"], json!(request_id.to_str().unwrap()));
    }

    #[tokio::test]
    async fn test_incoming_request_id_is_kept() {
        let router = mux().into_router(&ServerConfig::default());
        let mut request = post_json("/rpc/v1/", r#"{"jsonrpc":"2.0","method":"echo","id":1}"#);
        request.headers_mut().insert(request::request_id_header(), "given-id".parse().unwrap());

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.headers()[request::X_REQUEST_ID], "given-id");
        assert_eq!(body_json(response).await["result"]["request_id"], json!("given-id"));
    }

    #[tokio::test]
    async fn test_subtree_is_served() {
        let router = mux().into_router(&ServerConfig::default());
        let response = router
            .oneshot(post_json("/rpc/v1/anything", r#"{"jsonrpc":"2.0","method":"echo","id":2}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["id"], json!(2));
    }

    #[tokio::test]
    async fn test_get_is_rejected() {
        let router = mux().into_router(&ServerConfig::default());
        let response = router
            .oneshot(Request::builder().uri("/rpc/v1/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_health_route_coexists() {
        let router = mux().into_router(&ServerConfig::default());
        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_invalid_json_is_single_error() {
        let router = mux().into_router(&ServerConfig::default());
        let response = router.oneshot(post_json("/rpc/v1/", "{not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], json!(-32600));
        assert_eq!(body["id"], Value::Null);
    }

    #[tokio::test]
    async fn test_body_limit() {
        let mut config = ServerConfig::default();
        config.rpc.max_body_size = 16;
        let router = mux().into_router(&config);

        let response = router
            .oneshot(post_json("/rpc/v1/", r#"{"jsonrpc":"2.0","method":"echo","params":"0123456789","id":1}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_path_errors() {
        let mut mux = mux();
        assert!(matches!(
            mux.register_methods("rpc", vec![], vec![]),
            Err(MuxError::InvalidPath(_))
        ));
        assert!(matches!(
            mux.register_methods("/rpc/v1/", vec![], vec![]),
            Err(MuxError::PathInUse(_))
        ));
        assert!(matches!(
            mux.route("/health", get(|| async { StatusCode::OK })),
            Err(MuxError::PathInUse(_))
        ));
        assert_eq!(mux.paths(), vec!["/health", "/rpc/v1/"]);
    }

    #[test]
    fn test_failed_registration_mounts_nothing() {
        let mut mux = mux();
        let err = mux
            .register_methods("/rpc/v2", vec![MethodDeclaration::new("broken")], vec![])
            .unwrap_err();
        assert!(matches!(err, MuxError::Registration(RegistrationError::MissingHandler(_))));
        assert!(!mux.paths().contains(&"/rpc/v2".to_string()));
    }
}
