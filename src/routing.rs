//! Explicit route table.
//!
//! Routing is an ordered list of `(matcher, handler)` pairs with a mandatory
//! fallback: the first matching route wins, and a request matching nothing
//! hits the fallback. The gateway currently mounts no routes, so every
//! request that is not a static asset reaches the fallback: a `400` error
//! page echoing the unmatched path.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    body::Body,
    extract::Request,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use std::pin::Pin;
use std::sync::Arc;

type BoxedFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// A type-erased request handler stored in the table.
pub type RouteHandler = Arc<dyn Fn(Request) -> BoxedFuture + Send + Sync>;

/// Wraps an async function into a [`RouteHandler`].
pub fn handler<F, Fut, R>(f: F) -> RouteHandler
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    Arc::new(move |req| {
        let fut = f(req);
        Box::pin(async move { fut.await.into_response() })
    })
}

/// Path portion of a matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    Exact(String),
    Prefix(String),
    Any,
}

impl PathPattern {
    fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(p) => path == p,
            PathPattern::Prefix(p) => path.starts_with(p.as_str()),
            PathPattern::Any => true,
        }
    }
}

/// Matches a request by optional method plus path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matcher {
    pub method: Option<Method>,
    pub path: PathPattern,
}

impl Matcher {
    pub fn new(method: Option<Method>, path: PathPattern) -> Self {
        Self { method, path }
    }

    /// Matches every method and every path.
    pub fn any() -> Self {
        Self::new(None, PathPattern::Any)
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Some(Method::GET), PathPattern::Exact(path.into()))
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Some(Method::POST), PathPattern::Exact(path.into()))
    }

    pub fn prefix(path: impl Into<String>) -> Self {
        Self::new(None, PathPattern::Prefix(path.into()))
    }

    pub fn matches(&self, method: &Method, path: &str) -> bool {
        self.method.as_ref().is_none_or(|m| m == method) && self.path.matches(path)
    }
}

#[derive(Clone)]
struct Route {
    matcher: Matcher,
    handler: RouteHandler,
}

/// Ordered `(matcher, handler)` pairs with a defined fallback.
#[derive(Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
    fallback: RouteHandler,
}

impl RouteTable {
    pub fn new(fallback: RouteHandler) -> Self {
        Self {
            routes: Vec::new(),
            fallback,
        }
    }

    /// The gateway's table: no routes, path-echoing 400 fallback.
    pub fn with_catch_all() -> Self {
        Self::new(handler(catch_all))
    }

    /// Appends a route; earlier routes take precedence.
    pub fn route(mut self, matcher: Matcher, handler: RouteHandler) -> Self {
        self.routes.push(Route { matcher, handler });
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Runs the first matching handler, or the fallback.
    pub async fn dispatch(&self, req: Request) -> Response {
        let method = req.method().clone();
        let path = original_uri(&req).path().to_string();

        let handler = self
            .routes
            .iter()
            .find(|route| route.matcher.matches(&method, &path))
            .map(|route| route.handler.clone())
            .unwrap_or_else(|| self.fallback.clone());

        handler(req).await
    }
}

/// The URI as the client sent it, before any `nest` stripping.
fn original_uri(req: &Request) -> Uri {
    req.extensions()
        .get::<axum::extract::OriginalUri>()
        .map(|original| original.0.clone())
        .unwrap_or_else(|| req.uri().clone())
}

#[derive(Template, WebTemplate)]
#[template(path = "errorpage.html")]
struct ErrorPageTemplate {
    status: u16,
    message: String,
}

/// Fallback for unmatched requests: `400` plus a rendered error page that
/// names the requested path.
async fn catch_all(req: Request<Body>) -> Response {
    let path = original_uri(&req).path().to_string();

    let page = ErrorPageTemplate {
        status: StatusCode::BAD_REQUEST.as_u16(),
        message: format!("cannot find the path: {path} on this server"),
    };

    (StatusCode::BAD_REQUEST, page).into_response()
}
