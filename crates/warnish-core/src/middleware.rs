//! Middleware trait and the request chain

use crate::{Body, Error, Result};
use async_trait::async_trait;
use http::{Request, Response};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A filter installed in front of an origin handler
///
/// A filter either proceeds by calling [`Next::run`] (and may rewrite the
/// response it gets back), or answers the request itself without calling it.
#[async_trait]
pub trait Middleware: Send + Sync + fmt::Debug {
    /// Process a request
    async fn call(&self, req: Request<Body>, next: Next) -> Result<Response<Body>>;
}

/// Future returned by the origin handler
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Response<Body>>> + Send>>;

/// Type alias for the origin handler function
pub type HandlerFn = Box<dyn Fn(Request<Body>) -> HandlerFuture + Send + Sync>;

/// Box a closure as a [`HandlerFn`]
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response<Body>>> + Send + 'static,
{
    Box::new(move |req| Box::pin(f(req)))
}

/// Represents the next middleware/handler in the chain
pub struct Next {
    middleware_stack: Arc<[Arc<dyn Middleware>]>,
    index: usize,
    final_handler: Option<Arc<HandlerFn>>,
}

impl Next {
    /// Create a new Next from a middleware stack
    pub fn new(middleware_stack: Arc<[Arc<dyn Middleware>]>) -> Self {
        Self {
            middleware_stack,
            index: 0,
            final_handler: None,
        }
    }

    /// Create a new Next with a final handler
    pub fn with_handler(middleware_stack: Arc<[Arc<dyn Middleware>]>, handler: HandlerFn) -> Self {
        Self::with_shared_handler(middleware_stack, Arc::new(handler))
    }

    fn with_shared_handler(
        middleware_stack: Arc<[Arc<dyn Middleware>]>,
        handler: Arc<HandlerFn>,
    ) -> Self {
        Self {
            middleware_stack,
            index: 0,
            final_handler: Some(handler),
        }
    }

    /// Run the next middleware or final handler
    pub async fn run(self, req: Request<Body>) -> Result<Response<Body>> {
        if let Some(middleware) = self.middleware_stack.get(self.index) {
            let next = Self {
                middleware_stack: Arc::clone(&self.middleware_stack),
                index: self.index + 1,
                final_handler: self.final_handler.clone(),
            };
            middleware.call(req, next).await
        } else if let Some(handler) = self.final_handler {
            handler(req).await
        } else {
            Err(Error::Internal(
                "Middleware chain completed without handler".to_string(),
            ))
        }
    }
}

impl Clone for Next {
    fn clone(&self) -> Self {
        Self {
            middleware_stack: Arc::clone(&self.middleware_stack),
            index: self.index,
            final_handler: self.final_handler.clone(),
        }
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("index", &self.index)
            .field("remaining", &(self.middleware_stack.len() - self.index))
            .finish()
    }
}

/// A middleware stack bound to its origin handler
///
/// Filters run in the order they were added; the first one sees the request
/// first and the response last.
#[derive(Clone)]
pub struct Pipeline {
    middleware_stack: Arc<[Arc<dyn Middleware>]>,
    handler: Arc<HandlerFn>,
}

impl Pipeline {
    /// Build a pipeline in front of `handler`
    pub fn new(middleware: Vec<Arc<dyn Middleware>>, handler: HandlerFn) -> Self {
        Self {
            middleware_stack: middleware.into(),
            handler: Arc::new(handler),
        }
    }

    /// Push a request through every filter and, unless one answers it, the handler
    pub async fn handle(&self, req: Request<Body>) -> Result<Response<Body>> {
        Next::with_shared_handler(Arc::clone(&self.middleware_stack), Arc::clone(&self.handler))
            .run(req)
            .await
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("middleware", &self.middleware_stack)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body;
    use http::HeaderValue;
    use http_body_util::BodyExt;

    #[derive(Debug)]
    struct Tag(&'static str);

    #[async_trait]
    impl Middleware for Tag {
        async fn call(&self, req: Request<Body>, next: Next) -> Result<Response<Body>> {
            let mut response = next.run(req).await?;
            response
                .headers_mut()
                .append("x-trail", HeaderValue::from_static(self.0));
            Ok(response)
        }
    }

    #[derive(Debug)]
    struct ShortCircuit;

    #[async_trait]
    impl Middleware for ShortCircuit {
        async fn call(&self, _req: Request<Body>, _next: Next) -> Result<Response<Body>> {
            Ok(Response::new(body::full("from filter")))
        }
    }

    fn origin() -> HandlerFn {
        handler_fn(|_req| async { Ok(Response::new(body::full("from origin"))) })
    }

    #[tokio::test]
    async fn test_chain_without_handler_errors() {
        let stack: Arc<[Arc<dyn Middleware>]> = Arc::new([Arc::new(Tag("a")) as Arc<dyn Middleware>]);
        let next = Next::new(stack);

        let req = Request::builder().uri("/test").body(body::empty()).unwrap();

        let result = next.run(req).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_pipeline_order() {
        let pipeline = Pipeline::new(vec![Arc::new(Tag("outer")), Arc::new(Tag("inner"))], origin());

        let req = Request::builder().uri("/").body(body::empty()).unwrap();
        let response = pipeline.handle(req).await.unwrap();

        let trail: Vec<_> = response
            .headers()
            .get_all("x-trail")
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(trail, vec!["inner", "outer"]);
    }

    #[tokio::test]
    async fn test_filter_can_answer_without_origin() {
        let pipeline = Pipeline::new(vec![Arc::new(ShortCircuit)], origin());

        let req = Request::builder().uri("/").body(body::empty()).unwrap();
        let response = pipeline.handle(req).await.unwrap();

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"from filter");
    }
}
