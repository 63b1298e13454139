// File: ./src/client/headers.rs
//! Tower middleware stamping the default headers onto every portal request.
use http::Request;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

/// Accept header the portal's service endpoints expect; HTML is listed
/// for the handshake and lesson-plan pages.
const ACCEPT: &str = "application/json, text/html;q=0.9, */*;q=0.8";

#[derive(Clone, Debug)]
pub struct DefaultHeadersLayer {
    pub user_agent: String,
}

impl DefaultHeadersLayer {
    pub fn new(user_agent: String) -> Self {
        Self { user_agent }
    }
}

impl<S> Layer<S> for DefaultHeadersLayer {
    type Service = DefaultHeadersService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DefaultHeadersService {
            inner,
            user_agent: self.user_agent.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DefaultHeadersService<S> {
    inner: S,
    user_agent: String,
}

impl<S, ReqBody> Service<Request<ReqBody>> for DefaultHeadersService<S>
where
    S: Service<Request<ReqBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        if let Ok(val) = http::HeaderValue::from_str(&self.user_agent) {
            req.headers_mut().insert(http::header::USER_AGENT, val);
        }
        if !req.headers().contains_key(http::header::ACCEPT) {
            req.headers_mut()
                .insert(http::header::ACCEPT, http::HeaderValue::from_static(ACCEPT));
        }
        self.inner.call(req)
    }
}
