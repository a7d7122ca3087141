//! Request handlers and the dechunking decorator.
//!
//! [`DechunkHandler`] wraps any [`Handler`] and runs the [`Dechunker`] before it:
//! the wrapped handler receives a [`PipelineBody`] and, for buffered chunked
//! requests, a `Content-Length` header instead of `Transfer-Encoding: chunked`.

use std::error::Error;
use std::future::Future;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::CONTENT_LENGTH;
use http::{HeaderMap, Request, Response, StatusCode};
use http_body::Body;
use http_body_util::{Either, Empty};
use tracing::warn;

use crate::body::PipelineBody;
use crate::config::DechunkConfig;
use crate::dechunker::{Decision, Dechunker};
use crate::filter::{BodyFilter, InputPipeline};

/// Name the request body stage is installed under.
pub const BODY_FILTER_NAME: &str = "http_in";

/// Error type the decorator reports for failing inner handlers.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Serves one request.
///
/// Implemented by [`DechunkHandler`] and by plain async functions through
/// [`make_handler`].
#[async_trait]
pub trait Handler<ReqBody> {
    type RespBody: Body;
    type Error: Into<BoxError>;

    async fn call(&self, req: Request<ReqBody>) -> Result<Response<Self::RespBody>, Self::Error>;
}

/// A [`Handler`] backed by an async function.
#[derive(Debug, Clone, Copy)]
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut, ReqBody, RespBody, E> Handler<ReqBody> for FnHandler<F>
where
    F: Fn(Request<ReqBody>) -> Fut + Sync,
    Fut: Future<Output = Result<Response<RespBody>, E>> + Send,
    ReqBody: Send + 'static,
    RespBody: Body,
    E: Into<BoxError>,
{
    type RespBody = RespBody;
    type Error = E;

    async fn call(&self, req: Request<ReqBody>) -> Result<Response<RespBody>, E> {
        let Self(f) = self;
        f(req).await
    }
}

/// Wraps an async function taking a request into a [`Handler`].
pub fn make_handler<F, Fut, ReqBody, RespBody, E>(f: F) -> FnHandler<F>
where
    F: Fn(Request<ReqBody>) -> Fut,
    Fut: Future<Output = Result<Response<RespBody>, E>>,
{
    FnHandler(f)
}

/// Buffers chunked request bodies before calling the wrapped handler.
#[derive(Debug)]
pub struct DechunkHandler<H> {
    inner: H,
    dechunker: Dechunker,
    body_limit: Option<u64>,
}

impl<H> DechunkHandler<H> {
    pub fn new(inner: H, config: DechunkConfig) -> Self {
        Self { inner, dechunker: Dechunker::new(config), body_limit: None }
    }

    /// Caps the request body size, larger bodies are rejected while buffering.
    #[must_use]
    pub fn with_body_limit(mut self, limit: u64) -> Self {
        self.body_limit = Some(limit);
        self
    }
}

#[async_trait]
impl<H, B> Handler<B> for DechunkHandler<H>
where
    H: Handler<PipelineBody> + Sync,
    H::RespBody: Body<Data = Bytes>,
    <H::RespBody as Body>::Error: Into<BoxError>,
    B: Body + Send + Unpin + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    type RespBody = Either<H::RespBody, Empty<Bytes>>;
    type Error = BoxError;

    async fn call(&self, req: Request<B>) -> Result<Response<Self::RespBody>, Self::Error> {
        let (mut parts, body) = req.into_parts();

        let body_filter = match self.body_limit {
            Some(limit) => BodyFilter::new(body).with_limit(limit),
            None => BodyFilter::new(body),
        };
        let mut pipeline = InputPipeline::new(BODY_FILTER_NAME, body_filter);

        if self.dechunker.maybe_activate(&mut parts.headers, &mut pipeline).await == Decision::InternalError {
            return Ok(build_error_response(StatusCode::INTERNAL_SERVER_ERROR));
        }

        let length = content_length(&parts.headers);
        let request = Request::from_parts(parts, PipelineBody::new(pipeline).with_length(length));

        match self.inner.call(request).await {
            Ok(response) => Ok(response.map(Either::Left)),
            Err(e) => Err(e.into()),
        }
    }
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get(CONTENT_LENGTH)?;
    match value.to_str().ok().and_then(|s| s.trim().parse::<u64>().ok()) {
        Some(length) => Some(length),
        None => {
            warn!(?value, "ignore invalid content-length header");
            None
        }
    }
}

fn build_error_response<B>(status_code: StatusCode) -> Response<Either<B, Empty<Bytes>>> {
    let mut response = Response::new(Either::Right(Empty::new()));
    *response.status_mut() = status_code;
    response
}
