//! Buffer chunked request bodies and replay them with a fixed length.
//!
//! Some request consumers can't deal with `Transfer-Encoding: chunked`, they want
//! a `Content-Length` and a body they can read from the start. This crate sits in
//! front of them: it reads a chunked request body into memory once, computes its
//! length, rewrites the request headers, and serves the kept body to every later
//! reader through the same bounded read contract the server's own body stage
//! offers.
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use http::{Request, Response};
//! use http_body_util::{BodyExt, Full};
//! use micro_dechunk::body::PipelineBody;
//! use micro_dechunk::config::DechunkConfig;
//! use micro_dechunk::error::FilterError;
//! use micro_dechunk::handler::{make_handler, DechunkHandler, Handler};
//!
//! async fn upload(request: Request<PipelineBody>) -> Result<Response<Full<Bytes>>, FilterError> {
//!     // chunked uploads arrive here with a content-length header
//!     let length = request.headers().get(http::header::CONTENT_LENGTH).cloned();
//!     let body = request.into_body().collect().await?.to_bytes();
//!     tracing::info!(?length, size = body.len(), "receiving request body");
//!     Ok(Response::new(Full::new(body)))
//! }
//!
//! # async fn run(request: Request<Full<Bytes>>) {
//! let config = DechunkConfig::from_directives("DechunkEngine On").unwrap();
//! let handler = DechunkHandler::new(make_handler(upload), config);
//! let response = handler.call(request).await;
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`segment`]: [`Segment`](segment::Segment)s and the [`SegmentStore`](segment::SegmentStore) holding a kept body
//! - [`collector`]: drains an input chain into a store
//! - [`filter`]: the input filter contract, the chain, the body and replay filters
//! - [`dechunker`]: decides per request, buffers, rewrites headers, installs the replay
//! - [`body`]: the pipeline as an `http_body::Body`
//! - [`handler`]: handler trait and the [`DechunkHandler`](handler::DechunkHandler) decorator
//! - [`config`]: the `DechunkEngine` switch
//!
//! # Memory
//!
//! A dechunked body is held in memory as a whole for the lifetime of its
//! request. Use [`DechunkHandler::with_body_limit`](handler::DechunkHandler::with_body_limit)
//! to bound it.

pub mod body;
pub mod collector;
pub mod config;
pub mod dechunker;
pub mod error;
pub mod filter;
pub mod handler;
pub mod segment;

mod utils;
pub(crate) use utils::ensure;
