//! Build [`RenderReq`] values from axum/http requests.
//!
//! The engine core stays framework-agnostic; this adapter extracts the
//! host, scheme, URL, and query values the renderer consumes. A missing
//! scheme (the common case behind a reverse proxy) is reported as empty
//! and defaults to `http` inside the renderer.

use axum::http::header::HOST;
use axum::http::request::Parts;
use axum::http::{HeaderMap, Request, Uri};
use url::form_urlencoded;

use sitemeta::RenderReq;

/// Extract a [`RenderReq`] from request parts. The host comes from the
/// `Host` header, falling back to the URI authority.
pub fn render_req_from_parts(parts: &Parts) -> RenderReq {
  build(&parts.headers, &parts.uri)
}

/// Extract a [`RenderReq`] from a full request.
pub fn render_req<B>(req: &Request<B>) -> RenderReq {
  build(req.headers(), req.uri())
}

fn build(headers: &HeaderMap, uri: &Uri) -> RenderReq {
  let host = headers
    .get(HOST)
    .and_then(|value| value.to_str().ok())
    .or_else(|| uri.authority().map(|authority| authority.as_str()))
    .unwrap_or_default();
  let query = uri
    .query()
    .map(|raw| {
      form_urlencoded::parse(raw.as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
    })
    .unwrap_or_default();
  RenderReq::new(host, uri.scheme_str().unwrap_or_default(), uri.to_string(), query)
}
