//! Where catalog pages and archive bytes come from.
//!
//! The pipeline only talks to [`ArchiveSource`]; [`HttpSource`] is the real
//! implementation and tests substitute an in-memory one.

use std::{future::Future, time::Duration};

use bytes::Bytes;
use reqwest::{Client, Response, header::CONTENT_LENGTH};
use url::Url;

use crate::error::SourceError;

/// A streamed response body.
pub trait ArchiveBody: Send {
  /// The next chunk of bytes, or `None` once the body is exhausted.
  fn chunk(&mut self) -> impl Future<Output = Result<Option<Bytes>, SourceError>> + Send + '_;
}

/// Remote access needed by the catalog and the stream splitter.
pub trait ArchiveSource: Send + Sync {
  type Body: ArchiveBody;

  /// GET a small text resource in full.
  fn fetch_text(&self, url: Url) -> impl Future<Output = Result<String, SourceError>> + Send + '_;

  /// HEAD a resource and read its `Content-Length`, if any.
  fn content_length(
    &self,
    url: Url,
  ) -> impl Future<Output = Result<Option<u64>, SourceError>> + Send + '_;

  /// GET a resource as a stream.
  fn open(&self, url: Url) -> impl Future<Output = Result<Self::Body, SourceError>> + Send + '_;
}

// ─── HTTP ────────────────────────────────────────────────────────────────────

/// [`ArchiveSource`] over HTTP(S).
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpSource {
  client: Client,
}

impl HttpSource {
  pub fn new() -> Result<Self, SourceError> {
    // Archive downloads can run for hours, so only connecting is bounded.
    let client = Client::builder()
      .connect_timeout(Duration::from_secs(30))
      .build()?;
    Ok(Self { client })
  }
}

fn check_status(url: &Url, resp: Response) -> Result<Response, SourceError> {
  let status = resp.status();
  if status.is_success() {
    Ok(resp)
  } else {
    Err(SourceError::Status { url: url.to_string(), status: status.as_u16() })
  }
}

/// Streaming body of an HTTP response.
pub struct HttpBody {
  response: Response,
}

impl ArchiveBody for HttpBody {
  async fn chunk(&mut self) -> Result<Option<Bytes>, SourceError> {
    Ok(self.response.chunk().await?)
  }
}

impl ArchiveSource for HttpSource {
  type Body = HttpBody;

  async fn fetch_text(&self, url: Url) -> Result<String, SourceError> {
    let resp = self.client.get(url.clone()).send().await?;
    Ok(check_status(&url, resp)?.text().await?)
  }

  async fn content_length(&self, url: Url) -> Result<Option<u64>, SourceError> {
    let resp = self.client.head(url.clone()).send().await?;
    let resp = check_status(&url, resp)?;
    // Read the header itself; a HEAD response has no body to size.
    Ok(
      resp
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok()),
    )
  }

  async fn open(&self, url: Url) -> Result<HttpBody, SourceError> {
    tracing::debug!(%url, "opening archive stream");
    let resp = self.client.get(url.clone()).send().await?;
    Ok(HttpBody { response: check_status(&url, resp)? })
  }
}
