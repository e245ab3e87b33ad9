// SPDX-FileCopyrightText: 2026 Strata Contributors
//
// SPDX-License-Identifier: MulanPSL-2.0

//! HTTP byte-range reader.
//!
//! Turns a remote resource into the minimal contract the cached filelike
//! needs: an `open` probe that validates range support, and a `fetch` that
//! streams one byte interval with a cancel handle. Grounded in the
//! `reqwest`-based streaming clients under `ferrex-player` (HLS segment
//! fetching over HTTP), adapted from whole-response streaming to
//! range-addressed streaming.

use crate::core::error::{EngineError, Result};
use bytes::Bytes;
use futures::Stream;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, ETAG, LAST_MODIFIED, RANGE};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

/// Result of probing a resource before any range is fetched.
#[derive(Debug, Clone)]
pub struct OpenInfo {
    pub size: u64,
    /// `ETag` or `Last-Modified`, used as an opaque change-detection token.
    pub identifier: Option<String>,
}

pub type RangeChunk = Result<Bytes>;

/// A cancellable stream of byte chunks for one `fetch` call.
///
/// Holds `_body_lock` for its lifetime so a second `fetch` against the same
/// reader fails fast with [`EngineError::StreamLockContention`] instead of
/// racing this stream for the same body.
pub struct RangeStream {
    inner: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    token: CancellationToken,
    url: String,
    _body_lock: OwnedMutexGuard<()>,
}

impl RangeStream {
    /// Abort the underlying request. No further items are yielded,
    /// including no trailing error.
    pub fn destroy(&self) {
        self.token.cancel();
    }
}

impl Stream for RangeStream {
    type Item = RangeChunk;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.token.is_cancelled() {
            return Poll::Ready(None);
        }
        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => Poll::Ready(Some(Ok(chunk))),
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(EngineError::HttpNetwork {
                url: this.url.clone(),
                message: e.to_string(),
            }))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// A reader over a single HTTP resource that supports byte-range requests.
pub struct HttpRangeReader {
    client: reqwest::Client,
    url: String,
    /// Held by the in-flight [`RangeStream`], if any; a second concurrent
    /// `fetch` sees it locked and fails instead of racing for the body.
    body_lock: Arc<Mutex<()>>,
}

impl HttpRangeReader {
    pub fn new(url: impl Into<String>) -> Self {
        HttpRangeReader { client: reqwest::Client::new(), url: url.into(), body_lock: Arc::new(Mutex::new(())) }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Probe the resource: confirm range support, read its size and change
    /// identifier. The probe request is dropped without reading a body.
    pub async fn open(&self) -> Result<OpenInfo> {
        let response = self
            .client
            .get(&self.url)
            .header("Cache-Control", "no-store")
            .send()
            .await
            .map_err(|e| EngineError::HttpNetwork { url: self.url.clone(), message: e.to_string() })?;

        if !response.status().is_success() {
            return Err(EngineError::HttpStatus { url: self.url.clone(), status: response.status().as_u16() });
        }

        let accepts_ranges = response
            .headers()
            .get(ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("bytes"))
            .unwrap_or(false);
        if !accepts_ranges {
            return Err(EngineError::AcceptRangesMissing { url: self.url.clone() });
        }

        let size = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| EngineError::MissingContentLength { url: self.url.clone() })?;

        let identifier = response
            .headers()
            .get(ETAG)
            .or_else(|| response.headers().get(LAST_MODIFIED))
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        Ok(OpenInfo { size, identifier })
    }

    /// Fetch `[offset, offset+length)` as a cancellable stream of chunks.
    pub async fn fetch(&self, offset: u64, length: u64) -> Result<RangeStream> {
        let body_lock = self
            .body_lock
            .clone()
            .try_lock_owned()
            .map_err(|_| EngineError::StreamLockContention { url: self.url.clone() })?;

        let end = offset + length.saturating_sub(1);
        let response = self
            .client
            .get(&self.url)
            .header(RANGE, format!("bytes={offset}-{end}"))
            .send()
            .await
            .map_err(|e| EngineError::HttpNetwork { url: self.url.clone(), message: e.to_string() })?;

        if !response.status().is_success() {
            return Err(EngineError::HttpStatus { url: self.url.clone(), status: response.status().as_u16() });
        }
        if response.content_length() == Some(0) {
            return Err(EngineError::MissingBody { url: self.url.clone() });
        }

        let token = CancellationToken::new();
        Ok(RangeStream { inner: Box::pin(response.bytes_stream()), token, url: self.url.clone(), _body_lock: body_lock })
    }
}
