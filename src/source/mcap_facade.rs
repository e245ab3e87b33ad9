// SPDX-FileCopyrightText: 2026 Strata Contributors
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Picks a concrete MCAP reading strategy behind one stable interface.
//!
//! A `file` input is probed for readability, then handed to the unindexed
//! reader in full. A `url` input is opened as an HTTP range reader and,
//! failing an indexed read (currently always, see [`try_create_indexed_reader`]),
//! falls back to fetching the whole body with `Content-Length` as its
//! declared size. Both paths delegate every subsequent call verbatim to
//! the wrapped [`McapUnindexedSource`] — this module only decides *how the
//! bytes get here*, never how they're parsed.

use std::path::PathBuf;

use bytes::Bytes;
use futures::stream::BoxStream;
use tokio::io::AsyncReadExt;

use crate::core::error::{EngineError, Result};
use crate::core::model::{Initialization, IteratorResult, MessageEvent};
use crate::source::mcap_unindexed::McapUnindexedSource;
use crate::source::{BackfillArgs, BoxFuture, MessageIteratorArgs, Source};
use crate::transport::http_reader::HttpRangeReader;

/// Where an MCAP facade reads its bytes from.
pub enum McapInput {
    File(PathBuf),
    Url(String),
    /// Reserved for a future live-stream input; rejected at `initialize`.
    Stream,
}

/// Always fails: the indexed MCAP reader (using the footer's summary
/// section for random chunk access) is not implemented. Every input falls
/// through to the unindexed, full-materialization reader. Kept as its own
/// function, matching the "dead for now" shape of the stub it mirrors, so
/// a future indexed implementation has an obvious place to slot in without
/// touching the dispatch logic around it.
fn try_create_indexed_reader(_input: &McapInput) -> Option<McapUnindexedSource> {
    None
}

/// An MCAP source that resolves a `file` or `url` input descriptor into
/// bytes, then delegates everything else to [`McapUnindexedSource`].
pub struct McapFacade {
    input: McapInput,
    inner: Option<McapUnindexedSource>,
}

impl McapFacade {
    pub fn new(input: McapInput) -> Self {
        McapFacade { input, inner: None }
    }

    async fn open_file(path: &PathBuf) -> Result<Bytes> {
        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| EngineError::NotReadable { reason: format!("{}: {e}", path.display()) })?;

        // Probe readability by reading the first byte before trusting the
        // handle for a full read.
        let mut probe = [0u8; 1];
        let n = file
            .read(&mut probe)
            .await
            .map_err(|e| EngineError::NotReadable { reason: format!("{}: {e}", path.display()) })?;
        if n == 0 {
            return Err(EngineError::NotReadable { reason: format!("{} is empty", path.display()) });
        }

        let mut data = probe.to_vec();
        file.read_to_end(&mut data)
            .await
            .map_err(|e| EngineError::NotReadable { reason: format!("{}: {e}", path.display()) })?;
        Ok(Bytes::from(data))
    }

    async fn open_url(url: &str) -> Result<Bytes> {
        let reader = HttpRangeReader::new(url);
        let info = reader.open().await?;
        let stream = reader.fetch(0, info.size).await?;

        use futures::StreamExt;
        let mut stream = stream;
        let mut data = Vec::with_capacity(info.size as usize);
        while let Some(chunk) = stream.next().await {
            data.extend_from_slice(&chunk?);
        }
        Ok(Bytes::from(data))
    }
}

impl Source for McapFacade {
    fn initialize(&mut self) -> BoxFuture<'_, Result<Initialization>> {
        Box::pin(async move {
            if let Some(indexed) = try_create_indexed_reader(&self.input) {
                self.inner = Some(indexed);
            } else {
                let data = match &self.input {
                    McapInput::File(path) => Self::open_file(path).await?,
                    McapInput::Url(url) => Self::open_url(url).await?,
                    McapInput::Stream => {
                        return Err(EngineError::UnsupportedInput { reason: "MCAP sources do not accept a stream input".to_string() })
                    }
                };
                self.inner = Some(McapUnindexedSource::new(data));
            }
            self.inner.as_mut().expect("just assigned").initialize().await
        })
    }

    fn message_iterator(&self, args: MessageIteratorArgs) -> Result<BoxStream<'static, IteratorResult>> {
        self.inner.as_ref().ok_or(EngineError::NotInitialized)?.message_iterator(args)
    }

    fn backfill(&self, args: BackfillArgs) -> BoxFuture<'_, Result<Vec<MessageEvent>>> {
        match &self.inner {
            Some(inner) => inner.backfill(args),
            None => Box::pin(async { Err(EngineError::NotInitialized) }),
        }
    }

    fn terminate(&mut self) {
        if let Some(inner) = &mut self.inner {
            inner.terminate();
        }
        self.inner = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn calls_before_initialize_fail_not_initialized() {
        let facade = McapFacade::new(McapInput::File(PathBuf::from("/nonexistent")));
        let err = match facade.message_iterator(MessageIteratorArgs::default()) {
            Err(e) => e,
            Ok(_) => panic!("expected error"),
        };
        assert!(matches!(err, EngineError::NotInitialized));
    }

    #[tokio::test]
    async fn missing_file_fails_not_readable() {
        let mut facade = McapFacade::new(McapInput::File(PathBuf::from("/nonexistent/path.mcap")));
        let err = facade.initialize().await.unwrap_err();
        assert!(matches!(err, EngineError::NotReadable { .. }));
    }

    #[tokio::test]
    async fn indexed_reader_stub_always_declines() {
        assert!(try_create_indexed_reader(&McapInput::File(PathBuf::from("/any"))).is_none());
    }

    #[tokio::test]
    async fn stream_input_is_rejected_at_initialize() {
        let mut facade = McapFacade::new(McapInput::Stream);
        let err = facade.initialize().await.unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedInput { .. }));
    }
}
