//! Random-access byte sources: the reader's only I/O boundary.

use std::io::{Read, Seek, SeekFrom};
use std::sync::Mutex;

use url::Url;

use crate::SwTilesError;

/// A source of bytes addressable by `fetch(offset, length)`.
///
/// Implemented by a local file and by a range-capable HTTP endpoint. Every
/// suspension point in the reader is a call to this trait.
pub trait ByteSource {
    /// Attempts to fetch `length` bytes starting at `offset`.
    ///
    /// May return fewer bytes than requested, without that being an error
    /// by itself, if the underlying resource is shorter than
    /// `offset + length`; the reader is responsible for treating a short
    /// result as [`SwTilesError::Truncated`] where that matters.
    ///
    /// # Errors
    /// Returns [`SwTilesError::FetchFailed`] if the underlying transport
    /// failed, e.g. a connection error or a non-200/206 HTTP status.
    fn fetch(&self, offset: u64, length: u64) -> Result<Vec<u8>, SwTilesError>;
}

/// A [`ByteSource`] backed by a local, already-open file-like object.
///
/// Wraps any `Read + Seek` behind a mutex, since `fetch` takes `&self`: the
/// reader's contract is that concurrent `get_tile` calls are safe.
pub struct LocalByteSource<T> {
    inner: Mutex<T>,
}

impl<T: Read + Seek> LocalByteSource<T> {
    /// Wraps an already-open `Read + Seek` handle as a byte source.
    pub fn new(inner: T) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }
}

impl LocalByteSource<std::io::Cursor<Vec<u8>>> {
    /// Wraps an in-memory buffer as a byte source. Convenient for tests and
    /// for archives small enough to hold entirely in memory.
    pub fn from_cursor(bytes: Vec<u8>) -> Self {
        Self::new(std::io::Cursor::new(bytes))
    }
}

impl LocalByteSource<std::fs::File> {
    /// Opens a local `.swtiles` file as a byte source.
    ///
    /// # Errors
    /// Returns [`SwTilesError::FetchFailed`] if the file cannot be opened.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, SwTilesError> {
        let file = std::fs::File::open(path.as_ref()).map_err(|e| SwTilesError::FetchFailed {
            offset: 0,
            length: 0,
            reason: e.to_string(),
        })?;
        Ok(Self::new(file))
    }
}

impl<T: Read + Seek> ByteSource for LocalByteSource<T> {
    /// Reads up to `length` bytes starting at `offset`. Returns fewer bytes
    /// than requested (without erroring) if the file is shorter than
    /// `offset + length`; callers that need an exact length should check it
    /// themselves, as the reader does for the header and level table.
    fn fetch(&self, offset: u64, length: u64) -> Result<Vec<u8>, SwTilesError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| SwTilesError::FetchFailed {
                offset,
                length,
                reason: "local byte source lock poisoned".to_string(),
            })?;

        guard
            .seek(SeekFrom::Start(offset))
            .map_err(|e| SwTilesError::FetchFailed {
                offset,
                length,
                reason: e.to_string(),
            })?;

        let mut buf = Vec::new();
        guard
            .by_ref()
            .take(length)
            .read_to_end(&mut buf)
            .map_err(|e| SwTilesError::FetchFailed {
                offset,
                length,
                reason: e.to_string(),
            })?;

        Ok(buf)
    }
}

/// A [`ByteSource`] backed by a range-capable HTTP endpoint.
///
/// Issues `Range: bytes={offset}-{offset+length-1}` and accepts HTTP 200 or
/// 206; any other status is a [`SwTilesError::FetchFailed`].
pub struct HttpByteSource {
    url: Url,
    client: reqwest::blocking::Client,
}

impl HttpByteSource {
    /// Creates a byte source that issues blocking range requests against `url`.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Creates a byte source using a caller-supplied client, e.g. one
    /// configured with custom timeouts or headers.
    pub fn with_client(url: Url, client: reqwest::blocking::Client) -> Self {
        Self { url, client }
    }
}

impl ByteSource for HttpByteSource {
    fn fetch(&self, offset: u64, length: u64) -> Result<Vec<u8>, SwTilesError> {
        let range = format!("bytes={offset}-{}", offset + length.saturating_sub(1));

        let response = self
            .client
            .get(self.url.clone())
            .header(reqwest::header::RANGE, range)
            .send()
            .map_err(|e| SwTilesError::FetchFailed {
                offset,
                length,
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status.as_u16() != 200 && status.as_u16() != 206 {
            tracing::warn!(%status, offset, length, "range fetch rejected by server");
            return Err(SwTilesError::FetchFailed {
                offset,
                length,
                reason: format!("unexpected HTTP status {status}"),
            });
        }

        let bytes = response.bytes().map_err(|e| SwTilesError::FetchFailed {
            offset,
            length,
            reason: e.to_string(),
        })?;

        Ok(bytes.to_vec())
    }
}

/// Asynchronous counterpart of [`ByteSource`], available behind the
/// `async` feature. Stable `async fn` in traits; not object-safe, which is
/// fine since the reader is always generic over a concrete source.
#[cfg(feature = "async")]
pub trait AsyncByteSource {
    /// Asynchronous counterpart of [`ByteSource::fetch`].
    ///
    /// # Errors
    /// Returns [`SwTilesError::FetchFailed`] under the same conditions as
    /// the synchronous version.
    async fn fetch_async(&self, offset: u64, length: u64) -> Result<Vec<u8>, SwTilesError>;
}

/// An [`AsyncByteSource`] backed by a range-capable HTTP endpoint, using
/// `reqwest`'s async client.
#[cfg(feature = "async")]
pub struct AsyncHttpByteSource {
    url: Url,
    client: reqwest::Client,
}

#[cfg(feature = "async")]
impl AsyncHttpByteSource {
    /// Creates a byte source that issues async range requests against `url`.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[cfg(feature = "async")]
impl AsyncByteSource for AsyncHttpByteSource {
    async fn fetch_async(&self, offset: u64, length: u64) -> Result<Vec<u8>, SwTilesError> {
        let range = format!("bytes={offset}-{}", offset + length.saturating_sub(1));

        let response = self
            .client
            .get(self.url.clone())
            .header(reqwest::header::RANGE, range)
            .send()
            .await
            .map_err(|e| SwTilesError::FetchFailed {
                offset,
                length,
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status.as_u16() != 200 && status.as_u16() != 206 {
            tracing::warn!(%status, offset, length, "range fetch rejected by server");
            return Err(SwTilesError::FetchFailed {
                offset,
                length,
                reason: format!("unexpected HTTP status {status}"),
            });
        }

        let bytes = response.bytes().await.map_err(|e| SwTilesError::FetchFailed {
            offset,
            length,
            reason: e.to_string(),
        })?;

        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn local_fetch_reads_exact_range() {
        let source = LocalByteSource::from_cursor((0u8..=255).collect());
        let bytes = source.fetch(10, 5).unwrap();
        assert_eq!(bytes, vec![10, 11, 12, 13, 14]);
    }

    #[test]
    fn local_fetch_past_end_returns_short_read_without_erroring() {
        let source = LocalByteSource::from_cursor(vec![1, 2, 3]);
        let bytes = source.fetch(0, 10).unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[test]
    fn local_fetch_is_reentrant() {
        let source = LocalByteSource::from_cursor((0u8..=255).collect());
        let a = source.fetch(0, 10).unwrap();
        let b = source.fetch(100, 10).unwrap();
        assert_eq!(a, (0u8..10).collect::<Vec<_>>());
        assert_eq!(b, (100u8..110).collect::<Vec<_>>());
    }
}
