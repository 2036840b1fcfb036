use crate::SwTilesError;

/// A writable destination supporting sequential append plus a final
/// seek-and-patch of already-written regions.
///
/// Implemented for any [`std::io::Write`] + [`std::io::Seek`] via a blanket
/// impl; non-file sinks (e.g. buffered uploads to object storage) can
/// implement it directly.
pub trait Sink {
    /// Appends `buf` at the current write position, advancing it.
    ///
    /// # Errors
    /// Returns [`SwTilesError::SinkFailed`] if the underlying destination
    /// rejects the write.
    fn write(&mut self, buf: &[u8]) -> Result<(), SwTilesError>;

    /// Returns the current write position.
    ///
    /// # Errors
    /// Returns [`SwTilesError::SinkFailed`] if the position cannot be
    /// determined.
    fn tell(&mut self) -> Result<u64, SwTilesError>;

    /// Overwrites `buf` at `offset`, an already-written region, without
    /// disturbing the current write position.
    ///
    /// # Errors
    /// Returns [`SwTilesError::SinkFailed`] if the underlying destination
    /// rejects the seek or write.
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<(), SwTilesError>;
}
