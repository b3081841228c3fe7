//! Output sinks.
//!
//! The muxer hands each call's framed bytes to the sink in a single
//! [`OutputSink::write_all`]. Sinks never retry; any error is final for the
//! muxer that owns them.

use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

/// Destination of the muxed byte stream.
pub trait OutputSink {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;

    /// Overwrites `bytes` at absolute stream offset `offset`, leaving the
    /// write position at the end of the stream.
    ///
    /// Returns `Ok(false)` when the sink cannot patch (pipes, sockets).
    fn patch(&mut self, _offset: u64, _bytes: &[u8]) -> io::Result<bool> {
        Ok(false)
    }
}

/// A forward-only sink over any writer.
#[derive(Debug)]
pub struct WriteSink<W> {
    inner: W,
}

impl<W: Write> WriteSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> OutputSink for WriteSink<W> {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// A sink over a seekable writer; supports the final metadata patch.
///
/// Patch offsets count from where the writer stood at the first write, so a
/// writer that already holds data keeps it untouched.
#[derive(Debug)]
pub struct SeekableSink<W> {
    inner: W,
    base: Option<u64>,
}

impl<W: Write + Seek> SeekableSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, base: None }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    fn base(&mut self) -> io::Result<u64> {
        match self.base {
            Some(base) => Ok(base),
            None => {
                let base = self.inner.stream_position()?;
                self.base = Some(base);
                Ok(base)
            }
        }
    }
}

impl<W: Write + Seek> OutputSink for SeekableSink<W> {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.base()?;
        self.inner.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    fn patch(&mut self, offset: u64, bytes: &[u8]) -> io::Result<bool> {
        let base = self.base()?;
        let end = self.inner.stream_position()?;
        let start = base + offset;
        if start + bytes.len() as u64 > end {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("patch at {offset} runs past end of stream ({})", end - base),
            ));
        }
        self.inner.seek(SeekFrom::Start(start))?;
        self.inner.write_all(bytes)?;
        self.inner.seek(SeekFrom::Start(end))?;
        Ok(true)
    }
}

/// A buffered file sink.
pub type FileSink = SeekableSink<BufWriter<File>>;

impl FileSink {
    /// Creates (or truncates) `path`.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

/// In-memory sink, patchable.
impl OutputSink for Vec<u8> {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.extend_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn patch(&mut self, offset: u64, bytes: &[u8]) -> io::Result<bool> {
        let start = offset as usize;
        let target = start
            .checked_add(bytes.len())
            .and_then(|end| self.get_mut(start..end))
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "patch outside written data")
            })?;
        target.copy_from_slice(bytes);
        Ok(true)
    }
}
