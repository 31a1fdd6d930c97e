// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Positional reads over an object's backing store.
//!
//! Segments are loaded by offset from several shadows at once, so the source
//! must support concurrent reads that do not share a cursor.

use std::fs::File;
use std::io::{self, Read};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Random-access byte source.
pub trait ReaderAt: Send + Sync {
    /// Read into `buf` starting at `off`; returns the bytes read (0 at end).
    fn read_at(&self, buf: &mut [u8], off: u64) -> io::Result<usize>;

    /// Total size of the source.
    fn size(&self) -> io::Result<u64>;

    /// Fill `buf` from `off` or fail with `UnexpectedEof`.
    fn read_exact_at(&self, mut buf: &mut [u8], mut off: u64) -> io::Result<()> {
        while !buf.is_empty() {
            match self.read_at(buf, off) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "positional read past end of source",
                    ))
                }
                Ok(n) => {
                    buf = &mut buf[n..];
                    off += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl ReaderAt for [u8] {
    fn read_at(&self, buf: &mut [u8], off: u64) -> io::Result<usize> {
        let Ok(start) = usize::try_from(off) else {
            return Ok(0);
        };
        if start >= self.len() {
            return Ok(0);
        }
        let n = buf.len().min(self.len() - start);
        buf[..n].copy_from_slice(&self[start..start + n]);
        Ok(n)
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.len() as u64)
    }
}

impl ReaderAt for Vec<u8> {
    fn read_at(&self, buf: &mut [u8], off: u64) -> io::Result<usize> {
        self.as_slice().read_at(buf, off)
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.len() as u64)
    }
}

impl ReaderAt for File {
    #[cfg(unix)]
    fn read_at(&self, buf: &mut [u8], off: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(self, buf, off)
    }

    #[cfg(windows)]
    fn read_at(&self, buf: &mut [u8], off: u64) -> io::Result<usize> {
        std::os::windows::fs::FileExt::seek_read(self, buf, off)
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }
}

impl<T: ReaderAt + ?Sized> ReaderAt for &T {
    fn read_at(&self, buf: &mut [u8], off: u64) -> io::Result<usize> {
        (**self).read_at(buf, off)
    }

    fn size(&self) -> io::Result<u64> {
        (**self).size()
    }
}

impl<T: ReaderAt + ?Sized> ReaderAt for Arc<T> {
    fn read_at(&self, buf: &mut [u8], off: u64) -> io::Result<usize> {
        (**self).read_at(buf, off)
    }

    fn size(&self) -> io::Result<u64> {
        (**self).size()
    }
}

/// Wrapper that counts the bytes read through it.
#[derive(Debug)]
pub struct CountingReaderAt<R> {
    inner: R,
    bytes: AtomicU64,
    reads: AtomicU64,
}

impl<R: ReaderAt> CountingReaderAt<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            bytes: AtomicU64::new(0),
            reads: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn bytes_read(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.bytes.store(0, Ordering::Relaxed);
        self.reads.store(0, Ordering::Relaxed);
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: ReaderAt> ReaderAt for CountingReaderAt<R> {
    fn read_at(&self, buf: &mut [u8], off: u64) -> io::Result<usize> {
        let n = self.inner.read_at(buf, off)?;
        self.bytes.fetch_add(n as u64, Ordering::Relaxed);
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(n)
    }

    fn size(&self) -> io::Result<u64> {
        self.inner.size()
    }
}

/// Sequential [`Read`] over `[start, end)` of a positional source.
pub struct SectionReader {
    src: Arc<dyn ReaderAt>,
    pos: u64,
    end: u64,
}

impl SectionReader {
    pub fn new(src: Arc<dyn ReaderAt>, start: u64, end: u64) -> Self {
        Self {
            src,
            pos: start,
            end,
        }
    }

    /// Current absolute position.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos
    }
}

impl Read for SectionReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let left = self.end.saturating_sub(self.pos);
        if left == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = buf.len().min(usize::try_from(left).unwrap_or(usize::MAX));
        let n = self.src.read_at(&mut buf[..want], self.pos)?;
        self.pos += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_slice_reads() {
        let data: Vec<u8> = (0..10).collect();
        let mut buf = [0u8; 4];
        assert_eq!(data.read_at(&mut buf, 8).expect("read"), 2);
        assert_eq!(&buf[..2], &[8, 9]);
        assert_eq!(data.read_at(&mut buf, 20).expect("read"), 0);
        assert!(data.read_exact_at(&mut buf, 8).is_err());
        data.read_exact_at(&mut buf, 2).expect("exact");
        assert_eq!(buf, [2, 3, 4, 5]);
    }

    #[test]
    fn test_file_and_counting() {
        let mut f = tempfile::tempfile().expect("tempfile");
        f.write_all(b"hello world").expect("write");
        let counted = CountingReaderAt::new(f);
        let mut buf = [0u8; 5];
        counted.read_exact_at(&mut buf, 6).expect("read");
        assert_eq!(&buf, b"world");
        assert_eq!(counted.bytes_read(), 5);
        assert_eq!(counted.size().expect("size"), 11);
        counted.reset();
        assert_eq!(counted.bytes_read(), 0);
    }

    #[test]
    fn test_section_reader() {
        let data: Arc<dyn ReaderAt> = Arc::new((0u8..100).collect::<Vec<u8>>());
        let mut r = SectionReader::new(data, 10, 20);
        let mut out = Vec::new();
        r.read_to_end(&mut out).expect("read");
        assert_eq!(out, (10u8..20).collect::<Vec<u8>>());
        assert_eq!(r.position(), 20);
    }
}
