use memmap2::Mmap;
#[cfg(test)]
use memmap2::MmapMut;
use std::fs::File;
#[cfg(test)]
use std::io;
use std::path::Path;

use crate::error::{Result, SenseError};

/// Read-only view over the whole file, mapped once at startup.
pub struct FileView {
    map: Mmap,
}

impl FileView {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let meta = file.metadata().map_err(|source| SenseError::Stat {
            path: path.to_path_buf(),
            source,
        })?;

        if meta.len() == 0 {
            return Err(SenseError::EmptyFile {
                path: path.to_path_buf(),
            });
        }

        if !meta.is_file() {
            return Err(SenseError::NotRegularFile {
                path: path.to_path_buf(),
            });
        }

        let map = unsafe { Mmap::map(&file) }.map_err(|source| SenseError::Map {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self { map })
    }

    /// Builds a view from an in-memory buffer (anonymous mapping).
    #[cfg(test)]
    pub fn from_bytes(bytes: &[u8]) -> io::Result<Self> {
        if bytes.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "empty buffer",
            ));
        }
        let mut anon = MmapMut::map_anon(bytes.len())?;
        anon.copy_from_slice(bytes);
        Ok(Self {
            map: anon.make_read_only()?,
        })
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.map[..]
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.map.len() as u64
    }

    /// Copies up to `count` bytes starting at `offset`, taking every `step`th byte.
    ///
    /// With `wrap` the read continues from the start of the file once it runs
    /// past the end; otherwise it stops at EOF.
    pub fn sample(&self, offset: u64, count: usize, step: usize, wrap: bool) -> Vec<u8> {
        let data = self.bytes();
        let len = data.len();
        let step = step.max(1);
        let mut out = Vec::with_capacity(count);

        if wrap {
            let mut pos = (offset % len as u64) as usize;
            for _ in 0..count {
                out.push(data[pos]);
                pos = (pos + step) % len;
            }
        } else {
            let start = offset.min(len as u64) as usize;
            out.extend(data[start..].iter().step_by(step).take(count));
        }

        out
    }
}
