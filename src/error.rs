use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SenseError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("couldn't stat {path}: {source}")]
    Stat { path: PathBuf, source: io::Error },
    #[error("invalid file mode for {path}, expecting a regular file")]
    NotRegularFile { path: PathBuf },
    #[error("empty file encountered: {path}")]
    EmptyFile { path: PathBuf },
    #[error("couldn't map {path}: {source}")]
    Map { path: PathBuf, source: io::Error },
    #[error("invalid geometry {width}x{height}, permitted range is 1..={max}")]
    InvalidGeometry { width: u32, height: u32, max: u32 },
    #[error("display host rejected request: {0}")]
    HostRejected(String),
    #[error("couldn't map data channel {name}, parent rejected")]
    ChannelRejected { name: String },
    #[error("couldn't spawn worker for window {id}: {source}")]
    WorkerSpawn { id: usize, source: io::Error },
    #[error("couldn't write snapshot {path}: {source}")]
    Snapshot {
        path: PathBuf,
        source: image::ImageError,
    },
}

pub type Result<T> = std::result::Result<T, SenseError>;
