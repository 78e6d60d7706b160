use std::{
    fmt::Debug,
    fs,
    io::{self, ErrorKind},
    path::Path,
    time::SystemTime,
};

pub mod mock;

/// Read-only view of the files a task depends on or produces.
pub trait StatProvider: Send + Sync + Debug {
    /// Last modification time, or `None` when the path does not exist.
    fn modified(&self, path: &Path) -> io::Result<Option<SystemTime>>;

    /// Full contents, used for fingerprinting.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealStat;

impl StatProvider for RealStat {
    fn modified(&self, path: &Path) -> io::Result<Option<SystemTime>> {
        match fs::metadata(path) {
            Ok(metadata) => metadata.modified().map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }
}
