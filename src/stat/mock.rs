use std::{
    collections::HashMap,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, SystemTime},
};

use super::StatProvider;
use crate::util::normalize_path;

#[derive(Debug, Clone)]
struct MockFile {
    modified: SystemTime,
    contents: Vec<u8>,
}

#[derive(Debug, Default)]
struct Inner {
    files: HashMap<PathBuf, MockFile>,
    clock: u64,
}

/// In-memory files with a logical clock: every write or touch happens one
/// second after the previous one, so modification order is always strict.
///
/// Clones share the same files.
#[derive(Debug, Clone, Default)]
pub struct MockStat {
    inner: Arc<Mutex<Inner>>,
}

impl MockStat {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tick(inner: &mut Inner) -> SystemTime {
        inner.clock += 1;
        SystemTime::UNIX_EPOCH + Duration::from_secs(inner.clock)
    }

    /// Creates or replaces a file, stamping it with the next clock tick.
    pub fn write(&self, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) {
        let mut inner = self.lock();
        let modified = Self::tick(&mut inner);
        inner.files.insert(
            normalize_path(path.as_ref()),
            MockFile {
                modified,
                contents: contents.into(),
            },
        );
    }

    /// Bumps the modification time without changing contents. Creates an
    /// empty file if needed.
    pub fn touch(&self, path: impl AsRef<Path>) {
        let mut inner = self.lock();
        let modified = Self::tick(&mut inner);
        inner
            .files
            .entry(normalize_path(path.as_ref()))
            .and_modify(|f| f.modified = modified)
            .or_insert(MockFile {
                modified,
                contents: Vec::new(),
            });
    }

    /// Sets an explicit modification time, e.g. to rewrite a file "in the past".
    pub fn set_modified(&self, path: impl AsRef<Path>, modified: SystemTime) {
        if let Some(file) = self.lock().files.get_mut(&normalize_path(path.as_ref())) {
            file.modified = modified;
        }
    }

    pub fn remove(&self, path: impl AsRef<Path>) {
        self.lock().files.remove(&normalize_path(path.as_ref()));
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.lock()
            .files
            .get(&normalize_path(path.as_ref()))
            .map(|f| f.contents.clone())
    }
}

impl StatProvider for MockStat {
    fn modified(&self, path: &Path) -> io::Result<Option<SystemTime>> {
        Ok(self
            .lock()
            .files
            .get(&normalize_path(path))
            .map(|f| f.modified))
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.contents(path).ok_or_else(|| {
            io::Error::new(
                ErrorKind::NotFound,
                format!("File not found: {}", path.display()),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_strictly_increasing() {
        let stat = MockStat::new();
        stat.write("a", "1");
        stat.write("b", "2");
        let a = stat.modified(Path::new("a")).unwrap().unwrap();
        let b = stat.modified(Path::new("./b")).unwrap().unwrap();
        assert!(b > a);

        stat.touch("a");
        assert!(stat.modified(Path::new("a")).unwrap().unwrap() > b);
        assert_eq!(stat.contents("a").unwrap(), b"1");
    }

    #[test]
    fn removed_files_are_absent() {
        let stat = MockStat::new();
        stat.write("gone", "x");
        stat.remove("gone");
        assert_eq!(stat.modified(Path::new("gone")).unwrap(), None);
        assert_eq!(
            stat.read(Path::new("gone")).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
}
