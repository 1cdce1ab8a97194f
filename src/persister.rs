use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as SyncMutex, PoisonError};
use thiserror::Error;
use tokio::fs;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::mapper::MappedLocation;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to check {}: {source}", .path.display())]
    Check {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result of preparing a mapped location for writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A file is already there; the URL must not be fetched.
    Exists(PathBuf),
    Vacant(PathBuf),
}

type LockMap = SyncMutex<HashMap<PathBuf, Arc<Mutex<()>>>>;

/// Exclusive access to one target path. The path's entry is dropped from the
/// lock map once no other task holds or waits for it.
pub struct PathGuard<'a> {
    path: PathBuf,
    locks: &'a LockMap,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&self.path)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.path);
        }
    }
}

/// Writes fetched content under the output root.
///
/// Directory creation tolerates siblings creating the same ancestors. Writers
/// targeting the same file are serialized through [`Persister::lock`].
#[derive(Debug)]
pub struct Persister {
    root: PathBuf,
    locks: LockMap,
}

impl Persister {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            locks: SyncMutex::new(HashMap::new()),
        }
    }

    pub fn target_path(&self, location: &MappedLocation) -> PathBuf {
        location.file_in(&self.root)
    }

    /// Holds exclusive access to `target` until the guard is dropped.
    pub async fn lock(&self, target: &Path) -> PathGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(target.to_path_buf()).or_default())
        };
        PathGuard {
            path: target.to_path_buf(),
            locks: &self.locks,
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Creates the location's directories and reports whether the file exists.
    pub async fn prepare(&self, location: &MappedLocation) -> Result<Target, PersistError> {
        let dir = location.directory_in(&self.root);
        // create_dir_all treats a directory created concurrently as success.
        fs::create_dir_all(&dir)
            .await
            .map_err(|source| PersistError::CreateDir {
                path: dir.clone(),
                source,
            })?;

        check_target(self.target_path(location)).await
    }

    /// Writes `content` as UTF-8 through a `.part` sibling, then renames it
    /// into place. Returns the number of bytes written.
    pub async fn write(&self, target: &Path, content: &str) -> Result<u64, PersistError> {
        let part_path = part_path(target);
        let write_err = |source| PersistError::Write {
            path: target.to_path_buf(),
            source,
        };

        fs::write(&part_path, content.as_bytes())
            .await
            .map_err(write_err)?;
        if let Err(err) = fs::rename(&part_path, target).await {
            let _ = fs::remove_file(&part_path).await;
            return Err(write_err(err));
        }

        Ok(content.len() as u64)
    }
}

/// Any error other than "not found" fails the item before it is fetched.
async fn check_target(target: PathBuf) -> Result<Target, PersistError> {
    match fs::try_exists(&target).await {
        Ok(true) => Ok(Target::Exists(target)),
        Ok(false) => Ok(Target::Vacant(target)),
        Err(source) => Err(PersistError::Check {
            path: target,
            source,
        }),
    }
}

fn part_path(target: &Path) -> PathBuf {
    let mut part = target.to_path_buf();
    match target.extension() {
        Some(ext) => {
            let mut ext = ext.to_os_string();
            ext.push(".part");
            part.set_extension(ext);
        }
        None => {
            part.set_extension("part");
        }
    }
    part
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::map_url;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn part_path_appends_suffix() {
        assert_eq!(part_path(Path::new("a/b.js")), PathBuf::from("a/b.js.part"));
        assert_eq!(part_path(Path::new("a/b")), PathBuf::from("a/b.part"));
    }

    #[tokio::test]
    async fn prepare_creates_directories_and_reports_vacant() {
        let dir = tempdir().unwrap();
        let persister = Persister::new(dir.path().to_path_buf());
        let loc = map_url("https://example.com/static/js/app.js");

        let target = persister.prepare(&loc).await.unwrap();
        let expected = dir.path().join("example.com/static/js/app.js");
        assert_eq!(target, Target::Vacant(expected));
        assert!(dir.path().join("example.com/static/js").is_dir());
    }

    #[tokio::test]
    async fn write_then_prepare_reports_exists() {
        let dir = tempdir().unwrap();
        let persister = Persister::new(dir.path().to_path_buf());
        let loc = map_url("https://example.com/app.js");

        let Target::Vacant(path) = persister.prepare(&loc).await.unwrap() else {
            panic!("fresh root should be vacant");
        };
        let written = persister.write(&path, "let x = 'é';").await.unwrap();
        assert_eq!(written, "let x = 'é';".len() as u64);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "let x = 'é';");
        assert!(!part_path(&path).exists());

        assert_eq!(persister.prepare(&loc).await.unwrap(), Target::Exists(path));
    }

    #[tokio::test]
    async fn concurrent_prepare_of_shared_ancestors() {
        let dir = tempdir().unwrap();
        let persister = Arc::new(Persister::new(dir.path().to_path_buf()));

        let mut set = tokio::task::JoinSet::new();
        for i in 0..32 {
            let persister = Arc::clone(&persister);
            set.spawn(async move {
                let loc = map_url(&format!("https://example.com/a/b/c/{}.js", i));
                persister.prepare(&loc).await
            });
        }
        while let Some(res) = set.join_next().await {
            assert!(matches!(res.unwrap(), Ok(Target::Vacant(_))));
        }
    }

    #[tokio::test]
    async fn unwritable_root_is_an_error() {
        let dir = tempdir().unwrap();
        let file_root = dir.path().join("not-a-dir");
        std::fs::write(&file_root, b"x").unwrap();
        let persister = Persister::new(file_root);

        let err = persister
            .prepare(&map_url("https://example.com/app.js"))
            .await
            .unwrap_err();
        assert!(matches!(err, PersistError::CreateDir { .. }));
    }

    #[tokio::test]
    async fn lock_serializes_same_path() {
        let dir = tempdir().unwrap();
        let persister = Arc::new(Persister::new(dir.path().to_path_buf()));
        let target = dir.path().join("same.js");

        let guard = persister.lock(&target).await;
        let waiter = {
            let persister = Arc::clone(&persister);
            let target = target.clone();
            tokio::spawn(async move {
                let _guard = persister.lock(&target).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        // A different path is not blocked.
        let _other = persister.lock(&dir.path().join("other.js")).await;

        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn released_locks_are_pruned() {
        let dir = tempdir().unwrap();
        let persister = Arc::new(Persister::new(dir.path().to_path_buf()));
        let target = dir.path().join("a.js");

        let first = persister.lock(&target).await;
        let waiter = {
            let persister = Arc::clone(&persister);
            let target = target.clone();
            tokio::spawn(async move {
                let _guard = persister.lock(&target).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The waiter still references the entry.
        drop(first);
        assert!(persister.locks.lock().unwrap().len() <= 1);
        waiter.await.unwrap();
        assert!(persister.locks.lock().unwrap().is_empty());

        for i in 0..16 {
            let _guard = persister.lock(&dir.path().join(format!("{}.js", i))).await;
        }
        assert!(persister.locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreadable_target_fails_the_check() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("plain");
        std::fs::write(&file, b"x").unwrap();

        let err = check_target(file.join("app.js")).await.unwrap_err();
        assert!(matches!(err, PersistError::Check { .. }));
        assert_eq!(
            check_target(dir.path().join("missing.js")).await.unwrap(),
            Target::Vacant(dir.path().join("missing.js"))
        );
    }
}
