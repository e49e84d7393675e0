//! Directory-backed `ObjectStore`.
//!
//! `<root>/<bucket>/<key>` holds each object. Listings walk the deepest
//! directory the prefix names, in file-name order, and are produced lazily.
//! The entity tag is a weak `size-mtime` value, not a content hash.

use std::{
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};

use chrono::{DateTime, Utc};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use bidsweep_contracts::{
    error::{SweepError, SweepResult},
    subject::ObjectInfo,
};
use bidsweep_core::traits::{ObjectIter, ObjectStore};

fn storage_error(reason: String) -> SweepError {
    SweepError::StorageError { reason }
}

#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The filesystem path of `bucket/key`. Keys may not escape the bucket.
    fn object_path(&self, bucket: &str, key: &str) -> SweepResult<PathBuf> {
        if key.is_empty() {
            return Err(storage_error(format!("invalid object key '{bucket}/'")));
        }
        self.bucket_path(bucket, key)
    }

    /// `bucket` joined with a relative path made only of normal components.
    fn bucket_path(&self, bucket: &str, relative: &str) -> SweepResult<PathBuf> {
        let relative_path = Path::new(relative);
        let escapes = relative_path
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if bucket.is_empty() || bucket.contains('/') || escapes {
            return Err(storage_error(format!("invalid object key '{bucket}/{relative}'")));
        }
        Ok(self.root.join(bucket).join(relative_path))
    }
}

/// `entry`'s key relative to `bucket_root`, `/`-separated.
fn object_key(bucket_root: &Path, entry: &DirEntry) -> Option<String> {
    let relative = entry.path().strip_prefix(bucket_root).ok()?;
    let segments: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
    Some(segments?.join("/"))
}

fn object_info(key: String, entry: &DirEntry) -> SweepResult<ObjectInfo> {
    let metadata = entry
        .metadata()
        .map_err(|e| storage_error(format!("failed to stat '{key}': {e}")))?;
    let modified = metadata
        .modified()
        .map_err(|e| storage_error(format!("no modification time for '{key}': {e}")))?;
    let last_modified = DateTime::<Utc>::from(modified);

    Ok(ObjectInfo {
        etag: format!("W/\"{:x}-{:x}\"", metadata.len(), last_modified.timestamp()),
        key,
        size: metadata.len(),
        last_modified,
    })
}

impl ObjectStore for LocalObjectStore {
    fn list<'a>(&'a self, bucket: &str, prefix: &str) -> ObjectIter<'a> {
        let bucket_root = self.root.join(bucket);
        let folder = prefix.rfind('/').map_or("", |end| &prefix[..end]);
        let start = match self.bucket_path(bucket, folder) {
            Ok(start) => start,
            Err(e) => return Box::new(std::iter::once(Err(e))),
        };
        if !start.is_dir() {
            debug!(bucket, prefix, "nothing to list");
            return Box::new(std::iter::empty());
        }

        let prefix = prefix.to_string();
        let walker = WalkDir::new(start).follow_links(false).sort_by_file_name();
        Box::new(walker.into_iter().filter_map(move |entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => return Some(Err(storage_error(format!("listing '{prefix}' failed: {e}")))),
            };
            if !entry.file_type().is_file() {
                return None;
            }
            let key = object_key(&bucket_root, &entry)?;
            if !key.starts_with(&prefix) {
                return None;
            }
            Some(object_info(key, &entry))
        }))
    }

    fn get(&self, bucket: &str, key: &str) -> SweepResult<Option<Vec<u8>>> {
        let path = self.object_path(bucket, key)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error(format!("failed to read '{bucket}/{key}': {e}"))),
        }
    }

    fn put(&self, bucket: &str, key: &str, body: &[u8]) -> SweepResult<()> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| storage_error(format!("failed to create '{}': {e}", parent.display())))?;
        }
        std::fs::write(&path, body).map_err(|e| storage_error(format!("failed to write '{bucket}/{key}': {e}")))?;
        debug!(bucket, key, bytes = body.len(), "object written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bidsweep_contracts::error::SweepError;
    use bidsweep_core::traits::ObjectStore;

    use super::LocalObjectStore;

    fn keys(store: &LocalObjectStore, prefix: &str) -> Vec<String> {
        store
            .list("bids", prefix)
            .map(|o| o.unwrap().key)
            .collect()
    }

    #[test]
    fn put_then_list_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        store.put("bids", "study/sub-02/ses-V01/anat/b.nii.gz", b"bb").unwrap();
        store.put("bids", "study/sub-01/ses-V01/anat/a.nii.gz", b"a").unwrap();
        store.put("bids", "study/sub-010/ses-V01/anat/c.nii.gz", b"c").unwrap();

        assert_eq!(
            keys(&store, "study/"),
            vec![
                "study/sub-01/ses-V01/anat/a.nii.gz",
                "study/sub-010/ses-V01/anat/c.nii.gz",
                "study/sub-02/ses-V01/anat/b.nii.gz",
            ]
        );
        assert_eq!(keys(&store, "study/sub-01/"), vec!["study/sub-01/ses-V01/anat/a.nii.gz"]);

        let info = store.list("bids", "study/sub-02/").next().unwrap().unwrap();
        assert_eq!(info.size, 2);
        assert!(info.etag.starts_with("W/"));

        assert_eq!(store.get("bids", "study/sub-02/ses-V01/anat/b.nii.gz").unwrap(), Some(b"bb".to_vec()));
    }

    #[test]
    fn missing_objects_and_prefixes_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        assert!(keys(&store, "nothing/here/").is_empty());
        assert_eq!(store.get("bids", "nothing.json").unwrap(), None);
    }

    #[test]
    fn keys_cannot_escape_the_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        assert!(matches!(
            store.put("bids", "../outside.txt", b"x"),
            Err(SweepError::StorageError { .. })
        ));
        assert!(store.get("bids", "/etc/passwd").is_err());
    }

    #[test]
    fn listing_cannot_escape_the_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path().join("objects"));
        store.put("bids", "study/a.txt", b"a").unwrap();
        store.put("other", "secret/b.txt", b"b").unwrap();

        let listed: Vec<_> = store.list("bids", "../other/secret/").collect();
        assert_eq!(listed.len(), 1);
        assert!(matches!(listed[0], Err(SweepError::StorageError { .. })));
        assert!(store.list("bids", "/etc/").next().unwrap().is_err());
        assert_eq!(keys(&store, "study/"), vec!["study/a.txt"]);
    }
}
