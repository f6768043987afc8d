use crate::{Error, Fetch, Store};
use bytes::Bytes;
use std::path::{Path, PathBuf};

/// Store rooted at a local directory. Used for local snapshot builds and as
/// the integration-test stand-in for a bucket.
#[derive(Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, Error> {
        // Object paths are forward-slash relative; reject traversal.
        if path.starts_with('/') || path.split('/').any(|part| part == "..") {
            return Err(Error::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(path))
    }
}

#[async_trait::async_trait]
impl Fetch for FsStore {
    async fn fetch(&self, path: &str) -> Result<Bytes, Error> {
        let target = self.resolve(path)?;
        match tokio::fs::read(&target).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(path.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait::async_trait]
impl Store for FsStore {
    async fn put(&self, path: &str, data: Bytes) -> Result<(), Error> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &data).await?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, Error> {
        let dir = self.resolve(prefix.trim_end_matches('/'))?;
        let mut paths = Vec::new();

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(paths),
            Err(err) => return Err(err.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                paths.push(join_prefix(prefix, &entry.file_name()));
            }
        }

        paths.sort();
        Ok(paths)
    }

    async fn exists(&self, path: &str) -> Result<bool, Error> {
        let target = self.resolve(path)?;
        Ok(tokio::fs::try_exists(&target).await?)
    }
}

fn join_prefix(prefix: &str, name: &std::ffi::OsStr) -> String {
    let name = Path::new(name).to_string_lossy();
    format!("{}/{}", prefix.trim_end_matches('/'), name)
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn put_list_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());

        store
            .put("joined/2021_GOA_1.avro", Bytes::from_static(b"a"))
            .await
            .unwrap();
        store
            .put("joined/2021_GOA_2.avro", Bytes::from_static(b"b"))
            .await
            .unwrap();

        let listed = store.list("joined/").await.unwrap();
        assert_eq!(
            listed,
            vec!["joined/2021_GOA_1.avro", "joined/2021_GOA_2.avro"]
        );

        let data = store.fetch("joined/2021_GOA_2.avro").await.unwrap();
        assert_eq!(&data[..], b"b");

        assert!(matches!(
            store.fetch("joined/missing.avro").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        assert!(matches!(
            store.fetch("../escape").await,
            Err(Error::InvalidPath(_))
        ));
    }
}
