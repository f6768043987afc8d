use crate::{Error, Fetch, Store};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// In-memory store. Doubles as the test fixture server: it records every
/// fetched path so tests can assert on which objects a query touched.
#[derive(Default)]
pub struct MemStore {
    objects: Mutex<BTreeMap<String, Bytes>>,
    fetched: Mutex<Vec<String>>,
    fail_next: Mutex<BTreeMap<String, u32>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths fetched so far, in request order.
    pub fn fetched_paths(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    /// Make the next `count` fetches of `path` fail with a transient error.
    pub fn fail_next(&self, path: &str, count: u32) {
        self.fail_next
            .lock()
            .unwrap()
            .insert(path.to_string(), count);
    }

    pub fn insert(&self, path: &str, data: impl Into<Bytes>) {
        self.objects
            .lock()
            .unwrap()
            .insert(path.to_string(), data.into());
    }
}

#[async_trait::async_trait]
impl Fetch for MemStore {
    async fn fetch(&self, path: &str) -> Result<Bytes, Error> {
        self.fetched.lock().unwrap().push(path.to_string());

        {
            let mut failures = self.fail_next.lock().unwrap();
            if let Some(remaining) = failures.get_mut(path) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(Error::Status {
                        path: path.to_string(),
                        status: 503,
                    });
                }
            }
        }

        self.objects
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::NotFound(path.to_string()))
    }
}

#[async_trait::async_trait]
impl Store for MemStore {
    async fn put(&self, path: &str, data: Bytes) -> Result<(), Error> {
        self.insert(path, data);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, Error> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn exists(&self, path: &str) -> Result<bool, Error> {
        Ok(self.objects.lock().unwrap().contains_key(path))
    }
}
