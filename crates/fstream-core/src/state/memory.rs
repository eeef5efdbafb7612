use std::collections::BTreeMap;
use std::future::Future;
use std::ops::Bound;
use std::pin::Pin;

use tokio::sync::RwLock;

use super::StateStore;
use crate::error::FsError;

/// Ordered in-memory state store. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn put<'a>(
        &'a self,
        key: &'a str,
        value: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), FsError>> + Send + 'a>> {
        Box::pin(async move {
            self.entries.write().await.insert(key.to_string(), value);
            Ok(())
        })
    }

    fn get<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, FsError>> + Send + 'a>> {
        Box::pin(async move {
            self.entries
                .read()
                .await
                .get(key)
                .cloned()
                .ok_or_else(|| FsError::StateNotFound(key.to_string()))
        })
    }

    fn list<'a>(
        &'a self,
        start_inclusive: &'a str,
        end_exclusive: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, FsError>> + Send + 'a>> {
        Box::pin(async move {
            // BTreeMap::range panics on an inverted range.
            if start_inclusive >= end_exclusive {
                return Ok(Vec::new());
            }
            let entries = self.entries.read().await;
            let keys = entries
                .range::<str, _>((
                    Bound::Included(start_inclusive),
                    Bound::Excluded(end_exclusive),
                ))
                .map(|(k, _)| k.clone())
                .collect();
            Ok(keys)
        })
    }

    fn delete<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), FsError>> + Send + 'a>> {
        Box::pin(async move {
            self.entries.write().await.remove(key);
            Ok(())
        })
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}
