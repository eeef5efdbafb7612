pub mod memory;

use std::future::Future;
use std::pin::Pin;

use crate::error::FsError;

/// Key/value state available to deployed functions.
///
/// `get` distinguishes a missing key ([`FsError::StateNotFound`]) from
/// backend failures so callers can fall back to defaults. Concrete durable
/// backends live outside this crate.
pub trait StateStore: Send + Sync {
    fn put<'a>(
        &'a self,
        key: &'a str,
        value: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), FsError>> + Send + 'a>>;

    fn get<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, FsError>> + Send + 'a>>;

    /// Keys in `[start_inclusive, end_exclusive)`, sorted ascending.
    fn list<'a>(
        &'a self,
        start_inclusive: &'a str,
        end_exclusive: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, FsError>> + Send + 'a>>;

    /// Deleting an absent key is not an error.
    fn delete<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), FsError>> + Send + 'a>>;

    /// Backend name for logging and configuration.
    fn backend_name(&self) -> &str;
}
