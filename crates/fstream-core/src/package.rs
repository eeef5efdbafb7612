use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::FsError;
use crate::model::Package;

/// Read-only lookup of deployable packages.
///
/// Uses Pin<Box<dyn Future>> for dyn-compatibility.
pub trait PackageCatalog: Send + Sync {
    /// Resolve a package by name, or [`FsError::PackageNotFound`].
    fn load<'a>(
        &'a self,
        name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Arc<Package>, FsError>> + Send + 'a>>;

    /// Every package currently known, sorted by name.
    fn list<'a>(&'a self) -> Pin<Box<dyn Future<Output = Vec<Arc<Package>>> + Send + 'a>>;

    fn backend_name(&self) -> &str;
}

/// In-memory catalog. Packages are immutable once registered; `upsert`
/// swaps in a new descriptor rather than mutating the old one.
#[derive(Debug, Default)]
pub struct MemoryPackageCatalog {
    packages: RwLock<HashMap<String, Arc<Package>>>,
}

impl MemoryPackageCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from a fixed set of packages. Later duplicates win.
    pub fn with_packages(packages: impl IntoIterator<Item = Package>) -> Self {
        let packages = packages
            .into_iter()
            .map(|p| (p.name.clone(), Arc::new(p)))
            .collect();
        Self {
            packages: RwLock::new(packages),
        }
    }

    pub async fn register(&self, package: Package) -> Result<(), FsError> {
        let mut packages = self.packages.write().await;
        if packages.contains_key(&package.name) {
            return Err(FsError::PackageAlreadyExists(package.name));
        }
        tracing::info!(package = %package.name, package_type = %package.package_type, "Registered package");
        packages.insert(package.name.clone(), Arc::new(package));
        Ok(())
    }

    pub async fn upsert(&self, package: Package) {
        tracing::info!(package = %package.name, package_type = %package.package_type, "Updated package");
        self.packages
            .write()
            .await
            .insert(package.name.clone(), Arc::new(package));
    }

    pub async fn remove(&self, name: &str) -> Result<Arc<Package>, FsError> {
        self.packages
            .write()
            .await
            .remove(name)
            .ok_or_else(|| FsError::PackageNotFound(name.to_string()))
    }
}

impl PackageCatalog for MemoryPackageCatalog {
    fn load<'a>(
        &'a self,
        name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Arc<Package>, FsError>> + Send + 'a>> {
        Box::pin(async move {
            self.packages
                .read()
                .await
                .get(name)
                .cloned()
                .ok_or_else(|| FsError::PackageNotFound(name.to_string()))
        })
    }

    fn list<'a>(&'a self) -> Pin<Box<dyn Future<Output = Vec<Arc<Package>>> + Send + 'a>> {
        Box::pin(async move {
            let mut packages: Vec<Arc<Package>> =
                self.packages.read().await.values().cloned().collect();
            packages.sort_by(|a, b| a.name.cmp(&b.name));
            packages
        })
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(name: &str) -> Package {
        Package {
            name: name.into(),
            package_type: "external".into(),
            modules: HashMap::from([("default".to_string(), HashMap::new())]),
        }
    }

    #[tokio::test]
    async fn load_registered_package() {
        let catalog = MemoryPackageCatalog::with_packages([package("p")]);
        let loaded = catalog.load("p").await.unwrap();
        assert_eq!(loaded.name, "p");
        assert!(loaded.has_module("default"));
    }

    #[tokio::test]
    async fn load_unknown_is_not_found() {
        let catalog = MemoryPackageCatalog::new();
        let err = catalog.load("ghost").await.unwrap_err();
        assert!(matches!(err, FsError::PackageNotFound(ref n) if n == "ghost"));
    }

    #[tokio::test]
    async fn register_rejects_duplicates() {
        let catalog = MemoryPackageCatalog::new();
        catalog.register(package("p")).await.unwrap();
        let err = catalog.register(package("p")).await.unwrap_err();
        assert!(matches!(err, FsError::PackageAlreadyExists(_)));
    }

    #[tokio::test]
    async fn upsert_replaces_and_remove_forgets() {
        let catalog = MemoryPackageCatalog::with_packages([package("p")]);
        let before = catalog.load("p").await.unwrap();

        let mut updated = package("p");
        updated.modules.insert("counter".into(), HashMap::new());
        catalog.upsert(updated).await;

        // Descriptors already handed out are unaffected.
        assert!(!before.has_module("counter"));
        assert!(catalog.load("p").await.unwrap().has_module("counter"));

        catalog.remove("p").await.unwrap();
        assert!(catalog.load("p").await.is_err());
        assert!(catalog.remove("p").await.is_err());
    }

    #[tokio::test]
    async fn list_is_sorted() {
        let catalog = MemoryPackageCatalog::with_packages([package("b"), package("a")]);
        let names: Vec<String> = catalog.list().await.iter().map(|p| p.name.clone()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
