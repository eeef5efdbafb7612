use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result, bail};
use fstream_core::{BrokerConfig, Function, Package};
use fstream_runtime::AdapterConfig;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address the worker endpoint listens on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Delay between startup deploy attempts while a function's module has
    /// no worker yet.
    #[serde(default = "default_deploy_retry_ms")]
    pub deploy_retry_ms: u64,
    #[serde(default)]
    pub adapter: AdapterConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub packages: Vec<Package>,
    /// Functions deployed once their module is claimed by a worker.
    #[serde(default)]
    pub functions: Vec<Function>,
}

fn default_listen_addr() -> String {
    "127.0.0.1:7400".into()
}
fn default_deploy_retry_ms() -> u64 {
    1000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            deploy_retry_ms: default_deploy_retry_ms(),
            adapter: AdapterConfig::default(),
            broker: BrokerConfig::default(),
            packages: Vec::new(),
            functions: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// Reject configs that could never deploy cleanly: duplicate package
    /// names, malformed functions, or functions naming an unknown package or
    /// module.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for package in &self.packages {
            if !names.insert(package.name.as_str()) {
                bail!("package {} is declared more than once", package.name);
            }
            if package.package_type != self.adapter.package_type {
                tracing::warn!(
                    package = %package.name,
                    package_type = %package.package_type,
                    "Package type has no runtime in this server"
                );
            }
        }

        let mut functions = HashSet::new();
        for function in &self.functions {
            function
                .validate()
                .with_context(|| format!("function {:?} is invalid", function.name))?;
            if !functions.insert(function.name.as_str()) {
                bail!("function {} is declared more than once", function.name);
            }
            let Some(package) = self.packages.iter().find(|p| p.name == function.package) else {
                bail!(
                    "function {} uses unknown package {}",
                    function.name,
                    function.package
                );
            };
            if !package.has_module(&function.module) {
                bail!(
                    "function {} uses module {} which package {} does not declare",
                    function.name,
                    function.module,
                    package.name
                );
            }
        }
        Ok(())
    }
}
