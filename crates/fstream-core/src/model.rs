use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationErrors;

/// Free-form string configuration passed through to workers and tubes.
pub type ConfigMap = HashMap<String, String>;

static NAME_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9.-]*$"));

/// A named topic plus its free-form configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicConfig {
    pub name: String,
    #[serde(default)]
    pub config: ConfigMap,
}

impl TopicConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: ConfigMap::new(),
        }
    }
}

/// A deployment request: bind `module` of `package` to the given topics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub package: String,
    pub module: String,
    #[serde(default)]
    pub sources: Vec<TopicConfig>,
    #[serde(default)]
    pub sink: TopicConfig,
    #[serde(default)]
    pub config: ConfigMap,
}

impl Function {
    /// Check required fields and identifier charsets.
    ///
    /// Reports every offending field rather than stopping at the first one.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errs = ValidationErrors::new();
        check_identifier(&mut errs, "name", &self.name);
        check_identifier(&mut errs, "package", &self.package);
        check_identifier(&mut errs, "module", &self.module);
        for (i, source) in self.sources.iter().enumerate() {
            if source.name.is_empty() {
                errs.push(format!("sources[{i}].name"), "is required");
            }
        }
        errs.into_result()
    }
}

fn check_identifier(errs: &mut ValidationErrors, field: &str, value: &str) {
    if value.is_empty() {
        errs.push(field, "is required");
    } else if !matches!(&*NAME_PATTERN, Ok(re) if re.is_match(value)) {
        errs.push(
            field,
            format!("{value:?} must contain only alphanumerics, '-' and '.'"),
        );
    }
}

/// Declared schema of one config item a module accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleConfigItem {
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default)]
    pub required: bool,
}

/// Config item name → schema.
pub type ModuleConfig = HashMap<String, ModuleConfigItem>;

/// A deployable contract. `package_type` selects the runtime adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    #[serde(rename = "type")]
    pub package_type: String,
    #[serde(default)]
    pub modules: HashMap<String, ModuleConfig>,
}

impl Package {
    pub fn has_module(&self, module: &str) -> bool {
        self.modules.contains_key(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_function() -> Function {
        Function {
            name: "f1".into(),
            package: "p".into(),
            module: "default".into(),
            sources: vec![TopicConfig::new("in")],
            sink: TopicConfig::new("out"),
            config: ConfigMap::new(),
        }
    }

    #[test]
    fn valid_function_passes() {
        assert!(valid_function().validate().is_ok());
    }

    #[test]
    fn dotted_and_dashed_names_are_accepted() {
        let mut f = valid_function();
        f.name = "my-func.v2".into();
        assert!(f.validate().is_ok());
    }

    #[test]
    fn empty_function_lists_every_required_field() {
        let errs = Function::default().validate().unwrap_err();
        assert_eq!(errs.fields(), vec!["name", "package", "module"]);
    }

    #[test]
    fn bad_charset_is_rejected() {
        let mut f = valid_function();
        f.name = "bad name!".into();
        f.sources.push(TopicConfig::default());
        let errs = f.validate().unwrap_err();
        assert_eq!(errs.fields(), vec!["name", "sources[1].name"]);
    }

    #[test]
    fn function_deserializes_with_defaults() {
        let f: Function = serde_json::from_value(serde_json::json!({
            "name": "f1",
            "package": "p",
            "module": "default",
        }))
        .unwrap();
        assert!(f.sources.is_empty());
        assert_eq!(f.sink, TopicConfig::default());
    }

    #[test]
    fn package_type_uses_type_key() {
        let p: Package = serde_json::from_value(serde_json::json!({
            "name": "p",
            "type": "external",
            "modules": {
                "default": { "money": { "type": "int", "required": true } }
            }
        }))
        .unwrap();
        assert_eq!(p.package_type, "external");
        assert!(p.has_module("default"));
        assert!(p.modules["default"]["money"].required);
    }
}
