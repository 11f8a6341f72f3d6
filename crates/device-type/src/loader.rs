use crate::config::DeviceConfig;
use crate::error::RegistryError;
use crate::registry::HandlerRegistry;
use crate::types::DeviceType;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Handler reference handed to the device-session component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct HandlerSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl HandlerSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct HandlerEntry {
    pub flavour: String,
    /// Omitted means any version.
    #[serde(default)]
    pub version: Option<String>,
    pub handler: HandlerSpec,
}

impl HandlerEntry {
    pub fn pattern(&self) -> DeviceType {
        match &self.version {
            Some(v) => DeviceType::new(self.flavour.as_str(), v.as_str()),
            None => DeviceType::any_version(self.flavour.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct HandlerManifest {
    #[serde(default)]
    pub default: Option<HandlerSpec>,
    #[serde(default)]
    pub handlers: Vec<HandlerEntry>,
}

impl HandlerManifest {
    /// Build a registry, stopping at the first conflicting pattern.
    pub fn into_registry(self) -> Result<HandlerRegistry<HandlerSpec>, RegistryError> {
        let reg = HandlerRegistry::new();
        self.register_into(&reg)?;
        Ok(reg)
    }

    pub fn register_into(self, reg: &HandlerRegistry<HandlerSpec>) -> Result<(), RegistryError> {
        for entry in self.handlers {
            let pattern = entry.pattern();
            reg.register(pattern, entry.handler)?;
        }
        if let Some(default) = self.default {
            reg.set_default(default)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct DeviceInventory {
    pub devices: BTreeMap<String, DeviceConfig>,
}

impl DeviceInventory {
    /// Returns the config previously stored under the same id, if any.
    pub fn insert(&mut self, config: DeviceConfig) -> Option<DeviceConfig> {
        self.devices.insert(config.id.clone(), config)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> anyhow::Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading {what}: {}", path.display()))?;
    let val: Value =
        serde_yaml::from_str(&raw).with_context(|| format!("parsing yaml: {}", path.display()))?;
    serde_yaml::from_value(val).with_context(|| format!("decoding {what}: {}", path.display()))
}

pub fn load_device_config_file(path: impl AsRef<Path>) -> anyhow::Result<DeviceConfig> {
    read_yaml(path.as_ref(), "device config")
}

pub fn load_device_configs_dir(dir: impl AsRef<Path>) -> anyhow::Result<DeviceInventory> {
    let mut inv = DeviceInventory::default();
    let mut entries: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir.as_ref())
        .with_context(|| format!("listing device configs: {}", dir.as_ref().display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if let Some(ext) = path.extension() {
            if ext == "yml" || ext == "yaml" {
                entries.push(path);
            }
        }
    }
    entries.sort();
    for p in entries {
        let cfg = load_device_config_file(&p)?;
        let id = cfg.id.clone();
        if inv.insert(cfg).is_some() {
            anyhow::bail!("duplicate device id {id:?} in {}", p.display());
        }
    }
    tracing::debug!(count = inv.len(), "loaded device configs");
    Ok(inv)
}

pub fn load_handler_manifest(path: impl AsRef<Path>) -> anyhow::Result<HandlerManifest> {
    read_yaml(path.as_ref(), "handler manifest")
}
