//! Per-device configuration as handed over by the ingestion pipeline, and the
//! rules that turn it into a [`DeviceType`].

use crate::error::DeviceTypeError;
use crate::types::{DeviceType, WILDCARD_VERSION};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const CLI_CHANNEL: &str = "cli";
pub const FLAVOUR_KEY: &str = "flavour";
pub const FLAVOUR_VERSION_KEY: &str = "flavourVersion";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct DeviceConfig {
    pub id: String,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default, alias = "channelConfigs")]
    pub channels: BTreeMap<String, ChannelConfig>,
}

/// Flat key/value block for one communication mechanism.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct ChannelConfig {
    #[serde(default, alias = "kvPairs")]
    pub kv_pairs: BTreeMap<String, String>,
}

impl DeviceConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_channel(mut self, name: impl Into<String>, channel: ChannelConfig) -> Self {
        self.channels.insert(name.into(), channel);
        self
    }

    pub fn channel(&self, name: &str) -> Option<&ChannelConfig> {
        self.channels.get(name)
    }
}

impl<K, V> FromIterator<(K, V)> for ChannelConfig
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            kv_pairs: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl DeviceType {
    /// Apply the flavour policy to a `cli` key/value block.
    ///
    /// Presence is decided by key existence only: an empty `flavour` is a
    /// vendor named `""`, and an empty `flavourVersion` is a literal empty
    /// version rather than a wildcard.
    pub fn from_kv_pairs(kv_pairs: &BTreeMap<String, String>) -> Self {
        match kv_pairs.get(FLAVOUR_KEY) {
            Some(flavour) => {
                let version = kv_pairs
                    .get(FLAVOUR_VERSION_KEY)
                    .map(String::as_str)
                    .unwrap_or(WILDCARD_VERSION);
                DeviceType::new(flavour.as_str(), version)
            }
            None => DeviceType::default_instance(),
        }
    }

    /// Derive the identity of a configured device.
    ///
    /// A device without a `cli` channel is misconfigured and is reported, not
    /// papered over with the default instance.
    pub fn from_config(config: &DeviceConfig) -> Result<Self, DeviceTypeError> {
        let cli = config
            .channel(CLI_CHANNEL)
            .ok_or_else(|| DeviceTypeError::MissingChannel {
                device_id: config.id.clone(),
                channel: CLI_CHANNEL,
            })?;
        let device_type = Self::from_kv_pairs(&cli.kv_pairs);
        tracing::debug!(device_id = %config.id, %device_type, "derived device type");
        Ok(device_type)
    }
}

impl TryFrom<&DeviceConfig> for DeviceType {
    type Error = DeviceTypeError;

    fn try_from(config: &DeviceConfig) -> Result<Self, Self::Error> {
        Self::from_config(config)
    }
}
