//! device-type: vendor/version identity of managed network devices
//!
//! A device's `cli` channel configuration names its vendor (`flavour`) and,
//! optionally, its version (`flavourVersion`). This crate turns that into a
//! totally ordered [`DeviceType`] and resolves it against a
//! [`HandlerRegistry`] of exact and wildcard-version handlers.

mod types;
pub use types::{DeviceType, DEFAULT_DEVICE, WILDCARD_VERSION};

mod error;
pub use error::{DeviceTypeError, Error, RegistryError, ResolveError, Result};

mod config;
pub use config::{ChannelConfig, DeviceConfig, CLI_CHANNEL, FLAVOUR_KEY, FLAVOUR_VERSION_KEY};

mod registry;
pub use registry::{HandlerRegistry, MatchKind, Resolved};

mod loader;
pub use loader::{
    load_device_config_file, load_device_configs_dir, load_handler_manifest, DeviceInventory,
    HandlerEntry, HandlerManifest, HandlerSpec,
};

mod metrics;
pub use metrics::{MetricsHub, RegistryMetrics};
