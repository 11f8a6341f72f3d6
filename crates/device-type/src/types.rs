use core::cmp::Ordering;
use core::fmt;
use serde::{Deserialize, Serialize};

/// Version sentinel meaning "any version of this vendor".
pub const WILDCARD_VERSION: &str = "*";

/// Flavour reserved for [`DeviceType::default_instance`].
pub const DEFAULT_DEVICE: &str = "default";

/// Vendor/version identity of a managed device.
///
/// Ordering is lexicographic on `device`, then `version`. Both strings are
/// compared as-is: no case folding, no trimming.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct DeviceType {
    device: String,
    version: String,
}

impl DeviceType {
    pub fn new(device: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            version: version.into(),
        }
    }

    /// `(device, "*")`: any version of `device`.
    pub fn any_version(device: impl Into<String>) -> Self {
        Self::new(device, WILDCARD_VERSION)
    }

    /// Identity used when a device carries no vendor information: `{default: *}`.
    pub fn default_instance() -> Self {
        Self::any_version(DEFAULT_DEVICE)
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn is_wildcard(&self) -> bool {
        self.version == WILDCARD_VERSION
    }

    pub fn is_default_instance(&self) -> bool {
        self.device == DEFAULT_DEVICE && self.is_wildcard()
    }

    /// The vendor-wide pattern this type falls back to.
    pub fn wildcard_of(&self) -> Self {
        Self::any_version(self.device.clone())
    }
}

impl Default for DeviceType {
    fn default() -> Self {
        Self::default_instance()
    }
}

// The only ordering primitive; every comparison operator derives from it.
impl Ord for DeviceType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.device
            .cmp(&other.device)
            .then_with(|| self.version.cmp(&other.version))
    }
}

impl PartialOrd for DeviceType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}: {}}}", self.device, self.version)
    }
}
