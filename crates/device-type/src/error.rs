use crate::DeviceType;
use thiserror::Error;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Failure to derive a [`DeviceType`] from device configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceTypeError {
    #[error("device {device_id:?} has no {channel:?} channel configured")]
    MissingChannel {
        device_id: String,
        channel: &'static str,
    },
}

/// Registration rejected by a [`crate::HandlerRegistry`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("handler already registered for {pattern}")]
    Conflict { pattern: DeviceType },
    #[error("default handler already configured")]
    DefaultConflict,
}

/// Lookup found neither a vendor handler nor a default.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no handler for device type {device_type}")]
    Unresolved { device_type: DeviceType },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    DeviceType(#[from] DeviceTypeError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}
