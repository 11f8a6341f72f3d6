//! Handler lookup keyed by [`DeviceType`] patterns.
//!
//! Patterns are either exact `(device, version)` pairs or vendor wildcards
//! `(device, "*")`. Resolution prefers, in order: an exact entry, the vendor
//! wildcard, the configured default. A wildcard never matches another vendor.
//!
//! The registry is an owned value: build it at startup, then share it behind
//! an `Arc` with session threads. Registration takes a write lock, lookups a
//! read lock, so many readers proceed in parallel once registration is done.

use crate::config::DeviceConfig;
use crate::error::{Error, RegistryError, ResolveError};
use crate::metrics::RegistryMetrics;
use crate::types::DeviceType;
use parking_lot::RwLock;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// How a lookup was satisfied.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum MatchKind {
    Exact,
    Wildcard,
    Default,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::Exact => "exact",
            MatchKind::Wildcard => "wildcard",
            MatchKind::Default => "default",
        }
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a successful lookup.
#[derive(Debug)]
pub struct Resolved<H> {
    pub handler: Arc<H>,
    pub kind: MatchKind,
    /// Registered pattern that matched; `None` when the default was used.
    pub pattern: Option<DeviceType>,
}

impl<H> Clone for Resolved<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            kind: self.kind,
            pattern: self.pattern.clone(),
        }
    }
}

impl<H> Resolved<H> {
    pub fn is_default(&self) -> bool {
        self.kind == MatchKind::Default
    }
}

pub struct HandlerRegistry<H> {
    entries: RwLock<BTreeMap<DeviceType, Arc<H>>>,
    default: RwLock<Option<Arc<H>>>,
    metrics: Option<RegistryMetrics>,
}

impl<H> Default for HandlerRegistry<H> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            default: RwLock::new(None),
            metrics: None,
        }
    }
}

impl<H> fmt::Debug for HandlerRegistry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("patterns", &self.patterns())
            .field("has_default", &self.has_default())
            .finish()
    }
}

impl<H> HandlerRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics(mut self, metrics: RegistryMetrics) -> Self {
        metrics.handlers_registered.set(self.len() as i64);
        self.metrics = Some(metrics);
        self
    }

    /// Register `handler` for `pattern`.
    ///
    /// An identical pattern already present is a conflict: the call fails and
    /// the existing handler stays in place.
    pub fn register(&self, pattern: DeviceType, handler: H) -> Result<(), RegistryError> {
        self.register_arc(pattern, Arc::new(handler))
    }

    pub fn register_arc(&self, pattern: DeviceType, handler: Arc<H>) -> Result<(), RegistryError> {
        let mut entries = self.entries.write();
        match entries.entry(pattern) {
            Entry::Occupied(slot) => {
                tracing::warn!(pattern = %slot.key(), "rejected duplicate handler registration");
                if let Some(m) = &self.metrics {
                    m.conflicts.inc();
                }
                Err(RegistryError::Conflict {
                    pattern: slot.key().clone(),
                })
            }
            Entry::Vacant(slot) => {
                tracing::info!(pattern = %slot.key(), "registered handler");
                slot.insert(handler);
                if let Some(m) = &self.metrics {
                    m.registrations.inc();
                    m.handlers_registered.set(entries.len() as i64);
                }
                Ok(())
            }
        }
    }

    /// Configure the handler used when no vendor pattern matches.
    pub fn set_default(&self, handler: H) -> Result<(), RegistryError> {
        let mut default = self.default.write();
        if default.is_some() {
            tracing::warn!("rejected second default handler");
            if let Some(m) = &self.metrics {
                m.conflicts.inc();
            }
            return Err(RegistryError::DefaultConflict);
        }
        *default = Some(Arc::new(handler));
        tracing::info!("configured default handler");
        Ok(())
    }

    /// Select the most specific handler for a concrete device type.
    pub fn resolve(&self, device_type: &DeviceType) -> Result<Resolved<H>, ResolveError> {
        let found = {
            let entries = self.entries.read();
            let exact = if device_type.is_wildcard() {
                None
            } else {
                entries
                    .get_key_value(device_type)
                    .map(|(k, h)| (k.clone(), Arc::clone(h), MatchKind::Exact))
            };
            exact.or_else(|| {
                entries
                    .get_key_value(&device_type.wildcard_of())
                    .map(|(k, h)| (k.clone(), Arc::clone(h), MatchKind::Wildcard))
            })
        };

        let resolved = match found {
            Some((pattern, handler, kind)) => Resolved {
                handler,
                kind,
                pattern: Some(pattern),
            },
            None => match self.default.read().as_ref() {
                Some(handler) => Resolved {
                    handler: Arc::clone(handler),
                    kind: MatchKind::Default,
                    pattern: None,
                },
                None => {
                    tracing::warn!(%device_type, "no handler for device type");
                    if let Some(m) = &self.metrics {
                        m.misses.inc();
                    }
                    return Err(ResolveError::Unresolved {
                        device_type: device_type.clone(),
                    });
                }
            },
        };

        tracing::debug!(%device_type, kind = %resolved.kind, "resolved handler");
        if let Some(m) = &self.metrics {
            m.record_resolution(resolved.kind);
        }
        Ok(resolved)
    }

    /// Derive the device type from `config` and resolve it.
    pub fn resolve_config(&self, config: &DeviceConfig) -> Result<(DeviceType, Resolved<H>), Error> {
        let device_type = DeviceType::from_config(config)?;
        let resolved = self.resolve(&device_type)?;
        Ok((device_type, resolved))
    }

    pub fn contains(&self, pattern: &DeviceType) -> bool {
        self.entries.read().contains_key(pattern)
    }

    pub fn default_handler(&self) -> Option<Arc<H>> {
        self.default.read().clone()
    }

    pub fn has_default(&self) -> bool {
        self.default.read().is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Registered patterns in ascending order.
    pub fn patterns(&self) -> Vec<DeviceType> {
        self.entries.read().keys().cloned().collect()
    }

    /// Registered `(pattern, handler)` pairs in ascending pattern order.
    pub fn entries(&self) -> Vec<(DeviceType, Arc<H>)> {
        self.entries
            .read()
            .iter()
            .map(|(k, h)| (k.clone(), Arc::clone(h)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChannelConfig, CLI_CHANNEL};
    use crate::metrics::MetricsHub;
    use std::thread;

    fn cisco_registry() -> HandlerRegistry<&'static str> {
        let reg = HandlerRegistry::new();
        reg.register(DeviceType::new("cisco", "15.2"), "H1").unwrap();
        reg.register(DeviceType::any_version("cisco"), "H2").unwrap();
        reg
    }

    #[test]
    fn test_exact_beats_wildcard() {
        let reg = cisco_registry();
        let r = reg.resolve(&DeviceType::new("cisco", "15.2")).unwrap();
        assert_eq!(*r.handler, "H1");
        assert_eq!(r.kind, MatchKind::Exact);
        assert_eq!(r.pattern, Some(DeviceType::new("cisco", "15.2")));
    }

    #[test]
    fn test_wildcard_when_no_exact() {
        let reg = cisco_registry();
        let r = reg.resolve(&DeviceType::new("cisco", "16.0")).unwrap();
        assert_eq!(*r.handler, "H2");
        assert_eq!(r.kind, MatchKind::Wildcard);
        assert_eq!(r.pattern, Some(DeviceType::any_version("cisco")));
    }

    #[test]
    fn test_other_vendor_is_miss_without_default() {
        let reg = cisco_registry();
        let err = reg.resolve(&DeviceType::new("arista", "4.2")).unwrap_err();
        assert_eq!(
            err,
            ResolveError::Unresolved {
                device_type: DeviceType::new("arista", "4.2")
            }
        );
        assert_eq!(err.to_string(), "no handler for device type {arista: 4.2}");
    }

    #[test]
    fn test_other_vendor_falls_back_to_default() {
        let reg = cisco_registry();
        reg.set_default("generic").unwrap();
        let r = reg.resolve(&DeviceType::new("arista", "4.2")).unwrap();
        assert_eq!(*r.handler, "generic");
        assert!(r.is_default());
        assert_eq!(r.pattern, None);
    }

    #[test]
    fn test_wildcard_never_crosses_vendor() {
        let reg = HandlerRegistry::new();
        reg.register(DeviceType::any_version("cisco"), "ios").unwrap();
        assert!(reg.resolve(&DeviceType::new("cisco-nx", "9.3")).is_err());
        assert!(reg.resolve(&DeviceType::new("Cisco", "15.2")).is_err());
        assert!(reg.resolve(&DeviceType::new("*", "15.2")).is_err());
    }

    #[test]
    fn test_exact_only_vendor_misses_other_versions() {
        let reg = HandlerRegistry::new();
        reg.register(DeviceType::new("juniper", "18.1"), "junos18").unwrap();
        assert!(reg.resolve(&DeviceType::new("juniper", "18.1")).is_ok());
        assert!(reg.resolve(&DeviceType::new("juniper", "19.1")).is_err());
        // A wildcard query only matches the vendor wildcard entry.
        assert!(reg.resolve(&DeviceType::any_version("juniper")).is_err());
    }

    #[test]
    fn test_wildcard_query_uses_vendor_entry() {
        let reg = cisco_registry();
        let r = reg.resolve(&DeviceType::any_version("cisco")).unwrap();
        assert_eq!(*r.handler, "H2");
        assert_eq!(r.kind, MatchKind::Wildcard);
    }

    #[test]
    fn test_duplicate_wildcard_rejected_first_kept() {
        let reg = cisco_registry();
        let err = reg
            .register(DeviceType::any_version("cisco"), "H3")
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::Conflict {
                pattern: DeviceType::any_version("cisco")
            }
        );
        assert_eq!(err.to_string(), "handler already registered for {cisco: *}");
        assert_eq!(reg.len(), 2);
        let r = reg.resolve(&DeviceType::new("cisco", "16.0")).unwrap();
        assert_eq!(*r.handler, "H2");
    }

    #[test]
    fn test_duplicate_exact_rejected() {
        let reg = cisco_registry();
        assert!(reg.register(DeviceType::new("cisco", "15.2"), "H9").is_err());
        let r = reg.resolve(&DeviceType::new("cisco", "15.2")).unwrap();
        assert_eq!(*r.handler, "H1");
    }

    #[test]
    fn test_second_default_rejected() {
        let reg: HandlerRegistry<&str> = HandlerRegistry::new();
        reg.set_default("a").unwrap();
        assert_eq!(reg.set_default("b"), Err(RegistryError::DefaultConflict));
        let r = reg.resolve(&DeviceType::default_instance()).unwrap();
        assert_eq!(*r.handler, "a");
    }

    #[test]
    fn test_default_instance_can_be_registered() {
        let reg = HandlerRegistry::new();
        reg.register(DeviceType::default_instance(), "fallback-vendor")
            .unwrap();
        let r = reg.resolve(&DeviceType::default_instance()).unwrap();
        assert_eq!(*r.handler, "fallback-vendor");
        assert_eq!(r.kind, MatchKind::Wildcard);
    }

    #[test]
    fn test_patterns_are_ordered() {
        let reg = HandlerRegistry::new();
        reg.register(DeviceType::new("juniper", "18.1"), 1).unwrap();
        reg.register(DeviceType::new("cisco", "15.2"), 2).unwrap();
        reg.register(DeviceType::any_version("cisco"), 3).unwrap();
        let names: Vec<String> = reg.patterns().iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["{cisco: *}", "{cisco: 15.2}", "{juniper: 18.1}"]);
        assert!(reg.contains(&DeviceType::new("juniper", "18.1")));
        assert_eq!(reg.entries().len(), 3);
    }

    #[test]
    fn test_resolve_config() {
        let reg = cisco_registry();
        let cfg = DeviceConfig::new("r1").with_channel(
            CLI_CHANNEL,
            [("flavour", "cisco")].into_iter().collect::<ChannelConfig>(),
        );
        let (t, r) = reg.resolve_config(&cfg).unwrap();
        assert_eq!(t, DeviceType::any_version("cisco"));
        assert_eq!(*r.handler, "H2");

        let err = reg.resolve_config(&DeviceConfig::new("r2")).unwrap_err();
        assert!(matches!(err, Error::DeviceType(_)));

        let cfg = DeviceConfig::new("r3").with_channel(CLI_CHANNEL, ChannelConfig::default());
        let err = reg.resolve_config(&cfg).unwrap_err();
        assert!(matches!(err, Error::Resolve(ResolveError::Unresolved { .. })));
    }

    #[test]
    fn test_metrics_track_outcomes() {
        let hub = MetricsHub::new().unwrap();
        let reg = HandlerRegistry::new().with_metrics(hub.resolution.clone());
        reg.register(DeviceType::new("cisco", "15.2"), "H1").unwrap();
        reg.register(DeviceType::any_version("cisco"), "H2").unwrap();
        let _ = reg.register(DeviceType::any_version("cisco"), "H3");
        let _ = reg.resolve(&DeviceType::new("cisco", "15.2"));
        let _ = reg.resolve(&DeviceType::new("cisco", "16.0"));
        let _ = reg.resolve(&DeviceType::new("arista", "4.2"));

        let m = &hub.resolution;
        assert_eq!(m.registrations.get(), 2);
        assert_eq!(m.conflicts.get(), 1);
        assert_eq!(m.misses.get(), 1);
        assert_eq!(m.handlers_registered.get(), 2);
        assert_eq!(m.resolutions.with_label_values(&["exact"]).get(), 1);
        assert_eq!(m.resolutions.with_label_values(&["wildcard"]).get(), 1);
    }

    #[test]
    fn test_concurrent_readers() {
        let reg = Arc::new(cisco_registry());
        reg.set_default("generic").unwrap();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let reg = Arc::clone(&reg);
                thread::spawn(move || {
                    for n in 0..200 {
                        let version = if (i + n) % 2 == 0 { "15.2" } else { "12.0" };
                        let r = reg.resolve(&DeviceType::new("cisco", version)).unwrap();
                        let want = if version == "15.2" { "H1" } else { "H2" };
                        assert_eq!(*r.handler, want);
                        let r = reg.resolve(&DeviceType::new("mikrotik", "7")).unwrap();
                        assert!(r.is_default());
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn test_registration_races_admit_one_winner() {
        let reg: Arc<HandlerRegistry<usize>> = Arc::new(HandlerRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let reg = Arc::clone(&reg);
                thread::spawn(move || reg.register(DeviceType::any_version("eos"), i).is_ok())
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(wins, 1);
        assert_eq!(reg.len(), 1);
    }
}
