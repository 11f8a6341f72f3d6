use crate::registry::MatchKind;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct RegistryMetrics {
    pub registrations: IntCounter,
    pub conflicts: IntCounter,
    pub resolutions: IntCounterVec,
    pub misses: IntCounter,
    pub handlers_registered: IntGauge,
}

impl RegistryMetrics {
    pub(crate) fn record_resolution(&self, kind: MatchKind) {
        self.resolutions.with_label_values(&[kind.as_str()]).inc();
    }
}

#[derive(Clone)]
pub struct MetricsHub {
    pub registry: Registry,
    pub resolution: RegistryMetrics,
}

impl MetricsHub {
    pub fn new() -> Result<Self, String> {
        let registry = Registry::new();
        let registrations = IntCounter::new(
            "devtype_registrations_total",
            "Handlers registered by device type pattern",
        )
        .map_err(|e| format!("metrics init error: {e}"))?;
        let conflicts = IntCounter::new(
            "devtype_registration_conflicts_total",
            "Registrations rejected because the pattern was taken",
        )
        .map_err(|e| format!("metrics init error: {e}"))?;
        let resolutions = IntCounterVec::new(
            Opts::new(
                "devtype_resolutions_total",
                "Device types resolved to a handler, by match kind",
            ),
            &["match"],
        )
        .map_err(|e| format!("metrics init error: {e}"))?;
        let misses = IntCounter::new(
            "devtype_resolution_misses_total",
            "Device types with no matching handler and no default",
        )
        .map_err(|e| format!("metrics init error: {e}"))?;
        let handlers_registered = IntGauge::new(
            "devtype_handlers_registered",
            "Number of handler patterns currently registered",
        )
        .map_err(|e| format!("metrics init error: {e}"))?;
        let resolution = RegistryMetrics {
            registrations,
            conflicts,
            resolutions,
            misses,
            handlers_registered,
        };
        let _ = registry.register(Box::new(resolution.registrations.clone()));
        let _ = registry.register(Box::new(resolution.conflicts.clone()));
        let _ = registry.register(Box::new(resolution.resolutions.clone()));
        let _ = registry.register(Box::new(resolution.misses.clone()));
        let _ = registry.register(Box::new(resolution.handlers_registered.clone()));
        Ok(Self {
            registry,
            resolution,
        })
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}
