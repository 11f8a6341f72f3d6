use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};

use device_type as devtype;
use devtype::{DeviceConfig, DeviceType, HandlerRegistry, HandlerSpec, MetricsHub};

#[derive(Parser, Debug)]
#[command(
    name = "devtype",
    version,
    about = "Inspect device types and resolve them to CLI handlers",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the device type derived from each device config
    Show {
        /// YAML device config file
        #[arg(long)]
        file: Option<String>,
        /// Directory containing YAML device configs
        #[arg(long)]
        dir: Option<String>,
        /// Print JSON instead of text
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
    /// Resolve each device config against a handler manifest
    Resolve {
        /// YAML handler manifest
        #[arg(long)]
        manifest: String,
        /// YAML device config file
        #[arg(long)]
        file: Option<String>,
        /// Directory containing YAML device configs
        #[arg(long)]
        dir: Option<String>,
        /// Print JSON instead of text
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
        /// Dump Prometheus metrics after resolving
        #[arg(long, action = ArgAction::SetTrue)]
        metrics: bool,
    },
    /// List handler patterns from a manifest in lookup order
    Handlers {
        /// YAML handler manifest
        #[arg(long)]
        manifest: String,
    },
}

fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Show { file, dir, json } => show(file.as_deref(), dir.as_deref(), json),
        Commands::Resolve {
            manifest,
            file,
            dir,
            json,
            metrics,
        } => resolve(&manifest, file.as_deref(), dir.as_deref(), json, metrics),
        Commands::Handlers { manifest } => handlers(&manifest),
    }
}

fn setup_tracing() {
    // Best-effort; avoid panics if already set
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_configs(file: Option<&str>, dir: Option<&str>) -> Result<Vec<DeviceConfig>> {
    match (file, dir) {
        (Some(f), None) => Ok(vec![devtype::load_device_config_file(f)?]),
        (None, Some(d)) => {
            let inv = devtype::load_device_configs_dir(d)?;
            info!(count = inv.len(), dir = d, "loaded device configs");
            Ok(inv.devices.into_values().collect())
        }
        _ => Err(anyhow::anyhow!("provide --file <path> or --dir <dir>")),
    }
}

#[derive(Debug, Serialize)]
struct Row {
    id: String,
    device_type: Option<DeviceType>,
    handler: Option<String>,
    #[serde(rename = "match")]
    kind: Option<&'static str>,
    error: Option<String>,
}

impl Row {
    fn text(&self) -> String {
        let mut line = self.id.clone();
        if let Some(t) = &self.device_type {
            line.push_str(&format!("\t{t}"));
        }
        if let (Some(h), Some(k)) = (&self.handler, self.kind) {
            line.push_str(&format!("\t{h}\t{k}"));
        }
        if let Some(e) = &self.error {
            line.push_str(&format!("\terror: {e}"));
        }
        line
    }
}

fn describe(config: &DeviceConfig, registry: Option<&HandlerRegistry<HandlerSpec>>) -> Row {
    let mut row = Row {
        id: config.id.clone(),
        device_type: None,
        handler: None,
        kind: None,
        error: None,
    };
    let device_type = match DeviceType::from_config(config) {
        Ok(t) => t,
        Err(e) => {
            row.error = Some(e.to_string());
            return row;
        }
    };
    if let Some(reg) = registry {
        match reg.resolve(&device_type) {
            Ok(r) => {
                row.handler = Some(r.handler.name.clone());
                row.kind = Some(r.kind.as_str());
            }
            Err(e) => row.error = Some(e.to_string()),
        }
    }
    row.device_type = Some(device_type);
    row
}

fn report(rows: &[Row], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(rows)?);
    } else {
        for row in rows {
            println!("{}", row.text());
        }
    }
    let failed = rows.iter().filter(|r| r.error.is_some()).count();
    if failed > 0 {
        error!(failed, "devices could not be resolved");
        return Err(anyhow::anyhow!("{failed} of {} devices failed", rows.len()));
    }
    Ok(())
}

fn show(file: Option<&str>, dir: Option<&str>, json: bool) -> Result<()> {
    let configs = load_configs(file, dir)?;
    let rows: Vec<Row> = configs.iter().map(|c| describe(c, None)).collect();
    report(&rows, json)
}

fn build_registry(manifest: &str, hub: Option<&MetricsHub>) -> Result<HandlerRegistry<HandlerSpec>> {
    let spec = devtype::load_handler_manifest(manifest)?;
    let mut reg = HandlerRegistry::new();
    if let Some(hub) = hub {
        reg = reg.with_metrics(hub.resolution.clone());
    }
    spec.register_into(&reg)
        .with_context(|| format!("registering handlers from {manifest}"))?;
    Ok(reg)
}

fn resolve(
    manifest: &str,
    file: Option<&str>,
    dir: Option<&str>,
    json: bool,
    metrics: bool,
) -> Result<()> {
    let hub = if metrics {
        Some(MetricsHub::new().map_err(anyhow::Error::msg)?)
    } else {
        None
    };
    let reg = build_registry(manifest, hub.as_ref())?;
    let configs = load_configs(file, dir)?;
    let rows: Vec<Row> = configs.iter().map(|c| describe(c, Some(&reg))).collect();
    let outcome = report(&rows, json);
    if let Some(hub) = hub {
        eprint!("{}", hub.encode_text());
    }
    outcome
}

fn handlers(manifest: &str) -> Result<()> {
    let reg = build_registry(manifest, None)?;
    for (pattern, spec) in reg.entries() {
        match &spec.description {
            Some(d) => println!("{pattern}\t{}\t{d}", spec.name),
            None => println!("{pattern}\t{}", spec.name),
        }
    }
    if let Some(spec) = reg.default_handler() {
        println!("(default)\t{}", spec.name);
    }
    Ok(())
}
