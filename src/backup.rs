use anyhow::{anyhow, Context};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::settings::RosterConfig;
use crate::store::ScoreEvent;

const MANIFEST_ENTRY: &str = "manifest.json";
const EVENTS_ENTRY: &str = "data/events.json";
const SETTINGS_ENTRY: &str = "data/settings.json";
pub const BUNDLE_FORMAT_V1: &str = "orderliness-events-v1";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub event_count: usize,
}

#[derive(Debug, Clone)]
pub struct ImportedBundle {
    pub events: Vec<ScoreEvent>,
    pub settings: Option<RosterConfig>,
}

pub fn export_events(
    out_path: &Path,
    events: &[ScoreEvent],
    settings: Option<&RosterConfig>,
) -> anyhow::Result<ExportSummary> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let events_json =
        serde_json::to_string_pretty(events).context("failed to serialize events")?;
    let payload_sha256 = format!("{:x}", Sha256::digest(events_json.as_bytes()));

    let exported_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": exported_at,
        "eventCount": events.len(),
        "payloadSha256": payload_sha256,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(EVENTS_ENTRY, opts)
        .context("failed to start events entry")?;
    zip.write_all(events_json.as_bytes())
        .context("failed to write events entry")?;

    if let Some(config) = settings {
        zip.start_file(SETTINGS_ENTRY, opts)
            .context("failed to start settings entry")?;
        zip.write_all(
            serde_json::to_string_pretty(config)
                .context("failed to serialize settings")?
                .as_bytes(),
        )
        .context("failed to write settings entry")?;
    }

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        event_count: events.len(),
    })
}

pub fn import_events(in_path: &Path) -> anyhow::Result<ImportedBundle> {
    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }

    let mut events_text = String::new();
    archive
        .by_name(EVENTS_ENTRY)
        .context("bundle missing data/events.json")?
        .read_to_string(&mut events_text)
        .context("failed to read data/events.json")?;

    if let Some(expected) = manifest.get("payloadSha256").and_then(|v| v.as_str()) {
        let actual = format!("{:x}", Sha256::digest(events_text.as_bytes()));
        if actual != expected {
            return Err(anyhow!("bundle payload digest mismatch"));
        }
    }

    let events: Vec<ScoreEvent> =
        serde_json::from_str(&events_text).context("data/events.json is invalid")?;

    let settings = match archive.by_name(SETTINGS_ENTRY) {
        Ok(mut entry) => {
            let mut settings_text = String::new();
            entry
                .read_to_string(&mut settings_text)
                .context("failed to read data/settings.json")?;
            Some(
                serde_json::from_str(&settings_text)
                    .context("data/settings.json is invalid")?,
            )
        }
        Err(_) => None,
    };

    Ok(ImportedBundle { events, settings })
}
