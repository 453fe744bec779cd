//! Archive inspection

use anyhow::{Context, Result};
use colored::Colorize;
use operator_lib::packaging::{list_members, read_manifest, Manifest};
use serde::Serialize;
use std::path::Path;

use crate::output::{color_bool, format_time, print_json, OutputFormat};

/// Manifest and member list of one archive
#[derive(Debug, Serialize)]
pub struct ArchiveReport {
    pub manifest: Manifest,
    pub members: Vec<String>,
}

pub fn load(path: &Path) -> Result<ArchiveReport> {
    let manifest = read_manifest(path)
        .with_context(|| format!("Failed to read manifest from {}", path.display()))?;
    let members = list_members(path)
        .with_context(|| format!("Failed to list {}", path.display()))?;
    Ok(ArchiveReport { manifest, members })
}

/// Show an archive's manifest
pub fn inspect(path: &Path, format: OutputFormat) -> Result<()> {
    let report = load(path)?;

    match format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Table => {
            let manifest = &report.manifest;
            println!("{}", "Archive Manifest".bold());
            println!("{}", "=".repeat(60));
            println!("UUID:        {}", manifest.uuid.cyan());
            println!("Cluster:     {}", manifest.cluster_id);
            println!("Version:     {}", manifest.version);
            println!("Created:     {}", format_time(Some(manifest.date)));
            println!("Start:       {}", format_time(manifest.start));
            println!("End:         {}", format_time(manifest.end));
            println!("Certified:   {}", color_bool(manifest.certified));
            println!();

            println!("{}", "Files".bold());
            println!("{}", "-".repeat(60));
            for name in &manifest.files {
                println!("  {}", name);
            }
            for name in &manifest.resource_optimization_files {
                println!("  {} {}", name, "(resource optimization)".dimmed());
            }
            println!();

            let missing: Vec<&String> = manifest
                .files
                .iter()
                .chain(&manifest.resource_optimization_files)
                .filter(|name| !report.members.contains(*name))
                .collect();
            println!(
                "Members:     {} ({} listed files not in this archive)",
                report.members.len(),
                missing.len()
            );
        }
    }
    Ok(())
}
