//! ---
//! psd_section: "06-cli"
//! psd_subsection: "binary"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Handlers behind each psdctl subcommand."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use psd_common::AccessConfig;
use psd_data_access::{Artifact, DataAccess, MatFile, RemoveOutcome, Table};
use psd_scenario::{Analyze, Listing, ScenarioCloner, SCENARIO_LIST};
use psd_storage::{FileSystem, LocalFs};
use tracing::info;

const PREVIEW_ROWS: usize = 5;

pub fn read(access: &dyn DataAccess, path: &str) -> Result<()> {
    match access.read(path)? {
        Artifact::Table(table) => print_table(&table),
        Artifact::Matlab(mat) => print_mat(&mat),
        Artifact::LocalPath(local) => {
            println!("{}", local.display());
            let bytes = fs::read(&local)
                .with_context(|| format!("unable to read {}", local.display()))?;
            print_mat(&MatFile::from_bytes(&bytes)?);
        }
    }
    Ok(())
}

pub fn checksum(access: &dyn DataAccess, path: &str) -> Result<()> {
    println!("{}", access.checksum(path)?);
    Ok(())
}

pub fn push(access: &dyn DataAccess, file_name: &str, rename: &str, checksum: &str) -> Result<()> {
    access.push(file_name, checksum, rename)?;
    println!("pushed {file_name} to {rename}");
    Ok(())
}

pub fn remove(access: &dyn DataAccess, pattern: &str) -> Result<()> {
    match access.remove(pattern, true)? {
        RemoveOutcome::Cancelled => println!("Operation cancelled."),
        RemoveOutcome::Removed(files) => {
            for file in files {
                println!("removed {file}");
            }
        }
    }
    Ok(())
}

pub fn versions(access: &dyn DataAccess, grid_model: &str, kind: &str) -> Result<()> {
    let versions = access.get_profile_version(grid_model, kind)?;
    if versions.is_empty() {
        println!("No {kind} profiles available for {grid_model}.");
    }
    for version in versions {
        println!("{version}");
    }
    Ok(())
}

pub fn clone(config: &AccessConfig, target: &Path, ids: &[String]) -> Result<()> {
    let source = LocalFs::open(config.directories.local_root()?)?;
    let target = LocalFs::open(target)
        .with_context(|| format!("unable to open {}", target.display()))?;
    let ids: Vec<&str> = ids.iter().map(String::as_str).collect();

    let copied = ScenarioCloner::new(&source, &target, &config.directories).clone_all(&ids)?;
    for path in &copied {
        println!("{path}");
    }
    info!(files = copied.len(), "clone complete");
    Ok(())
}

pub fn info(access: &dyn DataAccess, config: &AccessConfig, id: &str, json: bool) -> Result<()> {
    let store = access.store();
    if !store.local().exists(SCENARIO_LIST)? {
        access.copy_from(SCENARIO_LIST, None)?;
    }
    let listing = Listing::from_csv(&store.local().read_bytes(SCENARIO_LIST)?)?;
    let analyze = Analyze::new(
        listing.scenario(id)?,
        access,
        config.directories.output_path(),
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&analyze.scenario_summary()?)?);
        return Ok(());
    }
    println!("--------------------");
    println!("SCENARIO INFORMATION");
    println!("--------------------");
    for line in analyze.info_lines() {
        println!("{line}");
    }
    println!("--------------------");
    for line in analyze.describe_infeasibilities()? {
        println!("{line}");
    }
    Ok(())
}

fn print_table(table: &Table) {
    println!(
        "{} rows x {} columns (index: {})",
        table.n_rows(),
        table.n_cols(),
        table.index_name().unwrap_or("-")
    );
    let header: Vec<String> = table.columns().iter().map(ToString::to_string).collect();
    println!("\t{}", header.join("\t"));
    for (row, label) in table.index().iter().enumerate().take(PREVIEW_ROWS) {
        let values: Vec<String> = table.row(row).iter().map(f64::to_string).collect();
        println!("{label}\t{}", values.join("\t"));
    }
    if table.n_rows() > PREVIEW_ROWS {
        println!("...");
    }
}

fn print_mat(mat: &MatFile) {
    for name in mat.names() {
        if let Some(matrix) = mat.get(name) {
            println!("{name}: {}x{}", matrix.rows(), matrix.cols());
        }
    }
}
