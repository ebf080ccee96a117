//! Subcommands of `placement-sim`.
//!
//! Cluster maps and tables travel as JSON files, in the same serde encoding
//! the coordinator would publish them with.

use anyhow::{bail, Context};
use clap::{Subcommand, ValueEnum};
use corelib::{ClusterMap, NodeId, PlacementConfig, PlacementTable};
use placement::{
    IncrementalPlacement, InitialPlacement, PlacementAlgorithm, PlacementContext, PlacementStats,
    RoundRobinPlacement,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

pub type CommandResult = anyhow::Result<()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Algorithm {
    Initial,
    RoundRobin,
}

impl Algorithm {
    fn build(self) -> Box<dyn PlacementAlgorithm> {
        match self {
            Algorithm::Initial => Box::new(InitialPlacement::new()),
            Algorithm::RoundRobin => Box::new(RoundRobinPlacement::new()),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build a table from scratch for a cluster map.
    Init {
        /// Cluster map JSON.
        #[arg(short, long)]
        map: PathBuf,
        /// Where to write the table.
        #[arg(short, long)]
        out: PathBuf,
        #[arg(short, long, value_enum, default_value_t = Algorithm::Initial)]
        algorithm: Algorithm,
    },
    /// Move an existing table to a new cluster map.
    Update {
        #[arg(short, long)]
        table: PathBuf,
        /// Map the table was computed for.
        #[arg(long)]
        old_map: PathBuf,
        #[arg(long)]
        new_map: PathBuf,
        /// Where to write the new table; defaults to overwriting `--table`.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Print per-node cell counts of a table.
    Show {
        #[arg(short, long)]
        table: PathBuf,
    },
}

impl Command {
    pub fn execute(&self, config: &PlacementConfig) -> CommandResult {
        match self {
            Command::Init {
                map,
                out,
                algorithm,
            } => {
                let map: ClusterMap = read_json(map)?;
                let mut table = PlacementTable::for_config(config);
                let algorithm = algorithm.build();
                let stats = algorithm
                    .compute(&PlacementContext::bootstrap(config, &map), &mut table)
                    .with_context(|| format!("{} placement failed", algorithm.name()))?;
                write_json(out, &table)?;
                print_json(&stats)
            }
            Command::Update {
                table: table_path,
                old_map,
                new_map,
                out,
            } => {
                let mut table: PlacementTable = read_json(table_path)?;
                let old_map: ClusterMap = read_json(old_map)?;
                let new_map: ClusterMap = read_json(new_map)?;
                let stats = IncrementalPlacement::new()
                    .compute(&PlacementContext::update(config, &old_map, &new_map), &mut table)
                    .context("incremental placement failed")?;
                write_json(out.as_ref().unwrap_or(table_path), &table)?;
                print_json(&stats)
            }
            Command::Show { table } => {
                let table: PlacementTable = read_json(table)?;
                print!("{}", render_counts(&table));
                if let Some(fault) = table.find_fault() {
                    bail!("table is not valid: {fault}");
                }
                Ok(())
            }
        }
    }
}

/// Per-node primary and total cell counts, one line per node.
pub fn render_counts(table: &PlacementTable) -> String {
    let mut counts: BTreeMap<NodeId, (usize, usize)> = BTreeMap::new();
    for (_, column) in table.columns() {
        for (row, node) in column.iter().enumerate() {
            let entry = counts.entry(*node).or_default();
            if row == 0 {
                entry.0 += 1;
            }
            entry.1 += 1;
        }
    }

    let mut out = format!(
        "version {} tokens {} depth {}\n{:>18} {:>9} {:>7}\n",
        table.version(),
        table.num_tokens(),
        table.depth(),
        "node",
        "primaries",
        "cells"
    );
    for (node, (primaries, cells)) in counts {
        out.push_str(&format!("{:>18} {:>9} {:>7}\n", node.to_string(), primaries, cells));
    }
    out
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> CommandResult {
    let raw = serde_json::to_string_pretty(value)?;
    std::fs::write(path, raw).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), "wrote table");
    Ok(())
}

fn print_json(stats: &PlacementStats) -> CommandResult {
    println!("{}", serde_json::to_string_pretty(stats)?);
    Ok(())
}
