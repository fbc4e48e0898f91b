//! Lisa CLI - Local spatial association statistics

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use lisa_algorithms::local::{
    local_g, local_moran, GiParams, GiResult, LocalMoranParams, LocalMoranResult, ResampleMode,
    SwmSource, WeightsSource,
};
use lisa_algorithms::neighbors::{DistanceBand, DistanceWeight, Site};
use lisa_core::{SwmHeader, SwmReader, SwmWriter, ValueVector, WeightType};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "lisa")]
#[command(author, version, about = "Local spatial association statistics", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Getis-Ord Gi* hot spot analysis
    Hotspot {
        /// Input records (JSON array of {id, value, x?, y?, case?})
        input: PathBuf,
        /// Output JSON file
        output: PathBuf,
        #[command(flatten)]
        weights: WeightsOpts,
        #[command(flatten)]
        resample: ResampleOpts,
        /// Classify bins with the false discovery rate correction
        #[arg(long)]
        fdr: bool,
    },
    /// Anselin local Moran's I cluster and outlier analysis
    ClusterOutlier {
        /// Input records (JSON array of {id, value, x?, y?, case?})
        input: PathBuf,
        /// Output JSON file
        output: PathBuf,
        #[command(flatten)]
        weights: WeightsOpts,
        #[command(flatten)]
        resample: ResampleOpts,
        /// Classify significance with the false discovery rate correction
        #[arg(long)]
        fdr: bool,
    },
    /// Spatial weights matrix utilities
    Swm {
        #[command(subcommand)]
        action: SwmCommands,
    },
}

#[derive(Subcommand)]
enum SwmCommands {
    /// Show header and connectivity of a weights store
    Info {
        /// Weights store file
        input: PathBuf,
    },
    /// Build a distance-band weights store from located records
    Build {
        /// Input records (JSON array of {id, x, y, ...})
        input: PathBuf,
        /// Output weights store file
        output: PathBuf,
        /// Distance band threshold
        #[arg(short, long)]
        threshold: f64,
        /// Weight by inverse distance instead of uniformly
        #[arg(long)]
        inverse_distance: bool,
        /// Distance-decay exponent for inverse distance
        #[arg(short, long, default_value = "1.0")]
        exponent: f64,
        /// Row-standardize weights at write time
        #[arg(long)]
        row_standard: bool,
    },
}

#[derive(clap::Args)]
struct WeightsOpts {
    /// Weights store file; mutually exclusive with --threshold
    #[arg(long, conflicts_with = "threshold")]
    swm: Option<PathBuf>,
    /// Distance band threshold over the record coordinates
    #[arg(short, long)]
    threshold: Option<f64>,
    /// Weight band neighbors by inverse distance
    #[arg(long, requires = "threshold")]
    inverse_distance: bool,
    /// Distance-decay exponent for inverse distance
    #[arg(short, long, default_value = "1.0")]
    exponent: f64,
    /// Row-standardize band weights
    #[arg(long, requires = "threshold")]
    row_standard: bool,
}

#[derive(clap::Args)]
struct ResampleOpts {
    /// Number of resampling draws for a pseudo p-value
    #[arg(short, long)]
    permutations: Option<usize>,
    /// Resample with replacement instead of permuting
    #[arg(long, requires = "permutations")]
    bootstrap: bool,
    /// Seed for reproducible draws
    #[arg(short, long)]
    seed: Option<u64>,
}

// ─── Input / output records ─────────────────────────────────────────────

#[derive(Deserialize, Clone)]
struct Record {
    id: i32,
    #[serde(default)]
    value: Option<f64>,
    #[serde(default)]
    x: Option<f64>,
    #[serde(default)]
    y: Option<f64>,
    #[serde(default)]
    case: Option<String>,
    #[serde(default)]
    self_weight: Option<f64>,
}

#[derive(Serialize)]
struct HotspotRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    case: Option<String>,
    id: i32,
    z_score: Option<f64>,
    p_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pseudo_p: Option<f64>,
    bin: i8,
}

#[derive(Serialize)]
struct ClusterRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    case: Option<String>,
    id: i32,
    moran_i: Option<f64>,
    expected: Option<f64>,
    variance: Option<f64>,
    z_score: Option<f64>,
    p_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pseudo_p: Option<f64>,
    bin: i8,
    cluster: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Hotspot {
            input,
            output,
            weights,
            resample,
            fdr,
        } => {
            let records = read_records(&input)?;
            let start = Instant::now();
            let mut rows = Vec::with_capacity(records.len());
            for (case, group) in partition(records)? {
                let values = build_values(&group)?;
                let mut source = open_source(&weights, &group)?;
                let params = GiParams {
                    permutations: resample.permutations,
                    resample: resample.mode(),
                    seed: resample.seed,
                    apply_fdr: fdr,
                    self_potential: self_potential(&group),
                    ..GiParams::default()
                };
                let result = local_g(&values, source.as_mut(), &params)
                    .with_context(|| run_context("hot spot", &case))?;
                rows.extend(hotspot_rows(&case, &result));
            }
            let elapsed = start.elapsed();
            write_json(&rows, &output)?;
            done("Hot spot analysis", &output, elapsed);
        }

        Commands::ClusterOutlier {
            input,
            output,
            weights,
            resample,
            fdr,
        } => {
            let records = read_records(&input)?;
            let start = Instant::now();
            let mut rows = Vec::with_capacity(records.len());
            for (case, group) in partition(records)? {
                let values = build_values(&group)?;
                let mut source = open_source(&weights, &group)?;
                let params = LocalMoranParams {
                    permutations: resample.permutations,
                    resample: resample.mode(),
                    seed: resample.seed,
                    apply_fdr: fdr,
                    ..LocalMoranParams::default()
                };
                let result = local_moran(&values, source.as_mut(), &params)
                    .with_context(|| run_context("cluster and outlier", &case))?;
                rows.extend(cluster_rows(&case, &result));
            }
            let elapsed = start.elapsed();
            write_json(&rows, &output)?;
            done("Cluster and outlier analysis", &output, elapsed);
        }

        Commands::Swm { action } => match action {
            SwmCommands::Info { input } => swm_info(&input)?,
            SwmCommands::Build {
                input,
                output,
                threshold,
                inverse_distance,
                exponent,
                row_standard,
            } => {
                let records = read_records(&input)?;
                let start = Instant::now();
                let count =
                    swm_build(&records, &output, threshold, inverse_distance, exponent, row_standard)?;
                let elapsed = start.elapsed();
                info!("Wrote {} entity records", count);
                done("Weights store", &output, elapsed);
            }
        },
    }

    Ok(())
}

// ─── Analysis plumbing ──────────────────────────────────────────────────

impl ResampleOpts {
    fn mode(&self) -> ResampleMode {
        if self.bootstrap {
            ResampleMode::Bootstrap
        } else {
            ResampleMode::Permutation
        }
    }
}

/// Split records into per-case groups, preserving record order within
/// each. Records without a case field form a single unnamed group.
fn partition(records: Vec<Record>) -> Result<Vec<(Option<String>, Vec<Record>)>> {
    if records.iter().all(|r| r.case.is_none()) {
        return Ok(vec![(None, records)]);
    }
    if records.iter().any(|r| r.case.is_none()) {
        bail!("either every record carries a case field or none does");
    }
    let mut groups: BTreeMap<String, Vec<Record>> = BTreeMap::new();
    for record in records {
        let case = record.case.clone().unwrap_or_default();
        groups.entry(case).or_default().push(record);
    }
    Ok(groups.into_iter().map(|(k, v)| (Some(k), v)).collect())
}

fn build_values(records: &[Record]) -> Result<ValueVector> {
    let pairs: Vec<(i32, f64)> = records
        .iter()
        .map(|r| {
            r.value
                .map(|v| (r.id, v))
                .with_context(|| format!("record {} has no value field", r.id))
        })
        .collect::<Result<_>>()?;
    Ok(ValueVector::from_pairs(pairs)?)
}

fn self_potential(records: &[Record]) -> Option<Vec<f64>> {
    if records.iter().all(|r| r.self_weight.is_none()) {
        return None;
    }
    Some(records.iter().map(|r| r.self_weight.unwrap_or(1.0)).collect())
}

fn open_source(opts: &WeightsOpts, records: &[Record]) -> Result<Box<dyn WeightsSource>> {
    if let Some(path) = &opts.swm {
        let source = SwmSource::open(path)
            .with_context(|| format!("Failed to open weights store {}", path.display()))?;
        return Ok(Box::new(source));
    }
    let Some(threshold) = opts.threshold else {
        bail!("either --swm or --threshold is required");
    };
    let sites = build_sites(records)?;
    let weighting = if opts.inverse_distance {
        DistanceWeight::InverseDistance {
            exponent: opts.exponent,
        }
    } else {
        DistanceWeight::Binary
    };
    let band = DistanceBand::new(sites, threshold, weighting, opts.row_standard)?;
    Ok(Box::new(band))
}

fn build_sites(records: &[Record]) -> Result<Vec<Site>> {
    records
        .iter()
        .map(|r| match (r.x, r.y) {
            (Some(x), Some(y)) => Ok(Site::new(r.id, x, y)),
            _ => bail!("record {} has no coordinates", r.id),
        })
        .collect()
}

fn run_context(name: &str, case: &Option<String>) -> String {
    match case {
        Some(case) => format!("Failed {} run for case {:?}", name, case),
        None => format!("Failed {} run", name),
    }
}

fn hotspot_rows(case: &Option<String>, result: &GiResult) -> Vec<HotspotRow> {
    result
        .ids
        .iter()
        .enumerate()
        .map(|(i, id)| HotspotRow {
            case: case.clone(),
            id: *id,
            z_score: finite(result.z_scores[i]),
            p_value: finite(result.p_values[i]),
            pseudo_p: result.pseudo_p.as_ref().and_then(|p| finite(p[i])),
            bin: result.bins[i],
        })
        .collect()
}

fn cluster_rows(case: &Option<String>, result: &LocalMoranResult) -> Vec<ClusterRow> {
    result
        .ids
        .iter()
        .enumerate()
        .map(|(i, id)| ClusterRow {
            case: case.clone(),
            id: *id,
            moran_i: finite(result.moran_i[i]),
            expected: finite(result.expected[i]),
            variance: finite(result.variances[i]),
            z_score: finite(result.z_scores[i]),
            p_value: finite(result.p_values[i]),
            pseudo_p: result.pseudo_p.as_ref().and_then(|p| finite(p[i])),
            bin: result.bins[i],
            cluster: result.labels[i].code().to_string(),
        })
        .collect()
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

// ─── SWM commands ───────────────────────────────────────────────────────

fn swm_info(path: &Path) -> Result<()> {
    let mut reader = SwmReader::open(path)
        .with_context(|| format!("Failed to open weights store {}", path.display()))?;
    let header = reader.header().clone();

    println!("File: {}", path.display());
    println!("Version: {}", header.version);
    println!("Unique id field: {}", header.unique_id_field);
    println!("Weight type tag: {}", header.weight_type.tag());
    println!("Distance method: {}", header.distance_method);
    if let Some(threshold) = header.threshold {
        println!("Threshold: {}", threshold);
    }
    if let Some(exponent) = header.exponent {
        println!("Exponent: {}", exponent);
    }
    if let Some(k) = header.num_neighs {
        println!("Neighbors: {}", k);
    }
    println!("Row standardized: {}", header.row_standard);
    println!("Fixed weights: {}", header.fixed_weights);
    println!("Entities: {}", header.entity_count);

    let mut total = 0usize;
    let mut min = usize::MAX;
    let mut max = 0usize;
    let mut isolated = 0usize;
    for entry in reader.entries() {
        let entry = entry?;
        let nn = entry.neighbor_ids.len();
        total += nn;
        min = min.min(nn);
        max = max.max(nn);
        if nn == 0 {
            isolated += 1;
        }
    }

    let n = header.entity_count as f64;
    println!("\nConnectivity:");
    println!("  Non-zero links: {}", total);
    println!("  Percent non-zero: {:.4}%", total as f64 / (n * n) * 100.0);
    println!("  Neighbors (min/avg/max): {} / {:.2} / {}", min, total as f64 / n, max);
    if isolated > 0 {
        println!("  Entities with no neighbors: {}", isolated);
    }
    Ok(())
}

fn swm_build(
    records: &[Record],
    output: &Path,
    threshold: f64,
    inverse_distance: bool,
    exponent: f64,
    row_standard: bool,
) -> Result<usize> {
    let sites = build_sites(records)?;
    let weighting = if inverse_distance {
        DistanceWeight::InverseDistance { exponent }
    } else {
        DistanceWeight::Binary
    };
    // The store keeps raw bands; standardization happens at write time.
    let mut band = DistanceBand::new(sites, threshold, weighting, false)?;

    let weight_type = if inverse_distance {
        WeightType::InverseDistance
    } else {
        WeightType::FixedDistance
    };
    let mut header = SwmHeader::new("ID", weight_type, band.entity_count(), row_standard);
    header.threshold = Some(threshold);
    if inverse_distance {
        header.exponent = Some(exponent);
        header.fixed_weights = false;
    }
    let mut writer = SwmWriter::create(output, header)?;

    let pb = spinner("Building weights store...");
    while let Some(row) = band.next_row()? {
        writer.write_entry(row.id, &row.neighbor_ids, &row.weights)?;
    }
    let characteristics = writer.finish()?;
    pb.finish_and_clear();

    if !characteristics.no_neighbor_ids.is_empty() {
        info!(
            "{} entities have no neighbors at threshold {}",
            characteristics.no_neighbor_ids.len(),
            threshold
        );
    }
    Ok(characteristics.entity_count)
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn read_records(path: &Path) -> Result<Vec<Record>> {
    let pb = spinner("Reading records...");
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let records: Vec<Record> = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} records", records.len());
    Ok(records)
}

fn write_json<T: Serialize>(rows: &[T], path: &Path) -> Result<()> {
    let pb = spinner("Writing output...");
    let text = serde_json::to_string_pretty(rows)?;
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    pb.finish_and_clear();
    Ok(())
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}
