//! Friaje CLI - minimum-temperature zonal risk analysis for Peru

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use friaje_algorithms::classification::{parse_risk_label, risk_label, Metric, RiskClassifier, RiskRuleSet};
use friaje_algorithms::pipeline::{run_analysis, AnalysisSession};
use friaje_algorithms::policy::{total_investment, PolicyBrief, PROGRAMME_YEARS};
use friaje_algorithms::statistics::ZonalParams;
use friaje_algorithms::table::{AnalysisResult, ResultFilter, ResultTable, DEFAULT_BINS};
use friaje_core::io::{read_geotiff, BoundaryOptions};
use friaje_core::Raster;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "friaje")]
#[command(author, version, about = "Minimum-temperature zonal risk analysis", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Compute zonal statistics and risk levels, and write the result table
    Analyze {
        /// Tmin raster (single-band GeoTIFF)
        #[arg(short, long)]
        raster: PathBuf,
        /// Administrative boundaries (GeoJSON FeatureCollection)
        #[arg(short, long)]
        boundaries: PathBuf,
        /// Output CSV table
        #[arg(long)]
        csv: PathBuf,
        /// Output GeoJSON with geometries
        #[arg(long)]
        geojson: Option<PathBuf>,
        /// Property holding the unit identifier
        #[arg(long)]
        id_field: Option<String>,
        /// Property holding the unit name
        #[arg(long)]
        name_field: Option<String>,
        /// Risk rule set (JSON); defaults to the built-in thresholds
        #[arg(long)]
        rules: Option<PathBuf>,
        /// Fail when the raster has no CRS instead of assuming the boundary CRS
        #[arg(long)]
        strict_crs: bool,
    },
    /// Summary, risk distribution, rankings and policy narrative of a result table
    Report {
        /// Result table (CSV written by `analyze`)
        input: PathBuf,
        /// Units shown in the coldest / warmest rankings
        #[arg(short, long, default_value = "5")]
        top: usize,
    },
    /// Write the subset of a result table matching the given criteria
    Filter {
        /// Result table (CSV written by `analyze`)
        input: PathBuf,
        /// Output CSV
        #[arg(short, long)]
        out: PathBuf,
        /// Risk level to keep (repeatable): "Very High", High, Medium, Low, Unclassifiable
        #[arg(short, long)]
        risk: Vec<String>,
        /// Keep units whose mean Tmin is at or below this (°C)
        #[arg(long, allow_negative_numbers = true)]
        max_mean: Option<f64>,
    },
    /// Coldest (or warmest) units by mean Tmin
    Rank {
        /// Result table (CSV written by `analyze`)
        input: PathBuf,
        /// Number of units
        #[arg(short, long, default_value = "15")]
        n: usize,
        /// Rank the warmest units instead of the coldest
        #[arg(short, long)]
        warmest: bool,
    },
    /// Distribution of a statistic across units
    Histogram {
        /// Result table (CSV written by `analyze`)
        input: PathBuf,
        /// Statistic: min, max, mean, std, p10, p90, range
        #[arg(short, long, default_value = "mean")]
        column: String,
        /// Number of bins
        #[arg(short, long, default_value_t = DEFAULT_BINS)]
        bins: usize,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_raster(path: &Path) -> Result<Raster<f64>> {
    let pb = spinner("Reading raster...");
    let raster: Raster<f64> = read_geotiff(path).context("Failed to read raster")?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn read_table(path: &Path) -> Result<ResultTable> {
    let pb = spinner("Reading result table...");
    let table = ResultTable::read_csv(path)
        .with_context(|| format!("Failed to read result table {}", path.display()))?;
    pb.finish_and_clear();
    Ok(table)
}

fn load_classifier(rules: Option<&Path>) -> Result<RiskClassifier> {
    let rules = match rules {
        Some(path) => RiskRuleSet::from_file(path)
            .with_context(|| format!("Failed to load risk rules from {}", path.display()))?,
        None => RiskRuleSet::default(),
    };
    RiskClassifier::new(rules).context("Invalid risk rules")
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn fmt_value(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v))
}

fn print_distribution(table: &ResultTable) {
    println!("Risk distribution:");
    for (level, n) in table.risk_distribution() {
        println!("  {:<15} {:>5}", risk_label(level), n);
    }
}

fn print_ranking(title: &str, results: &[&AnalysisResult]) {
    println!("{}", title);
    println!(
        "  {:<4} {:<10} {:<28} {:>8} {:>8} {:>8}  {}",
        "#", "unit_id", "name", "mean", "min", "p10", "risk"
    );
    for (i, r) in results.iter().enumerate() {
        println!(
            "  {:<4} {:<10} {:<28} {:>8} {:>8} {:>8}  {}",
            i + 1,
            r.unit_id,
            r.name,
            fmt_value(r.mean()),
            fmt_value(r.metric(Metric::Min)),
            fmt_value(r.metric(Metric::P10)),
            r.risk_label()
        );
    }
}

fn print_policy(table: &ResultTable) {
    let brief = PolicyBrief::build(table);

    println!("Policy recommendations:");
    for (i, target) in brief.targets.iter().enumerate() {
        let p = target.intervention;
        println!("\n  {}. {}", i + 1, p.title);
        println!("     Objective: {}", p.objective);
        println!("     Target: {} ({})", p.population, p.criterion);
        for action in p.actions {
            println!("       - {}", action);
        }
        println!(
            "     Estimated cost: {} = S/ {:.0} million",
            p.unit_cost,
            p.investment as f64 / 1e6
        );
        for kpi in p.kpis {
            println!("     KPI: {}", kpi);
        }
        println!(
            "     Units targeted ({}): {}",
            target.units.len(),
            unit_names(&target.units)
        );
    }

    println!(
        "\n  Total investment: S/ {:.1} billion over {} years",
        total_investment() as f64 / 1e9,
        PROGRAMME_YEARS
    );

    println!("\nImplementation priority:");
    println!("  High (mean < -2 °C): {}", unit_names(&brief.high));
    println!("  Medium (mean 0-2 °C): {}", unit_names(&brief.medium));
    println!(
        "  Monitor (std > {}): {}",
        fmt_value(brief.std_cutoff),
        unit_names(&brief.monitor)
    );
}

fn unit_names(units: &[&AnalysisResult]) -> String {
    if units.is_empty() {
        return "-".to_string();
    }
    units.iter().map(|r| r.name.as_str()).collect::<Vec<_>>().join(", ")
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let raster = read_raster(&input)?;
            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Cell size: {}", raster.cell_size());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            match raster.crs() {
                Some(crs) => println!("CRS: {}", crs),
                None => println!("CRS: undefined"),
            }
            if let Some(nodata) = raster.nodata() {
                println!("NoData: {}", nodata);
            }
            println!("\nStatistics:");
            if let Some(min) = stats.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = stats.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = stats.mean {
                println!("  Mean: {:.4}", mean);
            }
            if !raster.is_empty() {
                println!(
                    "  Valid cells: {} ({:.1}%)",
                    stats.valid_count,
                    100.0 * stats.valid_count as f64 / raster.len() as f64
                );
            }
        }

        // ── Analyze ──────────────────────────────────────────────────
        Commands::Analyze {
            raster,
            boundaries,
            csv,
            geojson,
            id_field,
            name_field,
            rules,
            strict_crs,
        } => {
            let classifier = load_classifier(rules.as_deref())?;
            let params = ZonalParams {
                strict_crs,
                ..Default::default()
            };
            let mut session = AnalysisSession::new(BoundaryOptions {
                id_field,
                name_field,
            });

            let pb = spinner("Reading inputs...");
            let grid = session.load_raster(&raster).context("Failed to read raster")?;
            let units = session
                .load_boundaries(&boundaries)
                .context("Failed to read boundaries")?;
            pb.finish_and_clear();
            info!("Input: {} x {} raster, {} units", grid.cols(), grid.rows(), units.len());

            let start = Instant::now();
            let table = run_analysis(&grid, &units, &params, &classifier)
                .context("Failed to compute zonal statistics")?;
            let elapsed = start.elapsed();

            let pb = spinner("Writing output...");
            table.write_csv(&csv).context("Failed to write CSV")?;
            if let Some(path) = &geojson {
                table.write_geojson(path).context("Failed to write GeoJSON")?;
            }
            pb.finish_and_clear();

            print_distribution(&table);
            done("Result table", &csv, elapsed);
            if let Some(path) = &geojson {
                println!("GeoJSON saved to: {}", path.display());
            }
        }

        // ── Report ───────────────────────────────────────────────────
        Commands::Report { input, top } => {
            let table = read_table(&input)?;
            let s = table.summary();

            println!("Units: {} ({} classifiable)", s.units, s.classifiable);
            if let Some((lo, hi)) = s.mean_range {
                println!("Mean Tmin range: {:.2} to {:.2} °C", lo, hi);
            }
            println!("Average of unit means: {} °C", fmt_value(s.mean_of_means));
            println!("Coldest minimum: {} °C", fmt_value(s.coldest_min));
            println!("Warmest minimum: {} °C", fmt_value(s.warmest_min));
            println!("Units with frost risk: {:.1}%", s.frost_share);
            println!("Units with extreme cold: {:.1}%", s.extreme_cold_share);
            println!();

            print_distribution(&table);
            println!();
            print_ranking(&format!("Top {} coldest:", top), &table.coldest(top));
            println!();
            print_ranking(&format!("Top {} warmest:", top), &table.warmest(top));
            println!();
            print_policy(&table);
        }

        // ── Filter ───────────────────────────────────────────────────
        Commands::Filter {
            input,
            out,
            risk,
            max_mean,
        } => {
            let risk_levels = risk
                .iter()
                .map(|label| parse_risk_label(label).with_context(|| format!("Invalid --risk '{}'", label)))
                .collect::<Result<Vec<_>>>()?;
            let table = read_table(&input)?;

            let start = Instant::now();
            let filtered = table.filter(&ResultFilter {
                risk_levels,
                max_mean,
            });
            let elapsed = start.elapsed();

            filtered.write_csv(&out).context("Failed to write CSV")?;
            println!("{} of {} units selected", filtered.len(), table.len());
            done("Filtered table", &out, elapsed);
        }

        // ── Rank ─────────────────────────────────────────────────────
        Commands::Rank { input, n, warmest } => {
            let table = read_table(&input)?;
            if warmest {
                print_ranking(&format!("Top {} warmest by mean Tmin:", n), &table.warmest(n));
            } else {
                print_ranking(&format!("Top {} coldest by mean Tmin:", n), &table.coldest(n));
            }
        }

        // ── Histogram ────────────────────────────────────────────────
        Commands::Histogram {
            input,
            column,
            bins,
        } => {
            let metric: Metric = column.parse().context("Invalid --column")?;
            let table = read_table(&input)?;
            let Some(hist) = table.histogram(metric, bins) else {
                anyhow::bail!("No units with data to build a histogram of {}", metric);
            };

            let peak = hist.counts.iter().copied().max().unwrap_or(0).max(1);
            println!("Distribution of {} ({} units, {} bins):", metric, hist.total(), bins);
            for (lo, hi, count) in hist.bins() {
                let bar = "#".repeat(count * 40 / peak);
                println!("  [{:>8.2}, {:>8.2}) {:>5} {}", lo, hi, count, bar);
            }
        }
    }

    Ok(())
}
