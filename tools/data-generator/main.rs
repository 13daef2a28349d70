use chrono::{NaiveDate, TimeDelta};
use clap::Parser;
use nagare::dataset::SCHEMA_FILE;
use rand::Rng;
use rand::rngs::ThreadRng;
use serde_json::{Map, Value, json};
use std::f64::consts::PI;
use std::fs;
use std::io::Write;
use std::path::Path;

/// A CLI tool to generate synthetic time series datasets for nagare flows
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// The directory to write `<name>.ndjson` and `schemas.json` into
    #[arg(short, long, default_value = "mock_data")]
    output_dir: String,

    /// The dataset name (file stem)
    #[arg(short, long, default_value = "timeseries")]
    name: String,

    /// The first date of the series (YYYY-MM-DD)
    #[arg(long, default_value = "2024-01-01")]
    start: String,

    /// The number of daily rows per product
    #[arg(short, long, default_value_t = 90)]
    periods: usize,

    /// Product names; more than one produces a multi-product dataset
    #[arg(long, value_delimiter = ',', default_value = "Product A")]
    products: Vec<String>,

    /// Standard deviation of the noise added to cost
    #[arg(long, default_value_t = 20.0)]
    noise: f64,

    /// Length of the seasonal cycle in days
    #[arg(long, default_value_t = 7)]
    season: usize,
}

/// Shape of one product's series.
struct Profile {
    base: f64,
    trend: f64,
    amplitude: f64,
    revenue_factor: f64,
}

impl Profile {
    /// Later products start higher and grow faster.
    fn for_product(index: usize) -> Self {
        let i = index as f64;
        Self {
            base: 1000.0 + i * 200.0,
            trend: 2.0 + i * 0.5,
            amplitude: 100.0 + i * 20.0,
            revenue_factor: 2.0 + i * 0.1,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut rng = rand::rng();

    if cli.season == 0 {
        eprintln!("Error: --season must be at least 1");
        std::process::exit(1);
    }
    if cli.products.is_empty() {
        eprintln!("Error: at least one product is required");
        std::process::exit(1);
    }
    let start = NaiveDate::parse_from_str(&cli.start, "%Y-%m-%d")?;

    println!(
        "Generating {} day(s) for {} product(s)...",
        cli.periods,
        cli.products.len()
    );

    let mut records = Vec::with_capacity(cli.periods * cli.products.len());
    for (index, product) in cli.products.iter().enumerate() {
        let profile = Profile::for_product(index);
        records.extend(generate_series(&mut rng, &cli, start, product, &profile));
        println!("-> Generated series for '{}'.", product);
    }

    let dir = Path::new(&cli.output_dir);
    fs::create_dir_all(dir)?;

    let data_path = dir.join(format!("{}.ndjson", cli.name));
    let mut file = fs::File::create(&data_path)?;
    for record in &records {
        writeln!(file, "{}", serde_json::to_string(record)?)?;
    }

    write_schema(dir, &cli.name)?;

    println!(
        "Successfully wrote {} record(s) to '{}'",
        records.len(),
        data_path.display()
    );
    Ok(())
}

/// Trend plus a sine season plus gaussian noise; revenue follows cost.
fn generate_series(
    rng: &mut ThreadRng,
    cli: &Cli,
    start: NaiveDate,
    product: &str,
    profile: &Profile,
) -> Vec<Map<String, Value>> {
    (0..cli.periods)
        .map(|t| {
            let x = t as f64;
            let seasonal = profile.amplitude * (2.0 * PI * x / cli.season as f64).sin();
            let cost = profile.base + profile.trend * x + seasonal + gaussian(rng) * cli.noise;
            let revenue = cost * profile.revenue_factor + gaussian(rng) * cli.noise * 0.5;
            let date = start + TimeDelta::days(t as i64);

            let mut record = Map::new();
            record.insert("date".into(), json!(date.format("%Y-%m-%d").to_string()));
            record.insert("cost".into(), json!(round2(cost)));
            record.insert("revenue".into(), json!(round2(revenue)));
            record.insert("product".into(), json!(product));
            record
        })
        .collect()
}

/// Standard normal sample (Box-Muller).
fn gaussian(rng: &mut ThreadRng) -> f64 {
    let u1: f64 = rng.random_range(f64::EPSILON..1.0);
    let u2: f64 = rng.random_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Adds or replaces this dataset's entry in the directory's schema file.
fn write_schema(dir: &Path, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = dir.join(SCHEMA_FILE);
    let mut schemas: Map<String, Value> = match fs::read_to_string(&path) {
        Ok(text) => serde_json::from_str(&text)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
        Err(e) => return Err(e.into()),
    };
    schemas.insert(
        name.to_string(),
        json!({"date": "date", "cost": "number", "revenue": "number", "product": "string"}),
    );
    fs::write(&path, serde_json::to_string_pretty(&schemas)?)?;
    println!("-> Updated '{}'.", path.display());
    Ok(())
}
