use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use beachgen::{
    scenario::{read_beach_info, BeachInfo},
    store::{DatasetStore, FileStore},
    web::{self, WebServerConfig},
    BeachDatasetBuilder, ConfigLoader, GenerationConfig,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Synthetic beach sediment dataset generator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a dataset for one beach
    Generate(GenerateArgs),
    /// Serve stored datasets over HTTP
    Serve(ServeArgs),
}

#[derive(Debug, Args)]
struct GenerateArgs {
    /// Path to a YAML generation config (defaults apply when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON file describing the beach; prompts on stdin when omitted
    #[arg(long)]
    beach: Option<PathBuf>,

    /// Override the random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override the number of simulated days
    #[arg(long)]
    runs: Option<u32>,

    /// Output file (defaults to `<id>_data.json`)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Also persist the dataset into this store directory
    #[arg(long)]
    store: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ServeArgs {
    /// Store directory to serve
    #[arg(long, default_value = "store")]
    store: PathBuf,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 5000)]
    port: u16,

    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(true)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Generate(args) => generate(args),
        Command::Serve(args) => {
            init_tracing(&args.log_level);
            let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
            runtime.block_on(web::run(WebServerConfig {
                store_dir: args.store,
                host: args.host,
                port: args.port,
            }))
        }
    }
}

fn generate(args: GenerateArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ConfigLoader::new(".").load(path)?,
        None => GenerationConfig::default(),
    };
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if let Some(runs) = args.runs {
        config.num_runs = runs;
    }
    config.validate().context("Invalid generation settings")?;
    init_tracing(&config.logging.level);

    let beach = match &args.beach {
        Some(path) => BeachInfo::load_from_path(path)?,
        None => read_beach_info(io::stdin().lock(), io::stdout())?,
    };

    println!("\nStarting data generation for '{}' ({}):", beach.name, beach.id);
    print!("{}", serde_yaml::to_string(&config)?);

    let mut builder = BeachDatasetBuilder::new(config);
    let dataset = builder.build_with_hook(&beach, |run| {
        println!(
            "Run {}: {} locations, {} grains",
            run.operation_id,
            run.locations.len(),
            run.grain_count()
        );
    })?;

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(beach.output_file_name()));
    let file = File::create(&output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &dataset)?;
    writer.flush()?;
    info!(path = %output.display(), "dataset written");
    println!("\nSuccessfully generated data and saved it to '{}'", output.display());

    if let Some(dir) = &args.store {
        let store = FileStore::open(dir)
            .with_context(|| format!("Failed to open store at {}", dir.display()))?;
        store.save(&beach, &dataset)?;
        println!("Stored dataset '{}' in {}", dataset.id, dir.display());
    }

    println!("\n--- Summary ---\n{}\n--- End of Summary ---", dataset.summary());
    Ok(())
}
