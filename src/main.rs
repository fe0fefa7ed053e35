use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use ferrite_ckpt::{ArchitectureDescriptor, Checkpoint, CodecConfig, Network};

#[derive(Parser)]
#[command(name = "ferrite-ckpt")]
#[command(version, about = "Save, inspect and restore feed-forward classifier checkpoints", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the architecture and parameter shapes stored in a checkpoint
    Inspect {
        /// Checkpoint file
        path: PathBuf,
    },

    /// Build a classifier, save it, load it back and compare
    Demo {
        /// Input width
        #[arg(long, default_value_t = 784)]
        input_size: usize,

        /// Number of classes
        #[arg(long, default_value_t = 10)]
        output_size: usize,

        /// Hidden layer widths
        #[arg(long, value_delimiter = ',', default_values_t = [512, 256, 128])]
        hidden: Vec<usize>,

        /// Hidden widths of a second network to load the checkpoint into
        #[arg(long, value_delimiter = ',', default_values_t = [400, 200, 100])]
        mismatch: Vec<usize>,

        /// Where to write the checkpoint
        #[arg(long, default_value = "checkpoint.json")]
        out: PathBuf,

        /// Write compact JSON instead of pretty-printed
        #[arg(long)]
        compact: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Inspect { path } => inspect(&path),
        Commands::Demo {
            input_size,
            output_size,
            hidden,
            mismatch,
            out,
            compact,
        } => demo(input_size, output_size, hidden, mismatch, &out, compact),
    }
}

fn inspect(path: &Path) -> Result<()> {
    let checkpoint = Checkpoint::load(path)
        .with_context(|| format!("failed to load checkpoint {}", path.display()))?;
    let arch = checkpoint.architecture();

    println!("input_size:   {}", arch.input_size());
    println!("output_size:  {}", arch.output_size());
    println!("hidden_sizes: {:?}", arch.hidden_sizes());
    println!("drop_p:       {}", arch.drop_p());
    println!("parameters:   {}", checkpoint.parameters().value_count());
    for (key, tensor) in checkpoint.parameters().iter() {
        println!("  {key:<20} {:?}", tensor.shape());
    }
    Ok(())
}

fn demo(
    input_size: usize,
    output_size: usize,
    hidden: Vec<usize>,
    mismatch: Vec<usize>,
    out: &Path,
    compact: bool,
) -> Result<()> {
    let arch = ArchitectureDescriptor::new(input_size, output_size, hidden)?;
    let network = Network::new(arch);
    info!(
        "built network with {} parameters",
        network.architecture().parameter_count()
    );

    let config = if compact {
        CodecConfig::compact()
    } else {
        CodecConfig::default()
    };
    Checkpoint::capture(&network).save_with(out, &config)?;

    let restored = Checkpoint::load(out)?.restore();
    anyhow::ensure!(
        restored.describe() == network.describe(),
        "restored architecture differs"
    );
    anyhow::ensure!(
        restored.parameters() == network.parameters(),
        "restored parameters differ"
    );
    let sample = vec![0.5; input_size];
    println!(
        "restored network matches; predicts class {} for a constant input",
        restored.predict(&sample)
    );

    let mut other = Network::new(ArchitectureDescriptor::new(
        input_size,
        output_size,
        mismatch,
    )?);
    match other.set_parameters(restored.parameters()) {
        Ok(()) => println!("second architecture accepted the parameters"),
        Err(err) => println!(
            "loading into hidden sizes {:?} fails:\n{err}",
            other.architecture().hidden_sizes()
        ),
    }
    Ok(())
}
