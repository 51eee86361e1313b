use clap::{Parser, Subcommand};
use std::path::PathBuf;

use anyhow::Context;
use notebridge::{
    ensemble_to_midi, load_midi, load_score, midi_to_score, save_midi,
    save_score, DEFAULT_QUANTIZE_RESOLUTION,
};

/// Convert between JSON music notation and Standard MIDI Files.
#[derive(Parser)]
#[command(name = "notebridge")]
#[command(about = "Convert between JSON music notation and MIDI files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert one or more JSON documents to a single MIDI file
    ToMidi {
        /// Input JSON file(s), one per instrument part
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output MIDI file
        #[arg(short, long)]
        output: PathBuf,

        /// Override tempo (BPM) for all parts
        #[arg(long)]
        tempo: Option<f64>,
    },
    /// Convert a MIDI file to a JSON document
    ToJson {
        /// Input MIDI file
        input: PathBuf,

        /// Output JSON file; prints to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Tempo (BPM) the MIDI timings are interpreted against
        #[arg(long, default_value_t = 120.0)]
        tempo: f64,

        /// Quantization grid in beats
        #[arg(long, default_value_t = DEFAULT_QUANTIZE_RESOLUTION)]
        resolution: f64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level),
    )
    .init();

    match cli.command {
        Commands::ToMidi { inputs, output, tempo } => {
            let mut docs = Vec::with_capacity(inputs.len());
            for input in &inputs {
                let doc = load_score(input)
                    .with_context(|| format!("reading '{}'", input.display()))?;
                if cli.verbose {
                    println!(
                        "Loaded {}: {} ({} measures)",
                        input.display(),
                        doc.instrument,
                        doc.measures.len()
                    );
                }
                docs.push(doc);
            }

            let midi = ensemble_to_midi(&docs, tempo)?;
            if cli.verbose {
                println!(
                    "Created MIDI with {} instrument track(s), {} notes",
                    midi.instruments.len(),
                    midi.note_count()
                );
            }

            save_midi(&output, &midi)
                .with_context(|| format!("writing '{}'", output.display()))?;
            println!("Saved MIDI to '{}'", output.display());
        }

        Commands::ToJson { input, output, tempo, resolution } => {
            let midi = load_midi(&input)
                .with_context(|| format!("reading '{}'", input.display()))?;
            let doc = midi_to_score(&midi, tempo, resolution)?;

            match output {
                Some(path) => {
                    save_score(&path, &doc)
                        .with_context(|| format!("writing '{}'", path.display()))?;
                    println!("Saved JSON to '{}'", path.display());
                }
                None => {
                    println!("{}", serde_json::to_string_pretty(&doc)?);
                }
            }
        }
    }

    Ok(())
}
