use anyhow::Context;
use clap::{Parser, Subcommand};
use regex::Regex;
use std::fs;
use std::path::Path;

use modelstore::model::{EXTRAS_FILENAME, MODEL_FILENAME, X_SPEC_FILENAME, Y_SPEC_FILENAME};
use modelstore::spec::DependencySpec;

#[derive(Parser)]
#[command(name = "modelstore")]
#[command(about = "Inspect saved model directories and dependency specs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a saved model directory (validates the spec and extras
    /// files; the model object itself is never loaded).
    Inspect {
        dir: String,

        /// Only print dependency names matching this regex.
        #[arg(long)]
        filter: Option<String>,
    },

    /// Validate a spec JSON file and print its flattened dependencies.
    Spec { file: String },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Inspect { dir, filter } => inspect(Path::new(&dir), filter.as_deref()),
        Commands::Spec { file } => show_spec(Path::new(&file)),
    }
}

fn inspect(dir: &Path, filter: Option<&str>) -> anyhow::Result<()> {
    let filter = filter
        .map(Regex::new)
        .transpose()
        .context("bad --filter regex")?;

    let x_spec = DependencySpec::load(&dir.join(X_SPEC_FILENAME))
        .with_context(|| format!("load {X_SPEC_FILENAME}"))?;
    let y_spec = DependencySpec::load(&dir.join(Y_SPEC_FILENAME))
        .with_context(|| format!("load {Y_SPEC_FILENAME}"))?;

    print_spec("X", &x_spec, filter.as_ref());
    print_spec("y", &y_spec, filter.as_ref());

    let extras_path = dir.join(EXTRAS_FILENAME);
    let extras: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(&extras_path).with_context(|| format!("read {EXTRAS_FILENAME}"))?,
    )
    .with_context(|| format!("parse {EXTRAS_FILENAME}"))?;

    if let Some(metrics) = extras.get("eval_metrics").and_then(|v| v.as_object()) {
        println!("eval metrics ({}):", metrics.len());
        for (name, value) in metrics {
            println!("  {name}: {value}");
        }
    }
    if let Some(dt) = extras.get("dt") {
        println!("training time: {dt}");
    }
    if let Some(timestamp) = extras.get("save_timestamp").and_then(|v| v.as_str()) {
        println!("saved on: {timestamp}");
    }

    println!("model file present: {}", dir.join(MODEL_FILENAME).exists());
    Ok(())
}

fn print_spec(label: &str, spec: &DependencySpec, filter: Option<&Regex>) {
    let names: Vec<&str> = spec
        .dependencies()
        .into_iter()
        .filter(|name| filter.is_none_or(|re| re.is_match(name)))
        .collect();

    println!("{label} dependencies ({}):", names.len());
    for name in names {
        println!("  {name}");
    }
}

fn show_spec(file: &Path) -> anyhow::Result<()> {
    let spec =
        DependencySpec::load(file).with_context(|| format!("load spec {}", file.display()))?;
    println!("{spec}");
    Ok(())
}
