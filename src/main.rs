//! `mj_batch`: run MarkovJunior models in batch and write PNG / `.vox` artifacts.
//!
//! ```text
//! mj_batch [MODELS_OR_MODEL.xml] [PALETTE.xml] [SIZE] [DIMENSION] [STEPS] [flags]
//! ```
//!
//! A document rooted at `<models>` runs every listed model. Any other
//! document is a single model definition, run with SIZE / DIMENSION / STEPS.

use anyhow::{bail, Context, Result};
use mj_core::batch::{
    document_root, load_models, load_palette, BatchOptions, ModelConfig, ModelEntry,
    RunScheduler, SingleRun, MODELS_ROOT,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: mj_batch [MODELS_OR_MODEL.xml] [PALETTE.xml] [SIZE] [DIMENSION] [STEPS] \
[--output DIR] [--workers N] [--emit-both] [--seed N] [--amount N] [--master-seed N] \
[--rng std|dotnet] [--missing-color abort|placeholder] [--no-report]";

/// Parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Cli {
    models: PathBuf,
    palette: PathBuf,
    /// Parameters used when `models` is a single model document
    single: SingleRun,
    emit_both: bool,
    write_report: bool,
    options: BatchOptions,
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            models: PathBuf::from("models.xml"),
            palette: PathBuf::from("resources/palette.xml"),
            single: SingleRun::default(),
            emit_both: false,
            write_report: true,
            options: BatchOptions::default(),
        }
    }
}

impl Cli {
    fn parse(args: &[String]) -> Result<Self> {
        let mut cli = Cli::default();
        let mut positional = 0;
        let mut iter = args.iter();

        while let Some(arg) = iter.next() {
            let name = arg.as_str();
            let mut value = |flag: &str| {
                iter.next()
                    .map(String::as_str)
                    .with_context(|| format!("{flag} needs a value"))
            };
            match name {
                "--output" => cli.options.output_root = PathBuf::from(value(name)?),
                "--workers" => cli.options.workers = number(name, value(name)?)?,
                "--emit-both" => cli.emit_both = true,
                "--seed" => cli.single.seed = number(name, value(name)?)?,
                "--amount" => cli.single.amount = number(name, value(name)?)?,
                "--master-seed" => cli.options.master_seed = Some(number(name, value(name)?)?),
                "--rng" => {
                    cli.options.rng = value(name)?.parse().map_err(anyhow::Error::msg)?;
                }
                "--missing-color" => {
                    cli.options.missing_color = value(name)?.parse().map_err(anyhow::Error::msg)?;
                }
                "--no-report" => cli.write_report = false,
                flag if flag.starts_with("--") => bail!("unknown flag {flag}\n{USAGE}"),
                _ => {
                    match positional {
                        0 => cli.models = PathBuf::from(arg),
                        1 => cli.palette = PathBuf::from(arg),
                        2 => cli.single.size = number("SIZE", arg)?,
                        3 => cli.single.dimension = number("DIMENSION", arg)?,
                        4 => cli.single.steps = number("STEPS", arg)?,
                        _ => bail!("unexpected argument {arg}\n{USAGE}"),
                    }
                    positional += 1;
                }
            }
        }

        if cli.options.workers == 0 {
            bail!("--workers must be at least 1");
        }
        if cli.single.amount == 0 {
            bail!("--amount must be at least 1");
        }
        if cli.single.size == 0 {
            bail!("SIZE must be positive");
        }
        if !matches!(cli.single.dimension, 2 | 3) {
            bail!("DIMENSION must be 2 or 3");
        }
        cli.single.model_path = cli.models.clone();
        Ok(cli)
    }
}

fn number<T>(name: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("invalid value '{value}' for {name}"))
}

/// Create `dir` and remove the files left by earlier runs.
///
/// Subdirectories are kept, except the frame directories of the gif entries
/// about to run.
fn prepare_output_dir(dir: &Path, entries: &[ModelEntry]) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {:?}", dir))?;
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {:?}", dir))? {
        let path = entry?.path();
        if path.is_file() {
            fs::remove_file(&path).with_context(|| format!("Failed to remove {:?}", path))?;
        }
    }
    for config in entries.iter().flatten().filter(|config| config.gif) {
        let frames = dir.join(&config.name);
        if frames.is_dir() {
            fs::remove_dir_all(&frames)
                .with_context(|| format!("Failed to remove {:?}", frames))?;
        }
    }
    Ok(())
}

/// Model entries for either command line form.
fn model_entries(cli: &Cli) -> Result<Vec<ModelEntry>> {
    let root = document_root(&cli.models)
        .with_context(|| format!("Failed to read {:?}", cli.models))?;

    if root == MODELS_ROOT {
        let mut entries = load_models(&cli.models)
            .with_context(|| format!("Failed to load models from {:?}", cli.models))?;
        for config in entries.iter_mut().flatten() {
            config.emit_both |= cli.emit_both;
        }
        for err in entries.iter().filter_map(|entry| entry.as_ref().err()) {
            warn!("{}", err);
        }
        Ok(entries)
    } else {
        info!("{:?} is a <{}> model, running it directly", cli.models, root);
        Ok(vec![Ok(ModelConfig::single_run(&cli.single))])
    }
}

fn run() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let started = Instant::now();
    let args: Vec<String> = std::env::args().skip(1).collect();
    for arg in &args {
        info!("Argument: {}", arg);
    }
    let cli = Cli::parse(&args)?;

    let palette = load_palette(&cli.palette)
        .with_context(|| format!("Failed to load palette from {:?}", cli.palette))?;
    let entries = model_entries(&cli)?;
    prepare_output_dir(&cli.options.output_root, &entries)?;

    let scheduler = RunScheduler::new(cli.options.clone());
    let report = scheduler
        .run_batch(&entries, &palette)
        .context("Batch aborted")?;

    if cli.write_report {
        let path = report.write_json(&cli.options.output_root)?;
        info!("Report written to {:?}", path);
    }
    println!("time = {}", started.elapsed().as_millis());
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        error!("Fatal error: {:#}", e);
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mj_core::batch::PaletteLookupPolicy;
    use mj_core::markov_junior::RngKind;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse(&[]).unwrap();
        assert_eq!(cli.models, PathBuf::from("models.xml"));
        assert_eq!(cli.palette, PathBuf::from("resources/palette.xml"));
        assert_eq!(cli.single.size, 20);
        assert_eq!(cli.single.dimension, 3);
        assert_eq!(cli.single.steps, 2000);
        assert_eq!(cli.single.amount, 3);
        assert_eq!(cli.options.output_root, PathBuf::from("output"));
        assert_eq!(cli.options.workers, 1);
        assert!(cli.write_report);
    }

    #[test]
    fn test_positionals_and_flags() {
        let cli = Cli::parse(&args(&[
            "models/Test2.xml",
            "pal.xml",
            "12",
            "2",
            "300",
            "--seed",
            "41",
            "--workers",
            "4",
            "--rng",
            "dotnet",
            "--missing-color",
            "placeholder",
            "--master-seed",
            "9",
            "--output",
            "frames",
            "--no-report",
        ]))
        .unwrap();
        assert_eq!(cli.single.model_path, PathBuf::from("models/Test2.xml"));
        assert_eq!(cli.palette, PathBuf::from("pal.xml"));
        assert_eq!(
            (cli.single.size, cli.single.dimension, cli.single.steps),
            (12, 2, 300)
        );
        assert_eq!(cli.single.seed, 41);
        assert_eq!(cli.options.workers, 4);
        assert_eq!(cli.options.rng, RngKind::DotNet);
        assert_eq!(cli.options.missing_color, PaletteLookupPolicy::Placeholder);
        assert_eq!(cli.options.master_seed, Some(9));
        assert_eq!(cli.options.output_root, PathBuf::from("frames"));
        assert!(!cli.write_report);
    }

    #[test]
    fn test_rejects_bad_arguments() {
        assert!(Cli::parse(&args(&["--bogus"])).is_err());
        assert!(Cli::parse(&args(&["--workers"])).is_err());
        assert!(Cli::parse(&args(&["--workers", "0"])).is_err());
        assert!(Cli::parse(&args(&["m.xml", "p.xml", "ten"])).is_err());
        assert!(Cli::parse(&args(&["m.xml", "p.xml", "10", "4"])).is_err());
        assert!(Cli::parse(&args(&["--rng", "mt"])).is_err());
        assert!(Cli::parse(&args(&["a", "b", "1", "2", "3", "extra"])).is_err());
    }

    fn gif_entry(name: &str) -> ModelEntry {
        let mut config = ModelConfig::single_run(&SingleRun {
            model_path: PathBuf::from(format!("models/{name}.xml")),
            ..SingleRun::default()
        });
        config.gif = true;
        Ok(config)
    }

    #[test]
    fn test_prepare_output_dir_clears_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("output");
        fs::create_dir_all(out.join("Anim")).unwrap();
        fs::write(out.join("Anim").join("0.png"), b"x").unwrap();
        fs::write(out.join("Old_1.vox"), b"x").unwrap();

        prepare_output_dir(&out, &[gif_entry("Anim")]).unwrap();
        assert!(out.is_dir());
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
    }

    #[test]
    fn test_prepare_output_dir_keeps_other_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("models")).unwrap();
        fs::write(dir.path().join("models").join("Anim.xml"), b"<one/>").unwrap();
        fs::create_dir_all(dir.path().join("Still")).unwrap();
        fs::write(dir.path().join("Still_3.png"), b"x").unwrap();

        let mut still = gif_entry("Still");
        if let Ok(config) = still.as_mut() {
            config.gif = false;
        }
        prepare_output_dir(dir.path(), &[gif_entry("Anim"), still]).unwrap();

        assert!(dir.path().join("models").join("Anim.xml").is_file());
        assert!(dir.path().join("Still").is_dir());
        assert!(!dir.path().join("Still_3.png").exists());
    }
}
