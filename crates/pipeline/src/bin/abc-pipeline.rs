use std::io::{self, Write};
use std::path::PathBuf;

use abc_pipeline::{
    apply_overrides,
    logging::{self, Verbosity},
    report, run_all, run_assemble, run_split, run_stats, run_tokenize, run_vocab, OverrideArg,
    PipelineConfig,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "ABC corpus preparation pipeline", long_about = None)]
struct Args {
    #[arg(
        short,
        long,
        global = true,
        value_name = "PATH",
        help = "Pipeline config file (TOML or JSON); defaults apply when omitted"
    )]
    config: Option<PathBuf>,

    #[arg(
        long = "override",
        global = true,
        value_name = "KEY=VALUE",
        help = "Override configuration value using dot-separated paths"
    )]
    overrides: Vec<OverrideArg>,

    #[arg(short, long, global = true, help = "Log debug output")]
    verbose: bool,

    #[arg(short, long, global = true, help = "Only log warnings and errors")]
    quiet: bool,

    #[arg(long, global = true, help = "Disable progress bars")]
    no_progress: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Filter records and write the corpus file
    Assemble,
    /// Print length statistics of the raw records
    Stats,
    /// Build the character vocabulary from the corpus
    Vocab,
    /// Encode the corpus into the token array
    Tokenize,
    /// Cut the token array into train/validation/test files
    Split,
    /// Run assemble, vocab, tokenize and split in order
    Run,
}

fn run() -> Result<()> {
    let args = Args::parse();
    logging::init(Verbosity::from_flags(args.verbose, args.quiet));

    let mut config = match args.config.as_ref() {
        Some(path) => PipelineConfig::from_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if !args.overrides.is_empty() {
        config = apply_overrides(config, &args.overrides)?;
    }
    if args.no_progress || args.quiet {
        config.streaming.show_progress = false;
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match args.command {
        Command::Assemble => assemble(&config, &mut out)?,
        Command::Stats => {
            let stats = run_stats(&config)?;
            report::write_length_stats(&mut out, stats.as_ref())?;
        }
        Command::Vocab => vocab(&config, &mut out)?,
        Command::Tokenize => tokenize(&config, &mut out)?,
        Command::Split => split(&config, &mut out)?,
        Command::Run => {
            let summary = run_all(&config)?;
            report::write_assembly(&mut out, &summary.assembly, &config.paths.corpus)?;
            report::write_vocab(&mut out, &summary.vocab, &config.paths.vocab)?;
            report::write_encode(&mut out, &summary.encode)?;
            report::write_split(&mut out, &summary.split)?;
        }
    }

    out.flush()?;
    Ok(())
}

fn assemble(config: &PipelineConfig, out: &mut impl Write) -> Result<()> {
    let stats = run_assemble(config)?;
    report::write_assembly(out, &stats, &config.paths.corpus)?;
    Ok(())
}

fn vocab(config: &PipelineConfig, out: &mut impl Write) -> Result<()> {
    let report = run_vocab(config)?;
    report::write_vocab(out, &report, &config.paths.vocab)?;
    Ok(())
}

fn tokenize(config: &PipelineConfig, out: &mut impl Write) -> Result<()> {
    let report = run_tokenize(config)?;
    report::write_encode(out, &report)?;
    Ok(())
}

fn split(config: &PipelineConfig, out: &mut impl Write) -> Result<()> {
    let report = run_split(config)?;
    report::write_split(out, &report)?;
    Ok(())
}
