use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use nmrshift_migrate::app::{Migration, RunOptions, Source};
use nmrshift_migrate::config::ConfigLoader;
use nmrshift_migrate::error::MigrateError;
use nmrshift_migrate::fetch::HttpFetcher;
use nmrshift_migrate::fs_util::ZipExtractor;
use nmrshift_migrate::layout::Layout;
use nmrshift_migrate::output::{JsonOutput, OutputMode, SummaryOutput};

#[derive(Parser)]
#[command(name = "nmrshift-migrate")]
#[command(about = "Migrate NMRShiftDB records and raw spectra into an nmrXiv-ready folder hierarchy")]
#[command(version, author)]
struct Cli {
    /// URL of the NMReData SD export (defaults to the config or the public NMRShiftDB export)
    #[arg(long)]
    source_url: Option<String>,

    /// Read the export from a local file instead of downloading it
    #[arg(long, conflicts_with = "source_url")]
    source_file: Option<String>,

    /// Output root
    #[arg(long, default_value = "output")]
    output: String,

    /// JSON config file (defaults to nmrshift-migrate.json when present)
    #[arg(long)]
    config: Option<String>,

    /// Continue inside an output root left by a previous run
    #[arg(long)]
    resume: bool,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<MigrateError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &MigrateError) -> u8 {
    match error {
        MigrateError::OutputExists(_) => 2,
        MigrateError::SourceUnreachable(_)
        | MigrateError::Network(_)
        | MigrateError::HttpStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Summary
    };

    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let source = match (cli.source_file, cli.source_url) {
        (Some(path), _) => Source::File(Utf8PathBuf::from(path)),
        (None, Some(url)) => Source::Url(url),
        (None, None) => Source::Url(config.source_url.clone()),
    };

    let layout = Layout::new(cli.output);
    let fetcher = HttpFetcher::new()?;
    let migration = Migration::new(layout, config, fetcher, ZipExtractor);
    let report = migration.run(&source, RunOptions { resume: cli.resume })?;

    match output_mode {
        OutputMode::Json => JsonOutput::print_report(&report).into_diagnostic()?,
        OutputMode::Summary => SummaryOutput::print_report(&report).into_diagnostic()?,
    }
    Ok(())
}
