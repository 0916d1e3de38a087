use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use mp3_curator::config::{default_config_path, Config};
use mp3_curator::discovery::ArtistDiscoveryCollector;
use mp3_curator::library::{clean_images, print_report, scan_mp3_files, Curator, RunOptions};
use mp3_curator::metadata::MetadataSynthesizer;
use mp3_curator::normalize::FilenameNormalizer;
use mp3_curator::progress::{create_spinner, format_duration, set_log_only};
use mp3_curator::review::review_interactively;
use mp3_curator::safety::validate_target_dir;
use mp3_curator::tags::Id3TagWriter;

#[derive(Parser, Debug)]
#[command(name = "mp3-curator")]
#[command(about = "Normalize MP3 filenames to \"Artist1, Artist2_-_Title.mp3\" and rewrite their artist/title tags")]
struct Cli {
    /// Configuration file (default: <config dir>/mp3-curator/config.json)
    #[arg(long, global = true, env = "MP3_CURATOR_CONFIG")]
    config: Option<PathBuf>,

    /// Hide progress bars and log progress lines instead
    #[arg(long, global = true)]
    log_only: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Format every MP3 file in a directory
    Format(FormatArgs),

    /// Show the canonical name and tags for filenames, without touching any file
    Check(CheckArgs),

    /// Write the built-in default configuration file
    InitConfig(InitConfigArgs),
}

#[derive(Parser, Debug)]
struct FormatArgs {
    /// Directory with the downloaded files
    #[arg(env = "MP3_CURATOR_SOURCE")]
    source: Option<PathBuf>,

    /// Move formatted files into this directory instead of renaming in place
    #[arg(long, env = "MP3_CURATOR_TARGET")]
    target: Option<PathBuf>,

    /// Report what would change without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Number of planning threads (0 = one per core)
    #[arg(long, default_value = "0")]
    workers: usize,

    /// Do not offer to add new artists to the correction map
    #[arg(long)]
    no_review: bool,

    /// Delete cover images and .url shortcuts from the source directory
    #[arg(long)]
    clean_images: bool,
}

#[derive(Parser, Debug)]
struct CheckArgs {
    /// Filenames to check
    #[arg(required = true)]
    names: Vec<String>,
}

#[derive(Parser, Debug)]
struct InitConfigArgs {
    /// Overwrite an existing file
    #[arg(long)]
    force: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mp3_curator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    set_log_only(cli.log_only);
    let config_path = cli.config.unwrap_or_else(default_config_path);

    match cli.cmd {
        Command::Format(args) => cmd_format(&config_path, args),
        Command::Check(args) => cmd_check(&config_path, args),
        Command::InitConfig(args) => cmd_init_config(&config_path, args),
    }
}

fn cmd_format(config_path: &Path, args: FormatArgs) -> Result<ExitCode> {
    if args.workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.workers)
            .build_global()
            .context("Failed to set thread pool size")?;
    }

    let start = Instant::now();

    let mut config = Config::load_or_default(config_path)?;
    let rules = Arc::new(
        config
            .compile()
            .with_context(|| format!("Invalid configuration in {}", config_path.display()))?,
    );

    let source = args
        .source
        .context("No source directory: pass SOURCE or set MP3_CURATOR_SOURCE")?;
    if let Some(target) = &args.target {
        validate_target_dir(&source, target)?;
    }

    let spinner = create_spinner("Scanning");
    let files = scan_mp3_files(&source, rules.grammar.extension())?;
    spinner.finish_and_clear();
    info!(count = files.len(), source = %source.display(), "found audio files");

    let curator = Curator::new(Arc::clone(&rules), Arc::new(Id3TagWriter));
    let options = RunOptions {
        target_dir: args.target,
        dry_run: args.dry_run,
    };
    let report = curator.run(&files, &options);
    print_report(&report);

    if args.clean_images {
        clean_images(&source, args.dry_run)?;
    }

    if !report.discovered_artists.is_empty() {
        if args.no_review || args.dry_run {
            info!(
                count = report.discovered_artists.len(),
                artists = ?report.discovered_artists,
                "new artists not reviewed"
            );
        } else {
            review_interactively(&report.discovered_artists, &rules, &mut config, config_path)?;
        }
    }

    info!(elapsed = %format_duration(start.elapsed()), "done");

    Ok(if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn cmd_check(config_path: &Path, args: CheckArgs) -> Result<ExitCode> {
    let config = Config::load_or_default(config_path)?;
    let rules = Arc::new(config.compile()?);
    let normalizer = FilenameNormalizer::new(Arc::clone(&rules));
    let synthesizer = MetadataSynthesizer::new(rules);
    let discovered = ArtistDiscoveryCollector::new();

    let mut failed = 0usize;
    for name in &args.names {
        let result = normalizer
            .normalize(name, &discovered)
            .and_then(|canonical| {
                let metadata = synthesizer.synthesize(canonical.as_str())?;
                Ok((canonical, metadata))
            });
        match result {
            Ok((canonical, metadata)) => {
                println!("{}", canonical);
                println!("    artist: {}", metadata.artist_field);
                println!("    title:  {}", metadata.title);
            }
            Err(e) => {
                failed += 1;
                println!("{}", e);
            }
        }
    }

    let unknown = discovered.drain();
    if !unknown.is_empty() {
        println!("\nNot in the correction map: {}", unknown.join(", "));
    }

    Ok(if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn cmd_init_config(config_path: &Path, args: InitConfigArgs) -> Result<ExitCode> {
    if config_path.exists() && !args.force {
        bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }
    Config::default().save(config_path)?;
    println!("Wrote default configuration to {}", config_path.display());
    Ok(ExitCode::SUCCESS)
}
