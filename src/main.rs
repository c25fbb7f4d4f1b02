use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

use flipbook::config;
use flipbook::manifest::FrameManifest;

#[derive(Parser)]
#[command(name = "flipbook", about = "Scroll-driven frame-sequence player for Kitty terminals")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Base URL of the frame sequence (frames live at <BASE_URL>/frames/)
    #[arg(global = true)]
    base_url: Option<String>,

    /// Terminal rows of scrolling per animation frame
    #[arg(long, global = true)]
    rows_per_frame: Option<u32>,

    /// Concurrent frame downloads
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Log output file path (enables logging when specified)
    #[arg(long, global = true)]
    log: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch the manifest and print the frame list without playing it
    Info,
}

fn main() {
    let cli = Cli::parse();

    if let Some(log_path) = &cli.log {
        let file = std::fs::File::create(log_path).expect("failed to open log file");
        env_logger::Builder::from_default_env()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
    } else if cli.command.is_some() {
        env_logger::init();
    }
    // player mode + no --log → logger not initialized (no log output)

    // Load config file and merge CLI overrides
    let mut cfg = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    };
    cfg.merge_cli(cli.rows_per_frame, cli.concurrency);
    let config = cfg.resolve();

    let Some(base_url) = cli.base_url else {
        eprintln!("Error: BASE_URL required (frames are fetched from <BASE_URL>/frames/)");
        std::process::exit(1);
    };

    let result = match cli.command {
        Some(Command::Info) => cmd_info(&base_url),
        None => flipbook::viewer::run(base_url, &config),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn cmd_info(base: &str) -> Result<()> {
    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(30)))
        .build()
        .into();
    let manifest = FrameManifest::fetch(&agent, base)?;
    println!("{} frames at {}/frames/", manifest.count(), base.trim_end_matches('/'));
    for i in 0..manifest.count() {
        println!("  {:>4}  {}", i, manifest.file(i));
    }
    Ok(())
}
