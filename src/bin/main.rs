//! adoc-content CLI - Convert AsciiDoc documents into content entries
//!
//! Usage:
//!   adoc-content convert <file.adoc>... [--thread] [--output json]
//!   adoc-content entry <file.adoc>
//!
//! Examples:
//!   adoc-content convert src/blog/*.adoc
//!   adoc-content convert src/blog/post.adoc --output json
//!   adoc-content entry src/blog/post.adoc

use adoc_content::config::{Settings, SettingsError, WorkerMode};
use adoc_content::processor::{self, AsciidoctorProcessor};
use adoc_content::session::{ContentEntry, Session, SessionMode};
use adoc_content::telemetry;
use adoc_content::worker::InitOptions;
use clap::{Parser, Subcommand, ValueEnum};
use futures::future::join_all;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "adoc-content")]
#[command(about = "adoc-content - AsciiDoc documents as static-site content entries")]
#[command(version)]
struct Cli {
    /// Path to a config file (defaults to ./adoc-content.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert documents through the conversion worker
    Convert {
        /// Paths to .adoc files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Run the worker on a thread instead of a child process
        #[arg(long)]
        thread: bool,

        /// Output format
        #[arg(short, long, default_value = "summary")]
        output: OutputFormat,
    },

    /// Print the content-collection entry of a document
    Entry {
        /// Path to the .adoc file
        file: PathBuf,
    },

    /// Serve conversion requests on stdin/stdout
    #[command(hide = true)]
    Worker {
        /// Worker init options as JSON
        #[arg(long)]
        init: Option<String>,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// One line per document
    Summary,
    /// Converted documents as a JSON array
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match load_settings(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = telemetry::init(&settings.logging) {
        eprintln!("Warning: {}", e);
    }

    match cli.command {
        Commands::Convert {
            files,
            thread,
            output,
        } => cmd_convert(settings, files, thread, output),
        Commands::Entry { file } => cmd_entry(file),
        Commands::Worker { init } => cmd_worker(init),
    }
}

fn load_settings(path: Option<&Path>) -> Result<Settings, SettingsError> {
    match path {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    }
}

fn cmd_convert(
    mut settings: Settings,
    files: Vec<PathBuf>,
    thread: bool,
    output: OutputFormat,
) -> ExitCode {
    if thread {
        settings.worker.mode = WorkerMode::Thread;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error starting runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(convert_all(settings, files, output))
}

async fn convert_all(settings: Settings, files: Vec<PathBuf>, output: OutputFormat) -> ExitCode {
    let session = match Session::from_settings(&settings, SessionMode::Build).await {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Error starting conversion worker: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let ids: Vec<String> = files.iter().map(|f| f.display().to_string()).collect();
    let results = join_all(ids.iter().map(|id| session.transform(id))).await;

    let mut failures = 0;
    let mut documents = Vec::new();

    for (id, result) in ids.iter().zip(results) {
        match result {
            Ok(Some(document)) => {
                if let OutputFormat::Summary = output {
                    println!(
                        "ok    {}: {} ({} headings, {} includes)",
                        id,
                        document.title().unwrap_or(""),
                        document.headings.len(),
                        document.includes.len()
                    );
                }
                documents.push(serde_json::json!({ "file": id, "document": document }));
            }
            Ok(None) => {
                if let OutputFormat::Summary = output {
                    println!("skip  {}: not an AsciiDoc file", id);
                }
            }
            Err(e) => {
                failures += 1;
                eprintln!("fail  {}: {}", id, e);
            }
        }
    }

    if let OutputFormat::Json = output {
        match serde_json::to_string_pretty(&documents) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                failures += 1;
            }
        }
    }

    if let Err(e) = session.build_done().await {
        error!(error = %e, "failed to terminate conversion worker");
    }

    if failures > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn cmd_entry(file: PathBuf) -> ExitCode {
    let contents = match fs::read_to_string(&file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", file.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let entry = match ContentEntry::parse(&contents) {
        Ok(entry) => entry,
        Err(e) => {
            eprintln!("Error parsing '{}': {}", file.display(), e);
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&entry) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error serializing entry: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_worker(init: Option<String>) -> ExitCode {
    let init: InitOptions = match init.as_deref().map(serde_json::from_str).transpose() {
        Ok(init) => init.unwrap_or_default(),
        Err(e) => {
            eprintln!("Error parsing worker init options: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let processor = AsciidoctorProcessor::new(init);
    info!(command = processor.command(), "conversion worker ready");

    let stdin = io::stdin();
    let stdout = io::stdout();
    match processor::serve(stdin.lock(), stdout.lock(), &processor) {
        Ok(answered) => {
            info!(answered, "conversion worker stopping");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "conversion worker failed");
            ExitCode::FAILURE
        }
    }
}
