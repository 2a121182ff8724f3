use bulk_resize::imaging::{HexColor, Quality, ResizeMode, RustBackend};
use bulk_resize::store::ImageStore;
use bulk_resize::task::{ManagerOptions, ResizeRequest, TaskManager, TaskStatus};
use bulk_resize::{config, output, server};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// How often the `resize` command polls its task.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Parser)]
#[command(name = "bulk-resize")]
#[command(about = "Batch image resizing: stretch, fit, or fill to one target size")]
#[command(long_about = "\
Batch image resizing: stretch, fit, or fill to one target size

Modes:
  stretch   Scale to exactly WIDTHxHEIGHT, ignoring aspect ratio
  fit       Scale to fit inside WIDTHxHEIGHT and center on a transparent
            canvas (white for JPEG)
  fill      Like fit, but the canvas is filled with --fill-color

Run 'bulk-resize serve' for the HTTP API, or 'bulk-resize resize' to process
files from the command line through the same engine.

Run 'bulk-resize gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct ServeArgs {
    /// Config file (stock defaults are used if it does not exist)
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Override `server.host`
    #[arg(long)]
    host: Option<String>,

    /// Override `server.port`
    #[arg(long)]
    port: Option<u16>,
}

#[derive(clap::Args)]
struct ResizeArgs {
    /// Images to resize, in output order
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Target width in pixels
    #[arg(long)]
    width: u32,

    /// Target height in pixels
    #[arg(long)]
    height: u32,

    /// stretch, fit, or fill
    #[arg(long, default_value = "fit")]
    mode: ResizeMode,

    /// Background for fill mode, as #RRGGBB
    #[arg(long)]
    fill_color: Option<HexColor>,

    /// Directory to write the result into
    #[arg(long, default_value = ".")]
    output: PathBuf,

    /// Config file for processing settings
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve(ServeArgs),
    /// Resize local files and write the image (or zip) to a directory
    Resize(ResizeArgs),
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => {
            init_tracing("bulk_resize=info,tower_http=info");
            let mut config = config::load_config(&args.config)?;
            if let Some(host) = args.host {
                config.server.host = host;
            }
            if let Some(port) = args.port {
                config.server.port = port;
            }
            config.validate()?;
            output::print_serve_summary(&config);

            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?
                .block_on(server::serve(config))?;
        }
        Command::Resize(args) => {
            init_tracing("bulk_resize=warn");
            run_resize(args)?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Run one task through the engine and write its artifact to `args.output`.
fn run_resize(args: ResizeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_config(&args.config)?;

    let store = Arc::new(ImageStore::new());
    let mut filenames = Vec::with_capacity(args.files.len());
    let mut file_ids = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let bytes = std::fs::read(path)?;
        let filename = display_name(path);
        file_ids.push(store.put(bytes.into(), filename.clone(), content_type_for(path)));
        filenames.push(filename);
    }

    output::print_resize_plan(&filenames, args.width, args.height, args.mode, args.fill_color);

    let backend = Arc::new(RustBackend::with_quality(Quality::new(
        config.processing.jpeg_quality,
    )));
    let manager = TaskManager::new(store, backend, ManagerOptions::from_config(&config)?)?;

    let mut request = ResizeRequest::new(file_ids, args.width, args.height, args.mode);
    if let Some(color) = args.fill_color {
        request = request.with_fill_color(color.to_string());
    }
    let task_id = manager.create_task(&request)?;

    let mut last_printed = None;
    let snapshot = loop {
        let snapshot = manager.progress(&task_id)?;
        let state = (snapshot.status, snapshot.completed);
        if last_printed != Some(state) {
            println!("{}", output::format_progress(&snapshot));
            last_printed = Some(state);
        }
        if snapshot.status.is_terminal() {
            break snapshot;
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    if snapshot.status == TaskStatus::Error {
        return Err(output::format_failure(&snapshot).into());
    }

    let artifact = manager.result(&task_id)?;
    std::fs::create_dir_all(&args.output)?;
    let path = args.output.join(&artifact.filename);
    std::fs::write(&path, &artifact.bytes)?;
    println!("{}", output::format_written(&path, &artifact));
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn content_type_for(path: &Path) -> String {
    image::ImageFormat::from_path(path)
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|_| "application/octet-stream".to_string())
}
