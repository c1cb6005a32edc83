use clap::{Parser, Subcommand};
use imagedesk::config::{self, AppConfig, ProcessingConfig};
use imagedesk::imaging::{ImageBackend, RustBackend};
use imagedesk::output::{self, FileReport};
use imagedesk::pipeline::{self, ImageOutcome, Upload};
use imagedesk::request::ProcessRequest;
use imagedesk::{server, version_string};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "imagedesk")]
#[command(about = "Web studio for chaining image operations")]
#[command(long_about = "\
Web studio for chaining image operations

Serve a single page where images are uploaded, operations are ticked, and
processed results come back with statistics and dominant colors. The same
pipeline runs from the command line against local files.

Operations:

  resize     width/height with cover, contain, fill or inside fit
  crop       left, top, width, height
  rotate     any angle (right angles are lossless)
  grayscale  drop color
  format     jpeg, png, webp or avif, with quality
  watermark  text overlay at a corner or center
  enhance    brightness, contrast, saturation, plus sharpening
  blur       gaussian, by sigma
  flip       mirror top to bottom
  flop       mirror left to right
  avatar     square crop with a circular mask, as PNG

Single mode applies operations one at a time in the order given. Batch mode
(--batch) folds them into one pass per image.

Run 'imagedesk gen-config' to generate a documented imagedesk.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (stock defaults are used when it does not exist)
    #[arg(long, default_value = "imagedesk.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the web page and the processing API
    Serve {
        /// Address to listen on, overriding `server.bind`
        #[arg(long)]
        bind: Option<String>,
    },
    /// Apply operations to local image files
    Process {
        /// Input images
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Operation to apply (repeatable, applied in order)
        #[arg(long = "op", value_name = "NAME")]
        operations: Vec<String>,
        /// JSON file with operation parameters (defaults from config otherwise)
        #[arg(long)]
        params: Option<PathBuf>,
        /// Directory for processed files
        #[arg(long, default_value = ".")]
        out: PathBuf,
        /// Fold all operations into one pass per image
        #[arg(long)]
        batch: bool,
    },
    /// Print statistics and dominant color of image files
    Stats {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print a stock imagedesk.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Command::Serve { bind } => {
            let mut config = config::load_config(&cli.config)?;
            if let Some(bind) = bind {
                config.server.bind = bind;
                config.validate()?;
            }
            init_thread_pool(&config.processing);
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(server::run(config))?;
        }
        Command::Process {
            files,
            operations,
            params,
            out,
            batch,
        } => {
            let config = config::load_config(&cli.config)?;
            init_thread_pool(&config.processing);
            let params_json = params.map(std::fs::read_to_string).transpose()?;
            let request =
                ProcessRequest::from_parts(&operations, params_json.as_deref(), &config.defaults)?;
            let uploads = read_uploads(&files)?;
            let outcomes = run_process(&RustBackend::new(), &config, &uploads, &request, batch)?;

            std::fs::create_dir_all(&out)?;
            let mut written = Vec::with_capacity(outcomes.len());
            for (upload, outcome) in uploads.iter().zip(&outcomes) {
                let path = output_path(&out, &upload.name, outcome);
                std::fs::write(&path, &outcome.output.data)?;
                debug!(path = %path.display(), "wrote processed image");
                written.push(path);
            }

            let reports: Vec<FileReport> = uploads
                .iter()
                .zip(&outcomes)
                .zip(&written)
                .map(|((upload, outcome), path)| FileReport {
                    source: &upload.name,
                    output: Some(path.as_path()),
                    stats: &outcome.stats,
                    dominant_color: outcome.dominant_color,
                })
                .collect();
            output::print_process_output(&reports, &request.operations, batch);
        }
        Command::Stats { files } => {
            let backend = RustBackend::new();
            let uploads = read_uploads(&files)?;
            let mut measured = Vec::with_capacity(uploads.len());
            for upload in &uploads {
                let stats = backend.stats(&upload.data)?;
                let color = backend.dominant_color(&upload.data)?;
                measured.push((stats, color));
            }
            let reports: Vec<FileReport> = uploads
                .iter()
                .zip(&measured)
                .map(|(upload, (stats, color))| FileReport {
                    source: &upload.name,
                    output: None,
                    stats,
                    dominant_color: *color,
                })
                .collect();
            output::print_stats_output(&reports);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log to stderr; `RUST_LOG` overrides the default `info` level.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Configure the global rayon thread pool from config.
fn init_thread_pool(processing: &ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

fn read_uploads(files: &[PathBuf]) -> std::io::Result<Vec<Upload>> {
    files
        .iter()
        .map(|path| {
            let data = std::fs::read(path)?;
            Ok(Upload::new(path.display().to_string(), data))
        })
        .collect()
}

fn run_process(
    backend: &RustBackend,
    config: &AppConfig,
    uploads: &[Upload],
    request: &ProcessRequest,
    batch: bool,
) -> Result<Vec<ImageOutcome>, pipeline::PipelineError> {
    if batch {
        pipeline::run_batch(backend, uploads, request, &config.limits)
    } else {
        uploads
            .iter()
            .map(|upload| pipeline::run_single(backend, upload, request, &config.limits))
            .collect()
    }
}

/// `<out>/<stem>-processed.<ext>`, with the extension of the produced format.
fn output_path(out: &Path, source: &str, outcome: &ImageOutcome) -> PathBuf {
    let stem = Path::new(source)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    out.join(format!(
        "{stem}-processed.{}",
        outcome.output.format.extension()
    ))
}
