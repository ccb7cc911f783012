use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pdf_engine::{LopdfDocument, OpenSource, StampOptions, StampingPipeline};
use pdf_signer_core::{AnnotationStore, NewAnnotation, SignerConfig};
use pdf_signer_scheduler::PageRenderWindow;
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const RENDER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Parser)]
#[command(name = "pdf-signer-cli")]
#[command(about = "Place signatures, text, dates and check marks on PDF pages")]
pub struct Cli {
    /// Settings file written by `SignerConfig::save_to_file`; environment otherwise.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable page geometry.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Bake annotations from a JSON file into a copy of the PDF.
    Stamp {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// JSON array of annotations (page_index, position, optional size, payload).
        #[arg(long, value_name = "JSON")]
        annotations: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Render a thumbnail PNG for a page.
    RenderThumb {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 320)]
        width: u32,
        #[arg(long, default_value_t = 320)]
        height: u32,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    pages: Vec<PageOutput>,
}

#[derive(Debug, Serialize)]
struct PageOutput {
    index: u32,
    width: f32,
    height: f32,
    rotation: u16,
}

#[derive(Debug, Serialize)]
struct StampReport {
    output: String,
    stamped: usize,
    warnings: Vec<String>,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Stamp { file, annotations, output } => {
            let config = load_config(cli.config.as_deref())?;
            run_stamp(&config, &file, &annotations, output.as_deref())
        }
        Commands::RenderThumb { file, page, width, height, output } => {
            run_render_thumb(&file, page, width, height, output.as_deref())
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<SignerConfig> {
    match path {
        Some(path) => SignerConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => SignerConfig::from_env().context("invalid configuration in environment"),
    }
}

fn open_document(file: &Path) -> Result<LopdfDocument> {
    ensure_pdf_exists(file)?;
    LopdfDocument::open(OpenSource::from(file)).context("failed to open PDF")
}

fn run_info(file: &Path) -> Result<()> {
    let document = open_document(file)?;

    let pages = document
        .pages()
        .iter()
        .zip(0u32..)
        .map(|(info, index)| PageOutput {
            index,
            width: info.width,
            height: info.height,
            rotation: info.rotation,
        })
        .collect();
    let payload = InfoOutput {
        path: file.display().to_string(),
        page_count: document.page_count(),
        pages,
    };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    Ok(())
}

fn run_stamp(
    config: &SignerConfig,
    file: &Path,
    annotations: &Path,
    output: Option<&Path>,
) -> Result<()> {
    let document = open_document(file)?;

    let raw = fs::read(annotations)
        .with_context(|| format!("failed to read annotations from {}", annotations.display()))?;
    let incoming: Vec<NewAnnotation> =
        serde_json::from_slice(&raw).context("annotations file is not a valid annotation list")?;

    let mut store = AnnotationStore::new(config.min_annotation_size);
    for annotation in incoming {
        store.add(annotation);
    }
    log::debug!("loaded {} annotations", store.len());

    let pipeline = StampingPipeline::new(StampOptions::from_config(config));
    let stamped = pipeline
        .stamp(document.bytes(), &store.snapshot())
        .context("failed to stamp PDF")?;

    let output = output.map(ToOwned::to_owned).unwrap_or_else(|| default_signed_output(file));
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&output, &stamped.bytes)
        .with_context(|| format!("failed to write PDF to {}", output.display()))?;

    for warning in &stamped.warnings {
        eprintln!("warning: {warning}");
    }
    let report = StampReport {
        output: output.display().to_string(),
        stamped: stamped.stamped,
        warnings: stamped.warnings.iter().map(ToString::to_string).collect(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

fn run_render_thumb(
    file: &Path,
    page: u32,
    width: u32,
    height: u32,
    output: Option<&Path>,
) -> Result<()> {
    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }
    if width == 0 || height == 0 {
        anyhow::bail!("--width and --height must be positive");
    }

    let document = open_document(file)?;
    let page_count = document.page_count();
    if page > page_count {
        anyhow::bail!("page {page} out of range (page_count={page_count})");
    }

    // Render just large enough for the thumbnail box
    let bounds = document.page_info(page - 1)?.bounds();
    let (page_width, page_height) = if bounds.is_quarter_turn() {
        (bounds.height, bounds.width)
    } else {
        (bounds.width, bounds.height)
    };
    let scale = (width as f32 / page_width).min(height as f32 / page_height).max(0.01);

    let mut window = PageRenderWindow::new(Arc::new(document), page_count, 0, scale)
        .context("failed to start render worker")?;
    window.set_current_page(page);
    if !window.wait_until_idle(RENDER_TIMEOUT) {
        anyhow::bail!("timed out rendering page {page}");
    }
    let surface = window.surface(page).context("failed to render thumbnail")?;
    let image = surface.thumbnail(width, height);

    let output =
        output.map(ToOwned::to_owned).unwrap_or_else(|| default_thumbnail_output(file, page));

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    image
        .save(&output)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());

    Ok(())
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_thumbnail_output(file: &Path, page: u32) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("thumbnail");

    file.with_file_name(format!("{stem}-page-{page}.png"))
}

fn default_signed_output(file: &Path) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("document");

    file.with_file_name(format!("{stem}-signed.pdf"))
}
