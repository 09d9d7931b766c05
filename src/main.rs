//! chatmark - export AI chat conversations from saved pages

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use chatmark::dom::{Document, NodeId};
use chatmark::images::SnapshotHost;
use chatmark::platform::{Platform, ScrollTarget};
use chatmark::{ExportFormat, Exporter, HeadingStyle, Page, PlatformKind, Result, Settings};

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Md,
    Json,
}

#[derive(Parser)]
#[command(name = "chatmark")]
#[command(version, about = "Export AI chat conversations to Markdown or JSON", long_about = None)]
#[command(after_help = "EXAMPLES:
    chatmark chat.html --url https://chatgpt.com/c/abc -o chat.md
    chatmark chat.html --url https://gemini.google.com/app/1 --format json
    chatmark chat.html --url https://grok.x.ai/chat/1 --inspect")]
struct Cli {
    /// Saved page (HTML snapshot)
    #[arg(value_name = "SNAPSHOT")]
    snapshot: PathBuf,

    /// URL the page was saved from
    #[arg(long)]
    url: String,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Settings file (JSON, camelCase keys)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    format: Option<Format>,

    /// Embed images as data URIs
    #[arg(long)]
    embed_images: bool,

    /// Allow fetching remote images for embedding
    #[arg(long)]
    allow_fetch: bool,

    /// Cookie header sent with image fetches
    #[arg(long, value_name = "STR")]
    cookie: Option<String>,

    /// Q/A headings instead of role headings
    #[arg(long)]
    qa: bool,

    /// Include a table of contents
    #[arg(long)]
    toc: bool,

    /// Plain header instead of YAML front-matter
    #[arg(long)]
    no_front_matter: bool,

    /// Keep consecutive duplicate messages
    #[arg(long)]
    no_dedupe: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Show what the adapter sees instead of exporting
    #[arg(long)]
    inspect: bool,
}

impl Cli {
    fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };
        if let Some(format) = self.format {
            settings.export_format = match format {
                Format::Md => ExportFormat::Md,
                Format::Json => ExportFormat::Json,
            };
        }
        if self.embed_images {
            settings.embed_images_in_markdown = true;
        }
        if self.allow_fetch {
            settings.allow_image_fetch = true;
        }
        if self.qa {
            settings.heading_style = HeadingStyle::Qa;
        }
        if self.toc {
            settings.include_toc = true;
        }
        if self.no_front_matter {
            settings.include_yaml_front_matter = false;
        }
        if self.no_dedupe {
            settings.dedupe_consecutive = false;
        }
        if self.verbose {
            settings.debug = true;
        }
        Ok(settings)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match cli.settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(settings.debug);

    let result = if cli.inspect {
        inspect(&cli.snapshot, &cli.url)
    } else {
        export(&cli, settings)
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = if debug {
        tracing_subscriber::EnvFilter::new(default)
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_page(snapshot: &Path, url: &str) -> Result<Page> {
    let bytes = std::fs::read(snapshot)?;
    Page::from_html_bytes(url, &bytes)
}

fn export(cli: &Cli, settings: Settings) -> Result<()> {
    let page = load_page(&cli.snapshot, &cli.url)?;

    let mut host = SnapshotHost::new();
    if let Some(dir) = cli.snapshot.parent() {
        host = host.with_asset_dir(dir);
    }
    if let Some(cookie) = &cli.cookie {
        host = host.with_cookie(cookie.as_str());
    }

    let exporter = Exporter::new(settings);
    let Some(doc) = exporter.export(&page, &host)? else {
        return Ok(());
    };

    match &cli.output {
        Some(path) => {
            std::fs::write(path, doc)?;
            tracing::info!(path = %path.display(), "wrote export");
        }
        None => print!("{doc}"),
    }
    Ok(())
}

fn inspect(snapshot: &Path, url: &str) -> Result<()> {
    let page = load_page(snapshot, url)?;
    let kind = PlatformKind::detect(&page.url)?;
    let platform: &dyn Platform = kind.adapter();
    let dom = &page.document;

    println!("Platform: {kind}");
    println!("Title: {}", platform.title(dom));
    match platform.scroll_container(dom) {
        ScrollTarget::Element(id) => println!("Scroll container: {}", describe(dom, id)),
        ScrollTarget::Window => println!("Scroll container: window"),
    }

    let messages = platform.messages(dom);
    println!("Messages: {}", messages.len());
    for (i, message) in messages.iter().enumerate() {
        println!(
            "  {:>3}. {:<9} {:<11} {} ({})",
            i + 1,
            message.role,
            format!("{:?}", message.role_source).to_lowercase(),
            message.stable_key,
            describe(dom, message.content_root)
        );
    }
    println!("Load-more controls: {}", platform.load_more_controls(dom).len());
    println!("Reasoning toggles: {}", platform.reasoning_toggles(dom).len());
    Ok(())
}

/// `tag#id.class1.class2`
fn describe(dom: &Document, id: NodeId) -> String {
    let mut out = dom.tag(id).unwrap_or("#node").to_string();
    if let Some(el_id) = dom.element_id(id) {
        out.push('#');
        out.push_str(el_id);
    }
    for class in dom.element_classes(id) {
        out.push('.');
        out.push_str(class);
    }
    out
}
