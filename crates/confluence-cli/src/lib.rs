use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use confluence_client::{
    select_attachments, uploaded_title, ConfluenceClient, ContentApi, UploadOptions,
};
use confluence_config::{Config, LoadOptions};
use confluence_embed::fs::write_atomic;
use confluence_embed::{build_unified_diff, load_body, resolve, BodySource, ImageReference};
use tracing::{debug, warn};

mod logging;
pub mod workflow;

use workflow::{embed_uploaded, local_name, upload_image, EmbedRequest, EmbedStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,
    Failure = 1,
}

/// Entry point for CLI execution. Returns the desired exit code.
pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.globals.verbose, cli.globals.quiet);

    match cli.command {
        Command::Upload(args) => handle_upload(&connect(&cli.globals)?.client, args),
        Command::Embed(args) => {
            let session = connect(&cli.globals)?;
            handle_embed(&session.client, &session.config, args)
        }
        Command::Delete(args) => handle_delete(&connect(&cli.globals)?.client, args),
        Command::Download(args) => handle_download(&connect(&cli.globals)?.client, args),
        Command::Resolve(args) => handle_resolve(args),
    }
}

struct Session {
    config: Config,
    client: ConfluenceClient,
}

/// Loads layered configuration and builds the client. Fails when any
/// credential is missing.
fn connect(globals: &GlobalArgs) -> Result<Session> {
    let mut options = LoadOptions::default();
    if let Some(path) = &globals.config {
        options = options.with_config_path(path);
    }
    if let Some(path) = &globals.env_file {
        options = options.with_env_file(path);
    }
    let config = Config::load(options)?;
    debug!(layers = config.sources.layers.len(), "configuration loaded");

    let credentials = config.credentials()?;
    let client = ConfluenceClient::new(credentials, config.http.timeout)?;
    Ok(Session { config, client })
}

fn handle_upload(api: &dyn ContentApi, args: UploadArgs) -> Result<ExitCode> {
    let UploadArgs {
        page_id,
        file,
        comment,
        no_minor_edit,
    } = args;

    if !file.is_file() {
        eprintln!("File not found: {}", file.display());
        return Ok(ExitCode::Failure);
    }

    let options = UploadOptions {
        comment,
        minor_edit: !no_minor_edit,
    };
    let stored = match api.upload_attachment(&page_id, &file, &options) {
        Ok(stored) => stored,
        Err(err) => {
            eprintln!("Upload failed: {err}");
            return Ok(ExitCode::Failure);
        }
    };

    if stored.is_empty() {
        println!("Uploaded: {}", uploaded_title(&stored, &local_name(&file)));
    }
    for attachment in &stored {
        println!("Uploaded: {}", attachment.title);
    }
    Ok(ExitCode::Success)
}

fn handle_embed(api: &dyn ContentApi, config: &Config, args: EmbedArgs) -> Result<ExitCode> {
    let EmbedArgs {
        page_id,
        image,
        alt,
        width,
        anchor,
        comment,
        message,
        no_minor_edit,
        dry_run,
    } = args;

    let request = EmbedRequest {
        page_id,
        image,
        alt,
        width: width.filter(|w| *w > 0),
        anchor: anchor.filter(|a| !a.is_empty()),
        comment,
        message: message.unwrap_or_else(|| config.embed.message.clone()),
        minor_edit: config.embed.minor_edit && !no_minor_edit,
        dry_run,
    };

    let title = match upload_image(api, &request) {
        Ok(title) => title,
        Err(err) => {
            eprintln!("{err}");
            return Ok(ExitCode::Failure);
        }
    };
    println!("Uploaded attachment: {title}");

    let report = match embed_uploaded(api, &request, &title) {
        Ok(report) => report,
        Err(err) => {
            eprintln!("{err}");
            return Ok(ExitCode::Failure);
        }
    };

    match report.status {
        EmbedStatus::Skipped => println!("Image already embedded; page update skipped."),
        EmbedStatus::DryRun => {
            if let Some(diff) = &report.diff {
                emit(diff)?;
            }
            println!("Dry-run: page would be updated (storage).");
        }
        EmbedStatus::Updated { version } => {
            debug!(version, placement = report.placement.describe(), "page written");
            println!("Page updated: embedded image macro.");
        }
    }
    Ok(ExitCode::Success)
}

fn handle_delete(api: &dyn ContentApi, args: DeleteArgs) -> Result<ExitCode> {
    let DeleteArgs { page_id, filenames } = args;

    let attachments = match api.list_attachments(&page_id) {
        Ok(attachments) => attachments,
        Err(err) => {
            eprintln!("HTTP error fetching page: {err}");
            return Ok(ExitCode::Failure);
        }
    };

    let selection = select_attachments(&attachments, &filenames);
    for name in &selection.missing {
        eprintln!("Warning: attachment '{name}' not found on page");
    }
    if selection.found.is_empty() {
        eprintln!("No matching attachments to delete.");
        return Ok(ExitCode::Failure);
    }

    for attachment in selection.found {
        if let Err(err) = api.delete_attachment(&attachment.id) {
            eprintln!("Failed to delete {}: {err}", attachment.title);
            return Ok(ExitCode::Failure);
        }
        println!("Deleted: {}", attachment.title);
    }
    Ok(ExitCode::Success)
}

fn handle_download(api: &dyn ContentApi, args: DownloadArgs) -> Result<ExitCode> {
    let DownloadArgs {
        page_id,
        filename,
        output,
    } = args;

    let bytes = match api.download_attachment(&page_id, &filename) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("Download failed: {err}");
            return Ok(ExitCode::Failure);
        }
    };

    let target = output.unwrap_or_else(|| PathBuf::from(&filename));
    let target = if target.is_absolute() {
        target
    } else {
        std::env::current_dir()
            .context("failed to resolve working directory")?
            .join(target)
    };
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&target, &bytes).with_context(|| format!("failed to write {}", target.display()))?;

    println!("Downloaded: {}", target.display());
    Ok(ExitCode::Success)
}

fn handle_resolve(args: ResolveArgs) -> Result<ExitCode> {
    let ResolveArgs {
        body,
        filename,
        alt,
        width,
        anchor,
        in_place,
        no_backup,
        diff,
    } = args;

    let source = BodySource::from_arg(&body);
    if in_place && matches!(source, BodySource::Stdin) {
        anyhow::bail!("--in-place needs a file, not stdin");
    }
    let original = load_body(&source)?;

    let mut image = ImageReference::new(filename).with_alt(alt);
    if let Some(width) = width {
        image = image.with_width(width);
    }
    if let Some(anchor) = anchor {
        image = image.with_anchor(anchor);
    }
    let resolution = resolve(&original, &image);
    debug!(placement = resolution.placement.describe(), "resolved");

    if !resolution.changed {
        if !in_place && !diff {
            emit(&original)?;
        }
        eprintln!("No changes ({})", resolution.placement.describe());
        return Ok(ExitCode::Success);
    }

    if diff {
        let label = body.display().to_string();
        if let Some(rendered) = build_unified_diff(&original, &resolution.body, &label) {
            emit(&rendered)?;
        }
    }

    if in_place {
        write_atomic(&body, &resolution.body, !no_backup)?;
        println!("Updated {}", body.display());
    } else if !diff {
        emit(&resolution.body)?;
    }

    if no_backup && !in_place {
        warn!("--no-backup has no effect without --in-place");
    }
    Ok(ExitCode::Success)
}

fn emit(content: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(content.as_bytes())?;
    if !content.ends_with('\n') {
        writeln!(stdout)?;
    }
    Ok(())
}

#[derive(Parser)]
#[command(
    name = "confluence-attach",
    author,
    version,
    about = "Upload, embed and manage Confluence page attachments",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    globals: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct GlobalArgs {
    /// Read settings from this TOML file instead of `.confluence-attach.toml`
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Read credentials from this file instead of `.env`
    #[arg(long = "env-file", global = true, value_name = "PATH")]
    env_file: Option<PathBuf>,
    /// Increase log verbosity (repeatable)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Upload or replace a file attachment on a page
    Upload(UploadArgs),
    /// Upload an image and embed it in the page body
    Embed(EmbedArgs),
    /// Delete attachments from a page by filename
    Delete(DeleteArgs),
    /// Download an attachment from a page
    Download(DownloadArgs),
    /// Embed an image reference into a local storage-format body
    Resolve(ResolveArgs),
}

#[derive(Args)]
struct UploadArgs {
    /// Confluence page ID
    page_id: String,
    /// File to upload
    file: PathBuf,
    /// Attachment comment
    #[arg(long)]
    comment: Option<String>,
    /// Notify watchers about the new version
    #[arg(long = "no-minor-edit")]
    no_minor_edit: bool,
}

#[derive(Args)]
struct EmbedArgs {
    /// Confluence page ID
    page_id: String,
    /// Local image to upload and embed
    image: PathBuf,
    /// Alt text for the image macro
    #[arg(long, default_value = "")]
    alt: String,
    /// Display width in pixels
    #[arg(long)]
    width: Option<u32>,
    /// Insert right after the first occurrence of this markup
    #[arg(long)]
    anchor: Option<String>,
    /// Attachment comment
    #[arg(long)]
    comment: Option<String>,
    /// Version message for the page update
    #[arg(long)]
    message: Option<String>,
    /// Notify watchers about the upload and page update
    #[arg(long = "no-minor-edit")]
    no_minor_edit: bool,
    /// Show the page change without writing it
    #[arg(long = "dry-run")]
    dry_run: bool,
}

#[derive(Args)]
struct DeleteArgs {
    /// Confluence page ID
    page_id: String,
    /// Attachment filenames to delete
    #[arg(required = true)]
    filenames: Vec<String>,
}

#[derive(Args)]
struct DownloadArgs {
    /// Confluence page ID
    page_id: String,
    /// Attachment filename
    filename: String,
    /// Output path (default: ./FILENAME)
    output: Option<PathBuf>,
}

#[derive(Args)]
struct ResolveArgs {
    /// Storage-format body file, or `-` for stdin
    #[arg(value_name = "BODY_FILE")]
    body: PathBuf,
    /// Attachment filename to reference
    filename: String,
    /// Alt text for the image macro
    #[arg(long, default_value = "")]
    alt: String,
    /// Display width in pixels
    #[arg(long)]
    width: Option<u32>,
    /// Insert right after the first occurrence of this markup
    #[arg(long)]
    anchor: Option<String>,
    /// Rewrite BODY_FILE instead of printing the result
    #[arg(long = "in-place")]
    in_place: bool,
    /// Skip the `.bak` copy when rewriting in place
    #[arg(long = "no-backup")]
    no_backup: bool,
    /// Print a unified diff of the change
    #[arg(long)]
    diff: bool,
}
