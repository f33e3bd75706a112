use anyhow::{Context, Result};
use bzip2::read::MultiBzDecoder;
use clap::Args;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::signal;
use tracing::{info, warn};
use wikicorpus::{
    config::{Config, MarkupErrorPolicy},
    import::{CorpusCoordinatorBuilder, CorpusStats, Interrupt},
    output::{DirectoryWriter, PageWriter, StreamWriter},
    util::format_bytes,
};

/// Options of the `extract` command
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Dump file (`.xml` or `.xml.bz2`), or `-` for stdin
    pub input: String,

    /// Write one file per page into this directory instead of streaming to stdout
    #[arg(short = 'd', long)]
    pub output_dir: Option<PathBuf>,

    /// Keep redirect pages
    #[arg(long)]
    pub keep_redirects: bool,

    /// Write raw markup instead of converted text
    #[arg(long)]
    pub raw: bool,

    /// Abort on the first page whose markup cannot be converted
    #[arg(long)]
    pub strict: bool,

    /// Read block size in bytes
    #[arg(long)]
    pub block_size: Option<usize>,

    /// Namespace to drop (repeatable); replaces the configured list
    #[arg(long = "ignore-namespace")]
    pub ignore_namespaces: Vec<String>,

    /// Write run statistics as JSON to this file
    #[arg(long)]
    pub stats_json: Option<PathBuf>,

    /// Quiet mode (no progress output)
    #[arg(short, long)]
    pub quiet: bool,
}

impl ExtractArgs {
    /// Fold command line overrides into `config`
    fn apply(&self, config: &mut Config) {
        if self.keep_redirects {
            config.extract.skip_redirects = false;
        }
        if self.raw {
            config.convert.convert_markup = false;
        }
        if self.strict {
            config.convert.on_markup_error = MarkupErrorPolicy::Abort;
        }
        if let Some(block_size) = self.block_size {
            config.extract.block_size = block_size;
        }
        if !self.ignore_namespaces.is_empty() {
            config.extract.ignored_namespaces = self.ignore_namespaces.clone();
        }
    }
}

/// Open the dump, returning the reader and its size when it is meaningful for progress
fn open_input(input: &str) -> Result<(Box<dyn Read + Send>, Option<u64>)> {
    if input == "-" {
        return Ok((Box::new(io::stdin()), None));
    }

    let path = Path::new(input);
    let file = File::open(path)
        .with_context(|| format!("Failed to open dump '{}'", path.display()))?;

    if path.extension().is_some_and(|ext| ext == "bz2") {
        // Progress counts decompressed bytes, so the compressed size is no use as a total
        Ok((Box::new(MultiBzDecoder::new(BufReader::new(file))), None))
    } else {
        let size = file.metadata().map(|m| m.len()).ok();
        Ok((Box::new(file), size))
    }
}

pub async fn extract_dump(mut config: Config, args: ExtractArgs) -> Result<ExitCode> {
    args.apply(&mut config);
    config.validate()?;

    let (reader, total) = open_input(&args.input)?;

    let mut writer: Box<dyn PageWriter + Send> = match args.output_dir {
        Some(ref dir) => Box::new(
            DirectoryWriter::create(dir)
                .with_context(|| format!("Failed to create output directory '{}'", dir.display()))?,
        ),
        None => Box::new(StreamWriter::new(io::stdout())),
    };

    let interrupt = Interrupt::new();
    let watcher = {
        let interrupt = interrupt.clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                warn!("Received Ctrl+C, stopping after the current block");
                interrupt.trigger();
            }
        })
    };

    let coordinator = CorpusCoordinatorBuilder::new()
        .with_extract_config(config.extract.clone())
        .with_convert_config(config.convert.clone())
        .with_interrupt(interrupt)
        .with_quiet(args.quiet)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create corpus coordinator: {}", e))?;

    info!("Extracting pages from {}", args.input);
    let stats = tokio::task::spawn_blocking(move || coordinator.run(reader, total, &mut *writer))
        .await
        .context("Extraction task failed")?
        .map_err(|e| anyhow::anyhow!("Extraction failed: {}", e))?;
    watcher.abort();

    if let Some(ref path) = args.stats_json {
        let json = serde_json::to_string_pretty(&stats)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write statistics to '{}'", path.display()))?;
    }

    if !args.quiet {
        print_summary(&stats);
    }

    if stats.extract.interrupted {
        eprintln!("Interrupted: {} pages written", stats.pages_written);
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

// Stdout may carry the page stream, so the summary goes to stderr
fn print_summary(stats: &CorpusStats) {
    eprintln!("\nExtraction Complete!");
    eprintln!("====================");
    eprintln!("Pages seen:          {}", stats.extract.pages_seen);
    eprintln!("Pages written:       {}", stats.pages_written);
    eprintln!("Namespace skipped:   {}", stats.extract.skipped_namespace);
    eprintln!("Redirects skipped:   {}", stats.extract.skipped_redirect);
    eprintln!("Incomplete pages:    {}", stats.extract.incomplete);
    eprintln!("Markup errors:       {}", stats.markup_errors);
    eprintln!("Tag mismatches:      {}", stats.extract.tag_mismatches);
    eprintln!("Bytes read:          {}", format_bytes(stats.extract.bytes_read));
    eprintln!("Processing rate:     {:.1} pages/s", stats.pages_per_second);
    eprintln!("Elapsed time:        {:.1}s", stats.elapsed_seconds);
}
