use anyhow::{Context, Result};
use std::io::{self, BufRead, BufReader, Write};
use tracing::info;
use wikicorpus::{
    import::WikiTextConverter,
    output::{RecordReader, StreamWriter},
};

/// Convert a form-feed separated markup stream from stdin to plain text on stdout
pub async fn textify_stream() -> Result<()> {
    let (converted, failed) = textify_blocking(BufReader::new(io::stdin()), io::stdout()).await?;
    info!("Converted {} records, {} failed", converted, failed);
    Ok(())
}

/// Run [`textify`] on the blocking pool, reporting failures to stderr
async fn textify_blocking<R, W>(input: R, output: W) -> Result<(usize, usize)>
where
    R: BufRead + Send + 'static,
    W: Write + Send + 'static,
{
    tokio::task::spawn_blocking(move || textify(input, output, &mut io::stderr()))
        .await
        .context("Textify task failed")?
}

/// Convert every record of `input`, reporting failures to `errors`.
/// Returns the number of converted and failed records.
pub fn textify<R, W, E>(input: R, output: W, errors: &mut E) -> Result<(usize, usize)>
where
    R: BufRead,
    W: Write,
    E: Write,
{
    let converter = WikiTextConverter::new();
    let mut writer = StreamWriter::new(output);
    let mut converted = 0;
    let mut failed = 0;

    for record in RecordReader::new(input) {
        let markup = record.context("Failed to read input")?;
        match converter.convert(&markup) {
            Ok(text) => {
                writer.write_record(&text)?;
                converted += 1;
            }
            Err(e) => {
                writeln!(
                    errors,
                    "ERROR ({}:{}) {} at: {}",
                    e.line, e.column, e.kind, e.snippet
                )?;
                failed += 1;
            }
        }
    }

    writer.into_inner()?.flush()?;
    Ok((converted, failed))
}
