use std::io::Write;

use anyhow::bail;
use passforge_core::{
    history::{feed::HistoryFeed, HistoryStore},
    pwd::PasswordGenerator,
    CharacterClasses, HistoryRecord, MAX_LENGTH,
};
use tracing::{debug, info, instrument, warn};

// Functions

/// Generates one password, prints it and then records it.
///
/// The process exits right after, so the append is awaited here instead of
/// being detached. Its failure is only logged.
#[instrument(skip(classes, generator, feed, out))]
pub async fn generate<GENERATOR: PasswordGenerator, STORE: HistoryStore, OUT: Write>(
    length: usize,
    classes: CharacterClasses,
    generator: &GENERATOR,
    feed: &HistoryFeed<STORE>,
    out: &mut OUT,
) -> anyhow::Result<()> {
    if length > MAX_LENGTH {
        bail!("length must be at most {MAX_LENGTH}");
    }
    let password = generator.generate(length, classes);
    writeln!(out, "{password}")?;
    info!("password generated");
    let record = HistoryRecord::generated(password);
    if let Err(err) = feed.append(&record).await {
        warn!("failed to record password: {err}");
    }
    Ok(())
}

#[instrument(skip(feed, out))]
pub async fn print_history<STORE: HistoryStore, OUT: Write>(
    limit: usize,
    feed: &HistoryFeed<STORE>,
    out: &mut OUT,
) -> anyhow::Result<()> {
    debug!("printing history");
    let records = feed.recent(limit).await;
    if records.is_empty() {
        writeln!(out, "no records")?;
    }
    for record in records {
        writeln!(out, "{} {}", record.created_at.to_rfc3339(), record.password)?;
    }
    Ok(())
}

// Tests
