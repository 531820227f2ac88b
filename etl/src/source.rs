//! Reading the raw sources.
//!
//! A source is a directory of JSON-lines files, all exactly `depth` levels below it:
//!
//! ```text
//! <input_root>/song_data/A/B/C/TRABCEI128F424C983.json   (depth 4)
//! <input_root>/log_data/2018/11/2018-11-12-events.json   (depth 3)
//! ```
//!
//! Lines that aren't a valid record are skipped and counted, including lines that aren't
//! valid UTF-8. Anything that keeps a file from being read at all fails the whole source.

use std::path::{Path, PathBuf};

use log::{debug, info, trace};
use playlake_core::config::SourceSettings;
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use tracing::instrument;
use walkdir::WalkDir;

use crate::{context::ExecutionContext, errors::SourceError, report::SourceStats};

/// The records read from a source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceBatch<T> {
    /// In file order, then line order.
    pub records: Vec<T>,
    pub stats: SourceStats,
}

/// Find the files of the source described by `settings`, sorted by path.
///
/// # Errors
///
/// Fails if the source directory doesn't exist or can't be walked.
pub fn discover(input_root: &Path, settings: &SourceSettings) -> Result<Vec<PathBuf>, SourceError> {
    let root = input_root.join(&settings.dir);
    if !root.is_dir() {
        return Err(SourceError::Missing { path: root });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&root)
        .min_depth(settings.depth)
        .max_depth(settings.depth)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| SourceError::Walk {
            path: root.clone(),
            source,
        })?;
        if entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .is_some_and(|ext| ext == settings.extension.as_str())
        {
            files.push(entry.into_path());
        }
    }

    debug!("found {} files in {}", files.len(), root.display());
    Ok(files)
}

/// Parse JSON-lines `bytes`, returning the records and the number of lines that weren't one.
///
/// Each line is decoded on its own, so a line that isn't valid UTF-8 is skipped like any
/// other malformed line. Blank lines are neither records nor skipped.
pub fn parse_lines<T: DeserializeOwned>(path: &Path, bytes: &[u8]) -> (Vec<T>, usize) {
    let mut records = Vec::new();
    let mut skipped = 0;

    for (number, line) in bytes.split(|&b| b == b'\n').enumerate() {
        let line = line.trim_ascii();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_slice(line) {
            Ok(record) => records.push(record),
            Err(e) => {
                trace!("skipping {}:{}: {e}", path.display(), number + 1);
                skipped += 1;
            }
        }
    }

    (records, skipped)
}

fn read_file<T: DeserializeOwned>(path: &Path) -> Result<(Vec<T>, usize), SourceError> {
    let bytes = std::fs::read(path).map_err(|source| SourceError::Read {
        path: path.to_owned(),
        source,
    })?;
    Ok(parse_lines(path, &bytes))
}

/// Read every record of the source described by `settings`, parsing files in parallel.
///
/// # Errors
///
/// Fails if the source directory doesn't exist, or if any of its files can't be read.
#[instrument(skip(ctx, settings), fields(source = %settings.dir))]
pub fn read_source<T>(
    ctx: &ExecutionContext,
    input_root: &Path,
    settings: &SourceSettings,
) -> Result<SourceBatch<T>, SourceError>
where
    T: DeserializeOwned + Send,
{
    let files = discover(input_root, settings)?;

    let parsed = ctx.install(|| {
        files
            .par_iter()
            .map(|path| read_file::<T>(path))
            .collect::<Result<Vec<_>, _>>()
    })?;

    let mut batch = SourceBatch {
        records: Vec::new(),
        stats: SourceStats {
            files: files.len(),
            ..SourceStats::default()
        },
    };
    for (records, skipped) in parsed {
        batch.stats.records += records.len();
        batch.stats.skipped += skipped;
        batch.records.extend(records);
    }

    info!(
        "read {} records from {} files in {} ({} malformed lines skipped)",
        batch.stats.records,
        batch.stats.files,
        settings.dir,
        batch.stats.skipped
    );
    Ok(batch)
}
