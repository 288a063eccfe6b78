// Archiving and usage history
// Moves finished threads out of the working file, either into a shared
// history file or into a dated archive file of their own.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use color_eyre::{
    eyre::{eyre, Context},
    Result,
};
use tracing::debug;

use crate::blockquote::blockquote;
use crate::transcript::DELIMITER;

/// Highest sequence number handed out per day
pub const MAX_DAILY_ARCHIVES: u32 = 999;

/// Sequence number of an archive file name such as "2025-11-09-ai07.md"
fn sequence_number(file_name: &str) -> Option<u32> {
    let last = file_name.rsplit('-').next()?;
    let stem = last.split('.').next()?;
    stem.get(2..)?.parse().ok()
}

/// First free archive file name for `date`, or None once all slots are taken
pub fn next_archive_name(archive_dir: &Path, date: NaiveDate) -> Result<Option<String>> {
    let today = date.format("%Y-%m-%d").to_string();

    let mut used = HashSet::new();
    for entry in fs::read_dir(archive_dir)
        .with_context(|| format!("Failed to read directory: {}", archive_dir.display()))?
    {
        let file_name = entry?.file_name();
        let file_name = file_name.to_string_lossy();
        if !file_name.starts_with(&today) {
            continue;
        }
        match sequence_number(&file_name) {
            Some(number) => {
                used.insert(number);
            }
            None => debug!(file = %file_name, "ignoring unnumbered archive file"),
        }
    }

    Ok((1..=MAX_DAILY_ARCHIVES)
        .find(|number| !used.contains(number))
        .map(|number| format!("{}-ai{:02}.md", today, number)))
}

/// Add `content` to the start or end of the history file
fn write_history(history: &Path, content: &str, prepend: bool) -> Result<()> {
    if prepend {
        let existing = if history.exists() {
            fs::read_to_string(history)
                .with_context(|| format!("Failed to read {}", history.display()))?
        } else {
            String::new()
        };
        fs::write(history, format!("{}{}", content, existing))
            .with_context(|| format!("Failed to write {}", history.display()))?;
    } else {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(history)
            .with_context(|| format!("Failed to open {}", history.display()))?;
        file.write_all(content.as_bytes())?;
    }
    Ok(())
}

fn clear(transcript: &Path) -> Result<()> {
    fs::write(transcript, "")
        .with_context(|| format!("Failed to clear {}", transcript.display()))
}

/// Copy the whole transcript into the history file, then clear it
pub fn dump_to_history(transcript: &Path, history: &Path, prepend: bool) -> Result<PathBuf> {
    let content = fs::read_to_string(transcript)
        .with_context(|| format!("Failed to read {}", transcript.display()))?;
    write_history(history, &content, prepend)?;
    clear(transcript)?;

    debug!(from = %transcript.display(), to = %history.display(), prepend, "dumped thread to history");
    Ok(history.to_path_buf())
}

/// Copy the transcript into a new archive file for `date`, then clear it.
///
/// The transcript is left untouched if no archive slot is free.
pub fn dump_to_file(transcript: &Path, archive_dir: &Path, date: NaiveDate) -> Result<PathBuf> {
    let name = next_archive_name(archive_dir, date)?.ok_or_else(|| {
        eyre!(
            "All {} archive names for {} are taken in {}",
            MAX_DAILY_ARCHIVES,
            date,
            archive_dir.display()
        )
    })?;
    let target = archive_dir.join(name);

    fs::copy(transcript, &target).with_context(|| {
        format!(
            "Failed to copy {} to {}",
            transcript.display(),
            target.display()
        )
    })?;
    clear(transcript)?;

    debug!(from = %transcript.display(), to = %target.display(), "dumped thread to archive file");
    Ok(target)
}

/// Record a one-off question and its answer in the history file
pub fn record_exchange(history: &Path, question: &str, response: &str, prepend: bool) -> Result<()> {
    let entry = format!(
        "{}{}{}{}",
        blockquote(question),
        DELIMITER,
        response,
        DELIMITER
    );
    write_history(history, &entry, prepend)
}
