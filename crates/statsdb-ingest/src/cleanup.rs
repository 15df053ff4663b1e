//! Moving ingested result files out of the input directory
//!
//! Files are renamed into `<directory>/trash/<YYYY-MM-DD>/`. Nothing is ever
//! deleted, and an existing file in the trash is never replaced.

use crate::error::Result;
use chrono::NaiveDate;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the trash directory inside the input directory.
pub const TRASH_DIR: &str = "trash";

/// Dated trash directory for `directory`.
pub fn trash_dir(directory: &Path, date: NaiveDate) -> PathBuf {
    directory
        .join(TRASH_DIR)
        .join(date.format("%Y-%m-%d").to_string())
}

/// Ask a yes/no question; anything but `y` or `yes` means no.
pub fn confirm<R: BufRead, W: Write>(prompt: &str, input: &mut R, output: &mut W) -> io::Result<bool> {
    write!(output, "{prompt} [y/N]: ")?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    let answer = answer.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

/// Result of a cleanup pass.
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub moved: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, io::Error)>,
}

/// Move each of `files` into `trash`, creating it if needed.
///
/// Per-file failures are collected, not returned; only failing to create
/// `trash` itself is an error.
pub fn move_to_trash(files: &[PathBuf], trash: &Path) -> Result<CleanupReport> {
    std::fs::create_dir_all(trash)?;

    let mut report = CleanupReport::default();
    for file in files {
        match move_one(file, trash) {
            Ok(target) => {
                debug!(from = %file.display(), to = %target.display(), "Moved to trash");
                report.moved.push(target);
            },
            Err(e) => {
                warn!(file = %file.display(), error = %e, "Could not move file to trash");
                report.failed.push((file.clone(), e));
            },
        }
    }

    Ok(report)
}

fn move_one(file: &Path, trash: &Path) -> io::Result<PathBuf> {
    let name = file.file_name().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "path has no file name")
    })?;
    let target = trash.join(name);

    if target.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", target.display()),
        ));
    }

    std::fs::rename(file, &target)?;
    Ok(target)
}
