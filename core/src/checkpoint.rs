//! Checkpoint persistence — simulated minutes to/from a one-line text file.
//!
//! The file holds a single decimal integer followed by a newline. Nothing
//! else of the clock is persisted: the open flag is rederived and the
//! shutdown request is cleared on load.

use crate::{clock::SimClock, error::CheckpointError, types::SimMinutes};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const DEFAULT_STATE_FILE: &str = "clock.state";

/// Write the clock's minute count to `path`.
///
/// The value is written to a sibling temp file, synced, then renamed over
/// `path`, so a crash mid-write leaves the previous checkpoint intact.
pub fn save(clock: &SimClock, path: &Path) -> Result<(), CheckpointError> {
    let io_err = |source: io::Error| CheckpointError::Io { path: path.to_path_buf(), source };

    let tmp_path = temp_path_for(path);
    let write = || -> io::Result<()> {
        let mut file = File::create(&tmp_path)?;
        writeln!(file, "{}", clock.sim_minutes())?;
        file.flush()?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    };

    if let Err(e) = write() {
        let _ = fs::remove_file(&tmp_path);
        return Err(io_err(e));
    }

    // Best-effort: persist the rename itself.
    if let Ok(dir) = File::open(parent_dir(path)) {
        let _ = dir.sync_all();
    }
    Ok(())
}

/// Directory holding `path`; `.` for a bare file name.
fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Restore `clock` from `path`. On error the clock is left untouched.
pub fn load(clock: &mut SimClock, path: &Path) -> Result<SimMinutes, CheckpointError> {
    let minutes = read(path)?;
    clock.restore(minutes);
    Ok(minutes)
}

/// Parse the minute count stored at `path`.
pub fn read(path: &Path) -> Result<SimMinutes, CheckpointError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(CheckpointError::NotFound { path: path.to_path_buf() });
        }
        Err(source) => return Err(CheckpointError::Io { path: path.to_path_buf(), source }),
    };
    parse_minutes(&content).ok_or_else(|| CheckpointError::Parse {
        path: path.to_path_buf(),
        content: content.chars().take(64).collect(),
    })
}

/// Exactly one unsigned integer, surrounded by optional whitespace.
fn parse_minutes(content: &str) -> Option<SimMinutes> {
    let mut tokens = content.split_ascii_whitespace();
    let minutes = tokens.next()?.parse().ok()?;
    match tokens.next() {
        Some(_) => None,
        None => Some(minutes),
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| DEFAULT_STATE_FILE.into());
    name.push(format!(".tmp.{}", uuid::Uuid::new_v4().simple()));
    path.with_file_name(name)
}

/// Checkpoint location bound to one supervisor run.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, clock: &SimClock) -> Result<(), CheckpointError> {
        save(clock, &self.path)
    }

    pub fn load(&self, clock: &mut SimClock) -> Result<SimMinutes, CheckpointError> {
        load(clock, &self.path)
    }
}

impl Default for CheckpointStore {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_surrounding_whitespace() {
        assert_eq!(parse_minutes("50\n"), Some(50));
        assert_eq!(parse_minutes("  7 \r\n"), Some(7));
        assert_eq!(parse_minutes("18446744073709551615"), Some(u64::MAX));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse_minutes(""), None);
        assert_eq!(parse_minutes("abc"), None);
        assert_eq!(parse_minutes("-5"), None);
        assert_eq!(parse_minutes("12 13"), None);
        assert_eq!(parse_minutes("12abc"), None);
    }

    #[test]
    fn bare_file_name_syncs_current_directory() {
        assert_eq!(parent_dir(Path::new("clock.state")), Path::new("."));
        assert_eq!(parent_dir(Path::new("dir/clock.state")), Path::new("dir"));
        assert_eq!(parent_dir(Path::new("/clock.state")), Path::new("/"));
    }

    #[test]
    fn temp_path_is_a_sibling() {
        let tmp = temp_path_for(Path::new("dir/clock.state"));
        assert_eq!(tmp.parent(), Some(Path::new("dir")));
        let name = tmp.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("clock.state.tmp."), "{name}");
    }
}
