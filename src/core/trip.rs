//! Trip directory handling: one bounded acquisition session with its own
//! output directory and persisted configuration snapshot.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::core::config::TripOptions;
use crate::error::{Result, TriplogError};

pub const TRIP_OPTIONS_FILE: &str = "trip_options.json";

/// Trip directories are named after their creation time (UTC).
const TRIP_DIR_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Collision retries when two trips start within the same second.
const MAX_CREATE_RETRIES: usize = 999;

/// One recording session: an output directory plus the read-only
/// configuration snapshot the recorder works from.
#[derive(Debug)]
pub struct Trip {
    directory: PathBuf,
    options: TripOptions,
    remove_on_exit: bool,
}

impl Trip {
    /// Create a fresh, timestamped trip directory under `parent` and persist
    /// the options snapshot into it.
    pub fn create(parent: &Path, options: TripOptions) -> Result<Self> {
        fs::create_dir_all(parent)?;

        let base_name = chrono::Utc::now().format(TRIP_DIR_FORMAT).to_string();
        for attempt in 0..=MAX_CREATE_RETRIES {
            let name = if attempt == 0 {
                base_name.clone()
            } else {
                format!("{}_{}", base_name, attempt)
            };
            let directory = parent.join(&name);
            match fs::create_dir(&directory) {
                Ok(()) => {
                    let json = serde_json::to_string_pretty(&options)?;
                    fs::write(directory.join(TRIP_OPTIONS_FILE), json)?;
                    log::info!("Trip directory created: {}", directory.display());
                    return Ok(Self {
                        directory,
                        options,
                        remove_on_exit: false,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(TriplogError::trip("unable to create trip directory"))
    }

    /// Open an existing trip directory and read its options snapshot back.
    pub fn open(directory: &Path) -> Result<Self> {
        let raw = fs::read_to_string(directory.join(TRIP_OPTIONS_FILE))?;
        let options = serde_json::from_str(&raw)?;
        log::debug!("Trip directory opened: {}", directory.display());
        Ok(Self {
            directory: directory.to_path_buf(),
            options,
            remove_on_exit: false,
        })
    }

    /// Remove the trip directory when this value is dropped (test drives,
    /// dry runs).
    pub fn temporary(mut self, remove_on_exit: bool) -> Self {
        self.remove_on_exit = remove_on_exit;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn options(&self) -> &TripOptions {
        &self.options
    }

    /// Whether `name` has the shape of a trip directory name.
    pub fn is_trip_name(name: &str) -> bool {
        NaiveDateTime::parse_from_str(name, TRIP_DIR_FORMAT).is_ok()
    }

    /// List trip directories directly under `parent`, sorted by name (which
    /// sorts by creation time).
    pub fn list(parent: &Path) -> Result<Vec<PathBuf>> {
        if !parent.is_dir() {
            return Err(TriplogError::trip(format!(
                "{} is not a directory",
                parent.display()
            )));
        }
        let mut trips: Vec<PathBuf> = fs::read_dir(parent)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_dir()
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(Self::is_trip_name)
            })
            .collect();
        trips.sort();
        Ok(trips)
    }
}

impl Drop for Trip {
    fn drop(&mut self) {
        if self.remove_on_exit {
            log::info!("Cleaning up trip directory: {}", self.directory.display());
            if let Err(e) = fs::remove_dir_all(&self.directory) {
                log::error!(
                    "Failed to remove trip directory {}: {}",
                    self.directory.display(),
                    e
                );
            }
        }
    }
}
