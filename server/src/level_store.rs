//! Read-only access to level files on disk.
//!
//! Lookups are lenient: a requested filename is reduced to a safe base name,
//! matched exactly first and then ignoring spaces, and any failure falls back
//! to the built-in level so room creation never fails on a bad file.

use crate::level::{compile, default_level, RawLevel};
use crate::world::World;
use log::{debug, warn};
use shared::LevelSummary;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_LEVEL_FILE: &str = "forest-1-1.json";
pub const DEFAULT_LEVEL_DIRECTORIES: [&str; 2] = ["public/levels", "levels"];

#[derive(Debug, Clone)]
pub struct LevelStore {
    directories: Vec<PathBuf>,
    default_file: String,
}

impl Default for LevelStore {
    fn default() -> Self {
        Self::new(
            DEFAULT_LEVEL_DIRECTORIES.iter().map(PathBuf::from).collect(),
            DEFAULT_LEVEL_FILE,
        )
    }
}

/// Keeps only the base name and the characters `[A-Za-z0-9_-. ]`.
pub fn sanitize_file_name(requested: &str, default_file: &str) -> String {
    let trimmed = requested.trim();
    let base = Path::new(trimmed)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("");
    let safe: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ' '))
        .collect();
    if safe.is_empty() {
        default_file.to_string()
    } else {
        safe
    }
}

fn compact(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        .collect()
}

fn json_files(directory: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(directory) else {
        return Vec::new();
    };
    let mut files: Vec<String> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.ends_with(".json"))
        .collect();
    files.sort();
    files
}

impl LevelStore {
    pub fn new(directories: Vec<PathBuf>, default_file: &str) -> Self {
        Self {
            directories,
            default_file: default_file.to_string(),
        }
    }

    pub fn default_file(&self) -> &str {
        &self.default_file
    }

    fn existing_directories(&self) -> impl Iterator<Item = &PathBuf> {
        self.directories.iter().filter(|directory| directory.is_dir())
    }

    /// Finds the file a client most likely meant by `requested`.
    pub fn resolve_path(&self, requested: Option<&str>) -> Option<PathBuf> {
        let safe_name = sanitize_file_name(requested.unwrap_or(""), &self.default_file);

        if let Some(exact) = self
            .existing_directories()
            .map(|directory| directory.join(&safe_name))
            .find(|path| path.is_file())
        {
            return Some(exact);
        }

        let wanted = compact(&safe_name);
        self.existing_directories().find_map(|directory| {
            json_files(directory)
                .into_iter()
                .find(|file| compact(file) == wanted)
                .map(|file| directory.join(file))
        })
    }

    fn read_level(path: &Path) -> Result<RawLevel, Box<dyn std::error::Error>> {
        let text = fs::read_to_string(path)?;
        Ok(RawLevel::from_json_str(&text)?)
    }

    /// Compiles the requested level, or the built-in one if it cannot be read.
    pub fn load_world(&self, requested: Option<&str>) -> World {
        let Some(path) = self.resolve_path(requested) else {
            warn!(
                "Level {:?} not found, using the built-in level",
                requested.unwrap_or(self.default_file.as_str())
            );
            return compile(&default_level());
        };

        match Self::read_level(&path) {
            Ok(level) => {
                debug!("Loaded level from {}", path.display());
                compile(&level)
            }
            Err(e) => {
                warn!(
                    "Failed to load level {}: {}. Using the built-in level",
                    path.display(),
                    e
                );
                compile(&default_level())
            }
        }
    }

    fn summarize(file: &str, path: &Path) -> LevelSummary {
        let fallback_name = file.trim_end_matches(".json").to_string();
        match Self::read_level(path) {
            Ok(level) => {
                let rows = level.tiles.as_array().map(Vec::len).unwrap_or(0);
                let cols = level
                    .tiles
                    .get(0)
                    .and_then(|row| row.as_str())
                    .map(|row| row.chars().count())
                    .unwrap_or(0);
                let name = level
                    .name
                    .as_str()
                    .map(|name| name.trim().to_string())
                    .unwrap_or(fallback_name);
                LevelSummary {
                    file: file.to_string(),
                    name,
                    rows,
                    cols,
                }
            }
            Err(_) => LevelSummary {
                file: file.to_string(),
                name: fallback_name,
                rows: 0,
                cols: 0,
            },
        }
    }

    /// Every distinct `.json` level, sorted by file name. The first directory
    /// wins when the same file exists in several.
    pub fn list_levels(&self) -> Vec<LevelSummary> {
        let mut by_file: BTreeMap<String, PathBuf> = BTreeMap::new();
        for directory in self.existing_directories() {
            for file in json_files(directory) {
                by_file
                    .entry(file.clone())
                    .or_insert_with(|| directory.join(&file));
            }
        }

        by_file
            .iter()
            .map(|(file, path)| Self::summarize(file, path))
            .collect()
    }
}
