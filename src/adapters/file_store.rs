//! File-backed recipe and brewing log store.
//!
//! Implements [`RecipeStore`] and [`LogStore`] on two directories.
//!
//! ## File layout
//!
//! | Entity | File name                                   |
//! |--------|---------------------------------------------|
//! | Recipe | `<id>.recipe`, then `<id>(0).recipe`, ...   |
//! | Log    | `<id>_<%Y%m%d-%H%M%S>.brewlog`, then `(1)`  |
//!
//! Every file holds two lines: the summary as JSON, then the full entity
//! as JSON.  Listings only decode the first line.
//!
//! ## Guarantees
//!
//! - Saving never overwrites.  Files are created with `create_new`, and a
//!   taken name moves on to the smallest free `(n)` suffix, so concurrent
//!   saves of identical content land in distinct files.  Recipe suffixes
//!   count from 0, log suffixes from 1.
//! - Log ids start at 1: the next id is one past the largest stored id.
//! - The log summary cache carries a generation.  A listing only caches
//!   what it read if no save or delete happened while it was reading.
//! - A file whose content could not be written is removed again.
//! - Broken files are skipped (with a warning) when listing and reported
//!   as `ParseFailure` on direct lookup.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::app::ports::{LogStore, RecipeStore};
use crate::config::SystemConfig;
use crate::error::{Error, Result};
use crate::model::{BrewingLog, LogSummary, Recipe, RecipeSummary};

pub const RECIPE_EXT: &str = "recipe";
pub const LOG_EXT: &str = "brewlog";
const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";
/// Upper bound on `(n)` suffixes tried for one name.
const MAX_NAME_SUFFIX: u32 = 10_000;

// ───────────────────────────────────────────────────────────────
// Encoding
// ───────────────────────────────────────────────────────────────

fn encode<H: Serialize, E: Serialize>(header: &H, entity: &E) -> Result<String> {
    let header =
        serde_json::to_string(header).map_err(|e| Error::SavingFailure(e.to_string()))?;
    let entity =
        serde_json::to_string(entity).map_err(|e| Error::SavingFailure(e.to_string()))?;
    Ok(format!("{header}\n{entity}\n"))
}

/// Decode the summary line of a stored file.
pub fn decode_header<H: DeserializeOwned>(raw: &str) -> Result<H> {
    let line = raw
        .lines()
        .next()
        .ok_or_else(|| Error::ParseFailure("empty file".to_string()))?;
    serde_json::from_str(line).map_err(|e| Error::ParseFailure(e.to_string()))
}

/// Decode the entity line of a stored file.
pub fn decode_entity<E: DeserializeOwned>(raw: &str) -> Result<E> {
    let line = raw
        .lines()
        .nth(1)
        .ok_or_else(|| Error::ParseFailure("entity line missing".to_string()))?;
    serde_json::from_str(line).map_err(|e| Error::ParseFailure(e.to_string()))
}

// ───────────────────────────────────────────────────────────────
// File helpers
// ───────────────────────────────────────────────────────────────

/// Create `<stem>.<ext>` or the first free `<stem>(n).<ext>` with
/// `n >= first_suffix`.  Returns the file, its path and the stem used.
fn create_unique(
    dir: &Path,
    stem: &str,
    ext: &str,
    first_suffix: u32,
) -> io::Result<(File, PathBuf, String)> {
    let suffixes = (first_suffix..MAX_NAME_SUFFIX).map(Some);
    for n in std::iter::once(None).chain(suffixes) {
        let name = match n {
            None => stem.to_string(),
            Some(n) => format!("{stem}({n})"),
        };
        let path = dir.join(format!("{name}.{ext}"));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((file, path, name)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free name for '{stem}'"),
    ))
}

fn write_or_remove(mut file: File, path: &Path, content: &str) -> Result<()> {
    let written = file
        .write_all(content.as_bytes())
        .and_then(|()| file.sync_all());
    if let Err(e) = written {
        drop(file);
        let _ = std::fs::remove_file(path);
        return Err(Error::SavingFailure(format!("{}: {}", path.display(), e)));
    }
    Ok(())
}

/// `(path, stem)` of every file in `dir` with extension `ext`, sorted by name.
fn list_files(dir: &Path, ext: &str) -> Result<Vec<(PathBuf, String)>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::ParseFailure(format!("{}: {}", dir.display(), e))),
    };
    let mut files: Vec<(PathBuf, String)> = entries
        .filter_map(core::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|x| x == ext))
        .filter_map(|path| {
            let stem = path.file_stem()?.to_str()?.to_string();
            Some((path, stem))
        })
        .collect();
    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

fn read_file(path: &Path, what: &str) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::NotFound(what.to_string()),
        _ => Error::ParseFailure(format!("{}: {}", path.display(), e)),
    })
}

fn remove_file(path: &Path, what: &str) -> Result<()> {
    std::fs::remove_file(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::NotFound(what.to_string()),
        _ => Error::SavingFailure(format!("{}: {}", path.display(), e)),
    })
}

/// Recipe ids become file names: path separators are not allowed in them.
fn sanitize_id(id: &str) -> String {
    id.trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect()
}

fn log_id_of(stem: &str) -> Option<i64> {
    stem.split_once('_')?.0.parse().ok()
}

// ───────────────────────────────────────────────────────────────
// FileStore
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct SummaryCache {
    /// Bumped by every log save and delete.
    generation: u64,
    summaries: Option<Vec<LogSummary>>,
}

pub struct FileStore {
    recipe_dir: PathBuf,
    log_dir: PathBuf,
    log_summaries: Mutex<SummaryCache>,
}

impl FileStore {
    /// Open (and create if needed) the two store directories.
    pub fn open(recipe_dir: impl Into<PathBuf>, log_dir: impl Into<PathBuf>) -> Result<Self> {
        let recipe_dir = recipe_dir.into();
        let log_dir = log_dir.into();
        for dir in [&recipe_dir, &log_dir] {
            std::fs::create_dir_all(dir).map_err(|e| {
                warn!("FileStore: cannot create {}: {}", dir.display(), e);
                Error::Init("storage directory could not be created")
            })?;
        }
        info!(
            "FileStore: recipes in {}, logs in {}",
            recipe_dir.display(),
            log_dir.display()
        );
        Ok(Self {
            recipe_dir,
            log_dir,
            log_summaries: Mutex::new(SummaryCache::default()),
        })
    }

    pub fn from_config(config: &SystemConfig) -> Result<Self> {
        Self::open(config.recipe_dir(), config.log_dir())
    }

    pub fn recipe_dir(&self) -> &Path {
        &self.recipe_dir
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    fn summary_cache(&self) -> MutexGuard<'_, SummaryCache> {
        self.log_summaries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn invalidate_summaries(&self) {
        let mut cache = self.summary_cache();
        cache.generation += 1;
        cache.summaries = None;
    }

    /// Keep `summaries` read at generation `seen`, unless the logs changed
    /// since.  Returns whether they were kept.
    fn cache_summaries(&self, seen: u64, summaries: &[LogSummary]) -> bool {
        let mut cache = self.summary_cache();
        if cache.generation != seen {
            debug!("FileStore: log listing went stale while reading, not cached");
            return false;
        }
        cache.summaries = Some(summaries.to_vec());
        true
    }

    fn scan_log_summaries(&self) -> Result<Vec<LogSummary>> {
        let mut summaries = Vec::new();
        for (path, _) in list_files(&self.log_dir, LOG_EXT)? {
            let decoded = std::fs::read_to_string(&path)
                .map_err(|e| Error::ParseFailure(e.to_string()))
                .and_then(|raw| decode_header::<LogSummary>(&raw));
            match decoded {
                Ok(summary) => summaries.push(summary),
                Err(e) => warn!("FileStore: skipping {}: {}", path.display(), e),
            }
        }
        summaries.sort_by_key(|s| s.id);
        Ok(summaries)
    }

    fn recipe_path(&self, id: &str) -> Option<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) {
            return None;
        }
        Some(self.recipe_dir.join(format!("{id}.{RECIPE_EXT}")))
    }

    fn log_files_for(&self, id: i64) -> Result<Vec<PathBuf>> {
        if id < 0 {
            return Ok(Vec::new());
        }
        Ok(list_files(&self.log_dir, LOG_EXT)?
            .into_iter()
            .filter(|(_, stem)| log_id_of(stem) == Some(id))
            .map(|(path, _)| path)
            .collect())
    }
}

impl RecipeStore for FileStore {
    fn save_recipe(&self, recipe: &Recipe) -> Result<String> {
        let mut stem = sanitize_id(&recipe.id);
        if stem.is_empty() {
            stem = Utc::now().format(TIMESTAMP_FORMAT).to_string();
        }
        let (file, path, id) = create_unique(&self.recipe_dir, &stem, RECIPE_EXT, 0)
            .map_err(|e| Error::SavingFailure(e.to_string()))?;

        let mut stored = recipe.clone();
        stored.id.clone_from(&id);
        let content = match encode(&stored.summary(), &stored) {
            Ok(content) => content,
            Err(e) => {
                drop(file);
                let _ = std::fs::remove_file(&path);
                return Err(e);
            }
        };
        write_or_remove(file, &path, &content)?;

        if id != recipe.id {
            info!("FileStore: recipe '{}' stored as '{}'", recipe.id, id);
        } else {
            info!("FileStore: recipe '{}' stored", id);
        }
        Ok(id)
    }

    fn get_recipe(&self, id: &str) -> Result<Recipe> {
        let what = format!("recipe '{id}'");
        let path = self
            .recipe_path(id)
            .ok_or_else(|| Error::NotFound(what.clone()))?;
        let raw = read_file(&path, &what)?;
        let mut recipe: Recipe = decode_entity(&raw)?;
        recipe.id = id.to_string();
        Ok(recipe)
    }

    fn recipe_summaries(&self) -> Result<Vec<RecipeSummary>> {
        let mut summaries = Vec::new();
        for (path, stem) in list_files(&self.recipe_dir, RECIPE_EXT)? {
            let decoded = std::fs::read_to_string(&path)
                .map_err(|e| Error::ParseFailure(e.to_string()))
                .and_then(|raw| decode_header::<RecipeSummary>(&raw));
            match decoded {
                Ok(mut summary) => {
                    summary.id = stem;
                    summaries.push(summary);
                }
                Err(e) => warn!("FileStore: skipping {}: {}", path.display(), e),
            }
        }
        Ok(summaries)
    }

    fn delete_recipe(&self, id: &str) -> Result<()> {
        let what = format!("recipe '{id}'");
        let path = self
            .recipe_path(id)
            .ok_or_else(|| Error::NotFound(what.clone()))?;
        remove_file(&path, &what)?;
        info!("FileStore: recipe '{}' deleted", id);
        Ok(())
    }
}

impl LogStore for FileStore {
    fn save_log(&self, log: &BrewingLog) -> Result<PathBuf> {
        let stem = format!("{}_{}", log.id(), Utc::now().format(TIMESTAMP_FORMAT));
        let content = encode(&log.summary(), log)?;
        let (file, path, _) = create_unique(&self.log_dir, &stem, LOG_EXT, 1)
            .map_err(|e| Error::SavingFailure(e.to_string()))?;
        write_or_remove(file, &path, &content)?;

        self.invalidate_summaries();
        info!("FileStore: log {} saved to {}", log.id(), path.display());
        Ok(path)
    }

    fn get_log_by_id(&self, id: i64) -> Result<BrewingLog> {
        let what = format!("brewing log {id}");
        let path = self
            .log_files_for(id)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(what.clone()))?;
        decode_entity(&read_file(&path, &what)?)
    }

    fn get_logs(&self) -> Result<Vec<BrewingLog>> {
        let mut logs = Vec::new();
        for (path, _) in list_files(&self.log_dir, LOG_EXT)? {
            let decoded = std::fs::read_to_string(&path)
                .map_err(|e| Error::ParseFailure(e.to_string()))
                .and_then(|raw| decode_entity::<BrewingLog>(&raw));
            match decoded {
                Ok(log) => logs.push(log),
                Err(e) => warn!("FileStore: skipping {}: {}", path.display(), e),
            }
        }
        logs.sort_by_key(BrewingLog::id);
        Ok(logs)
    }

    fn log_summaries(&self) -> Result<Vec<LogSummary>> {
        let seen = {
            let cache = self.summary_cache();
            if let Some(cached) = cache.summaries.as_ref() {
                debug!("FileStore: log summaries from cache");
                return Ok(cached.clone());
            }
            cache.generation
        };

        let summaries = self.scan_log_summaries()?;
        self.cache_summaries(seen, &summaries);
        Ok(summaries)
    }

    fn next_log_id(&self) -> Result<i64> {
        let max = list_files(&self.log_dir, LOG_EXT)?
            .iter()
            .filter_map(|(_, stem)| log_id_of(stem))
            .max();
        Ok(max.map_or(0, |id| id.max(0)) + 1)
    }

    fn delete_log(&self, id: i64) -> Result<()> {
        let what = format!("brewing log {id}");
        let files = self.log_files_for(id)?;
        if files.is_empty() {
            return Err(Error::NotFound(what));
        }
        for path in &files {
            remove_file(path, &what)?;
        }
        self.invalidate_summaries();
        info!("FileStore: log {} deleted ({} file(s))", id, files.len());
        Ok(())
    }
}
