//! Recording discovery
//!
//! A recording is a `<name>.raw` payload plus an optional `<name>.inf` sidecar.
//! NextMind workspaces keep sessions under `recording/<n>/`, each holding
//! `eeg.raw` (and often `eeg_preprocessed.raw`) beside the `event`, `stim` and
//! `target_info` streams, which are not EEG.

use crate::error::{NextMindError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const RAW_EXTENSION: &str = "raw";
pub const INF_EXTENSION: &str = "inf";

/// Workspace subdirectory holding one folder per session
pub const SESSIONS_DIR: &str = "recording";
pub const EEG_STEM: &str = "eeg";
pub const PREPROCESSED_EEG_STEM: &str = "eeg_preprocessed";

/// What a `.raw` file carries, judged by its stem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Eeg,
    Event,
    Stim,
    TargetInfo,
}

impl StreamKind {
    pub fn from_stem(stem: &str) -> Self {
        match stem.to_ascii_lowercase().as_str() {
            "event" | "events" => StreamKind::Event,
            "stim" => StreamKind::Stim,
            "target_info" => StreamKind::TargetInfo,
            _ => StreamKind::Eeg,
        }
    }

    pub fn is_eeg(self) -> bool {
        self == StreamKind::Eeg
    }

    pub fn name(self) -> &'static str {
        match self {
            StreamKind::Eeg => "eeg",
            StreamKind::Event => "event",
            StreamKind::Stim => "stim",
            StreamKind::TargetInfo => "target_info",
        }
    }
}

/// A located `.raw` file and its `.inf` sidecar, if one exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordingRef {
    /// Directory plus file stem, e.g. `recording/0/eeg`
    pub base: PathBuf,
    pub raw_path: PathBuf,
    pub inf_path: Option<PathBuf>,
}

impl RecordingRef {
    /// Reference a `.raw` file, picking up a same-stem `.inf` beside it
    pub fn from_raw(raw_path: impl Into<PathBuf>) -> Self {
        let raw_path = raw_path.into();
        let inf_path = find_sidecar(&raw_path);
        Self {
            base: raw_path.with_extension(""),
            raw_path,
            inf_path,
        }
    }

    /// Reference an explicit pair; `inf_path` is used as given
    pub fn from_pair(raw_path: impl Into<PathBuf>, inf_path: Option<PathBuf>) -> Self {
        let raw_path = raw_path.into();
        Self {
            base: raw_path.with_extension(""),
            raw_path,
            inf_path,
        }
    }

    pub fn name(&self) -> String {
        self.base
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "recording".to_string())
    }

    pub fn stream_kind(&self) -> StreamKind {
        StreamKind::from_stem(&self.name())
    }
}

fn stem_is(path: &Path, stem: &str) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.eq_ignore_ascii_case(stem))
        .unwrap_or(false)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

/// Same-stem `.inf`; preprocessed EEG falls back to the session's `eeg.inf`
fn find_sidecar(raw_path: &Path) -> Option<PathBuf> {
    let same_stem = [INF_EXTENSION, "INF", "Inf"]
        .iter()
        .map(|ext| raw_path.with_extension(ext))
        .find(|p| p.is_file());
    if same_stem.is_some() || !stem_is(raw_path, PREPROCESSED_EEG_STEM) {
        return same_stem;
    }
    let eeg_inf = raw_path.with_file_name(format!("{}.{}", EEG_STEM, INF_EXTENSION));
    eeg_inf.is_file().then_some(eeg_inf)
}

#[derive(Debug, Clone, Copy)]
pub struct DiscoverOptions {
    pub recursive: bool,
    /// Directory levels below the root to descend when recursive
    pub max_depth: usize,
    /// Keep `event`, `stim` and `target_info` streams found while scanning
    pub include_auxiliary: bool,
    /// Drop `eeg.raw` when the same folder has `eeg_preprocessed.raw`
    pub prefer_preprocessed: bool,
}

impl Default for DiscoverOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            max_depth: 6,
            include_auxiliary: false,
            prefer_preprocessed: true,
        }
    }
}

impl DiscoverOptions {
    pub fn recursive() -> Self {
        Self {
            recursive: true,
            ..Default::default()
        }
    }
}

/// The recordings found under a path, ordered by file name.
///
/// Holds only the sorted `.raw` paths. Each call to [`Discovery::iter`] starts
/// over and pairs sidecars as items are pulled.
#[derive(Debug, Clone)]
pub struct Discovery {
    raw_paths: Vec<PathBuf>,
}

impl Discovery {
    pub fn len(&self) -> usize {
        self.raw_paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw_paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = RecordingRef> + '_ {
        self.into_iter()
    }
}

fn to_ref(raw_path: &PathBuf) -> RecordingRef {
    RecordingRef::from_raw(raw_path.clone())
}

impl<'a> IntoIterator for &'a Discovery {
    type Item = RecordingRef;
    type IntoIter = std::iter::Map<std::slice::Iter<'a, PathBuf>, fn(&'a PathBuf) -> RecordingRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.raw_paths.iter().map(to_ref as fn(&'a PathBuf) -> RecordingRef)
    }
}

/// Session folders of a NextMind workspace (`<root>/recording/<n>/`), in session order.
///
/// Empty when `root` has no `recording` directory.
pub fn find_sessions(root: &Path) -> Result<Vec<PathBuf>> {
    let sessions_dir = root.join(SESSIONS_DIR);
    if !sessions_dir.is_dir() {
        return Ok(Vec::new());
    }
    let entries = std::fs::read_dir(&sessions_dir).map_err(|e| NextMindError::io(&sessions_dir, e))?;
    let mut sessions: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|p| p.is_dir())
        .filter(|p| !p.file_name().is_some_and(|n| n.to_string_lossy().starts_with('.')))
        .collect();
    // Numbered sessions sort numerically, anything else after them by name
    sessions.sort_by_key(|p| {
        let name = p.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        (name.parse::<u64>().unwrap_or(u64::MAX), name)
    });
    Ok(sessions)
}

/// Find recordings under `path`.
///
/// A `.raw` file path yields just that recording, whatever stream it holds. A
/// directory is scanned for `.raw` files (hidden entries skipped), descending
/// only when `options.recursive` is set, except that the session folders of a
/// NextMind workspace are always scanned. Non-EEG streams and raw EEG with a
/// preprocessed sibling are left out unless `options` asks for them.
pub fn discover(path: &Path, options: DiscoverOptions) -> Result<Discovery> {
    let mut raw_paths = Vec::new();

    if path.is_file() {
        if has_extension(path, RAW_EXTENSION) {
            raw_paths.push(path.to_path_buf());
        }
    } else if path.is_dir() {
        walk_dir(path, 0, options, &mut raw_paths)?;
        if !options.recursive {
            for session in find_sessions(path)? {
                walk_dir(&session, 0, options, &mut raw_paths)?;
            }
        }
        select_streams(&mut raw_paths, options);
    } else {
        return Err(NextMindError::NotFound {
            path: path.to_path_buf(),
            reason: "path does not exist".to_string(),
        });
    }

    if raw_paths.is_empty() {
        return Err(NextMindError::NotFound {
            path: path.to_path_buf(),
            reason: format!("no EEG .{} files", RAW_EXTENSION),
        });
    }

    raw_paths.sort();
    log::info!("Found {} recording(s) under {}", raw_paths.len(), path.display());

    Ok(Discovery { raw_paths })
}

fn select_streams(raw_paths: &mut Vec<PathBuf>, options: DiscoverOptions) {
    if !options.include_auxiliary {
        raw_paths.retain(|p| {
            let kind = StreamKind::from_stem(&p.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default());
            if !kind.is_eeg() {
                log::debug!("Skipping {} stream {}", kind.name(), p.display());
            }
            kind.is_eeg()
        });
    }

    if options.prefer_preprocessed {
        let preprocessed: Vec<PathBuf> = raw_paths
            .iter()
            .filter(|p| stem_is(p, PREPROCESSED_EEG_STEM))
            .filter_map(|p| p.parent().map(Path::to_path_buf))
            .collect();
        raw_paths.retain(|p| {
            let superseded = stem_is(p, EEG_STEM) && p.parent().is_some_and(|dir| preprocessed.iter().any(|d| d == dir));
            if superseded {
                log::info!("Using preprocessed EEG instead of {}", p.display());
            }
            !superseded
        });
    }
}

fn walk_dir(dir: &Path, depth: usize, options: DiscoverOptions, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| NextMindError::io(dir, e))?;

    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name();
        if name.to_string_lossy().starts_with('.') {
            continue;
        }

        if path.is_dir() {
            if options.recursive && depth < options.max_depth {
                // Unreadable subdirectories are skipped rather than failing the scan
                if let Err(e) = walk_dir(&path, depth + 1, options, out) {
                    log::warn!("Skipping {}: {}", path.display(), e);
                }
            }
        } else if path.is_file() && has_extension(&path, RAW_EXTENSION) {
            out.push(path);
        }
    }
    Ok(())
}
