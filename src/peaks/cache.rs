use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::UNIX_EPOCH;

use tracing::{debug, warn};

use crate::decode::decode_file;
use crate::error::PeakError;

use super::format::{self, CACHE_EXTENSION};
use super::{build_levels, PeakFile};

/// Identity of a source file as recorded in its cache file.
///
/// A cache file is only used if all three fields still match the source.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SourceInfo {
    /// File name without directory
    pub name: String,
    /// Size in bytes
    pub length: u64,
    /// Modification time, nanoseconds since the Unix epoch
    pub modified: i64,
}

impl SourceInfo {
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let meta = fs::metadata(path)?;
        let modified = match meta.modified()?.duration_since(UNIX_EPOCH) {
            Ok(after) => after.as_nanos() as i64,
            Err(before) => -(before.duration().as_nanos() as i64),
        };
        Ok(Self {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            length: meta.len(),
            modified,
        })
    }
}

/// Where cache files go.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PeakCacheConfig {
    /// Directory for cache files; `None` puts each next to its source
    pub cache_dir: Option<PathBuf>,
}

impl PeakCacheConfig {
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }
}

/// Generates peak pyramids and keeps them on disk.
#[derive(Clone, Debug, Default)]
pub struct PeakCache {
    config: PeakCacheConfig,
}

impl PeakCache {
    pub fn new(config: PeakCacheConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PeakCacheConfig {
        &self.config
    }

    /// Cache file path for `source`: `<name>.<ext>` in the cache directory
    /// or beside the source.
    pub fn cache_path(&self, source: &Path) -> PathBuf {
        let mut name = source.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".");
        name.push(CACHE_EXTENSION);
        match &self.config.cache_dir {
            Some(dir) => dir.join(name),
            None => source.with_file_name(name),
        }
    }

    /// Load the cached pyramid for `source` if there is a valid one,
    /// otherwise generate it and try to persist it.
    ///
    /// Any problem with the cache file only causes regeneration. Failing to
    /// write the new cache file is logged; the pyramid is still returned.
    pub fn generate_or_load(&self, source: impl AsRef<Path>) -> Result<PeakFile, PeakError> {
        let source = source.as_ref();
        let info = SourceInfo::from_path(source)?;
        let cache_path = self.cache_path(source);

        match self.load(&cache_path, &info) {
            Ok(file) => {
                debug!(path = %cache_path.display(), "peak cache hit");
                return Ok(file);
            }
            Err(PeakError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %cache_path.display(), "no peak cache");
            }
            Err(e) => debug!(path = %cache_path.display(), error = %e, "peak cache invalid, regenerating"),
        }

        let file = Self::generate(source, info)?;
        if let Err(e) = self.store(&cache_path, &file) {
            warn!(path = %cache_path.display(), error = %e, "failed to write peak cache");
        }
        Ok(file)
    }

    /// Read a cache file, checking it was written for `info`.
    pub fn load(&self, cache_path: &Path, info: &SourceInfo) -> Result<PeakFile, PeakError> {
        let bytes = fs::read(cache_path)?;
        let (stored, _) = format::decode_header(&bytes)?;
        if &stored != info {
            return Err(PeakError::Stale);
        }
        format::decode(&bytes)
    }

    /// Decode `source` and build its pyramid, without touching the cache.
    pub fn generate(source: &Path, info: SourceInfo) -> Result<PeakFile, PeakError> {
        let audio = decode_file(source)?;
        let levels = build_levels(&audio.samples, audio.format.channels);
        if levels.is_empty() {
            return Err(PeakError::EmptySource);
        }
        debug!(
            path = %source.display(),
            levels = levels.len(),
            "generated peak pyramid"
        );
        Ok(PeakFile {
            source: info,
            sample_rate: audio.format.sample_rate,
            total_frames: audio.frames() as u64,
            levels,
        })
    }

    /// Write `file` to `cache_path`, replacing any previous cache file.
    pub fn store(&self, cache_path: &Path, file: &PeakFile) -> Result<(), PeakError> {
        if let Some(dir) = cache_path.parent() {
            fs::create_dir_all(dir)?;
        }
        let bytes = format::encode(file)?;
        // write then rename so readers never see a half-written file
        let tmp = cache_path.with_extension(format!("{CACHE_EXTENSION}.tmp"));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, cache_path)?;
        Ok(())
    }
}

/// Run [`PeakCache::generate_or_load`] on a background thread.
pub fn spawn_generate(
    cache: PeakCache,
    source: impl Into<PathBuf>,
) -> Result<JoinHandle<Result<PeakFile, PeakError>>, PeakError> {
    let source = source.into();
    let handle = thread::Builder::new()
        .name("peak-generator".to_string())
        .spawn(move || cache.generate_or_load(&source))?;
    Ok(handle)
}
