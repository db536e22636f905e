//! On-disk result cache, one JSON file per source activity file.
//!
//! The file for `activities/1234.fit` lives at `activities/cache/1234.json` and
//! holds the parsed activity data plus every metric computed so far. A missing
//! or undecodable file is a cold start, never an error for the caller.

use std::{
    fs,
    io::{self, BufReader, BufWriter, Write as _},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{errors::Result, metrics::MetricStore, records::ActivityData};

pub const CACHE_DIR: &str = "cache";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CacheFile {
    #[serde(default)]
    pub data: Option<ActivityData>,
    #[serde(default)]
    pub metrics: MetricStore,
}

#[derive(Serialize)]
struct CacheFileRef<'a> {
    data: Option<&'a ActivityData>,
    metrics: &'a MetricStore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultCache {
    path: PathBuf,
}

impl ResultCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Cache identity of a source file: same stem, in a `cache` directory
    /// next to it.
    pub fn for_source(source: &Path) -> Self {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dir = source.parent().unwrap_or_else(|| Path::new("."));
        Self::new(dir.join(CACHE_DIR).join(format!("{stem}.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the cache file. Missing and corrupt files both come back as `None`.
    pub fn load(&self) -> Option<CacheFile> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No cache at {}", self.path.display());
                return None;
            }
            Err(e) => {
                warn!("Failed to open cache {}: {e}", self.path.display());
                return None;
            }
        };

        match serde_json::from_reader::<_, CacheFile>(BufReader::new(file)) {
            Ok(cached) => {
                if let Some(Err(e)) = cached.data.as_ref().map(|d| d.records.check_lengths()) {
                    warn!("Ignoring corrupt cache {}: {e}", self.path.display());
                    return None;
                }
                debug!("Retrieving {} from cache", self.path.display());
                Some(cached)
            }
            Err(e) => {
                warn!("Ignoring corrupt cache {}: {e}", self.path.display());
                None
            }
        }
    }

    /// Writes the cache through a temporary file so readers never see a
    /// partial write.
    pub fn store(&self, data: Option<&ActivityData>, metrics: &MetricStore) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut writer = BufWriter::new(fs::File::create(&tmp)?);
            serde_json::to_writer(&mut writer, &CacheFileRef { data, metrics })?;
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)?;
        debug!("Cached to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_path_sits_next_to_source() {
        let cache = ResultCache::for_source(Path::new("/data/activities/1234.fit"));
        assert_eq!(cache.path(), Path::new("/data/activities/cache/1234.json"));
    }

    #[test]
    fn test_missing_and_corrupt_files_are_cold_starts() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::for_source(&dir.path().join("ride.fit"));
        assert!(cache.load().is_none());

        fs::create_dir_all(cache.path().parent().unwrap()).unwrap();
        fs::write(cache.path(), b"{\"metrics\": {\"AveragePower\": {\"ty").unwrap();
        assert!(cache.load().is_none());

        cache.store(None, &MetricStore::new()).unwrap();
        assert_eq!(cache.load(), Some(CacheFile::default()));
    }

    #[test]
    fn test_cached_data_with_ragged_columns_is_a_cold_start() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::for_source(&dir.path().join("run.records.json"));
        fs::create_dir_all(cache.path().parent().unwrap()).unwrap();
        fs::write(
            cache.path(),
            serde_json::json!({
                "data": {
                    "records": {
                        "start": null,
                        "elapsed": [0.0, 1.0, 2.0],
                        "columns": {"speed": {"kind": "numeric", "values": [3.0]}}
                    }
                },
                "metrics": {}
            })
            .to_string(),
        )
        .unwrap();

        assert!(cache.load().is_none());
    }
}
