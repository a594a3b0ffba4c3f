//! Persistence boundary: one document per beach, keyed by id, plus a
//! summary index used for listing.
//!
//! Documents are read back leniently as [`StoredDataset`] and normalized
//! once into a fully populated [`BeachRecord`]; nothing past this module
//! deals with missing fields.

use std::{
    collections::HashMap,
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    sync::RwLock,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    dataset::{BeachDataset, LocationRecord},
    grains::Grain,
    scenario::BeachInfo,
};

pub const UNKNOWN_BEACH_NAME: &str = "Unknown Beach";
const SUMMARY_FILE: &str = "beaches.json";
const RUNS_DIR: &str = "runs";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid beach id '{0}'")]
    InvalidId(String),
    #[error("store lock poisoned")]
    Poisoned,
}

/// A stored document as found, every field possibly absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredDataset {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub runs: Option<Vec<StoredRun>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredRun {
    #[serde(default)]
    pub operation_id: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub locations: Option<Vec<StoredLocation>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredLocation {
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub grains: Option<Vec<StoredGrain>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredGrain {
    #[serde(default)]
    pub diameter: Option<f64>,
    #[serde(default)]
    pub area: Option<f64>,
}

/// Fully populated document returned by the query layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeachRecord {
    pub id: String,
    pub name: String,
    pub runs: Vec<RunRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub operation_id: String,
    pub date: String,
    pub time: String,
    pub locations: Vec<LocationRecord>,
}

impl StoredDataset {
    /// Fills every missing field. `fallback_name` comes from the summary
    /// record when the document itself has no name.
    pub fn normalize(self, requested_id: &str, fallback_name: Option<&str>) -> BeachRecord {
        let name = self
            .name
            .or_else(|| fallback_name.map(str::to_owned))
            .unwrap_or_else(|| UNKNOWN_BEACH_NAME.to_string());
        let runs = self
            .runs
            .unwrap_or_default()
            .into_iter()
            .map(StoredRun::normalize)
            .collect();
        BeachRecord {
            id: self.id.unwrap_or_else(|| requested_id.to_string()),
            name,
            runs,
        }
    }
}

impl StoredRun {
    fn normalize(self) -> RunRecord {
        let operation_id = match (self.operation_id, self.date.as_deref()) {
            (Some(id), _) => id,
            (None, Some(raw)) => format!("run_{raw}"),
            (None, None) => "run_unknown".to_string(),
        };
        let locations = self
            .locations
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .filter_map(|(index, loc)| loc.normalize(&operation_id, index))
            .collect();
        RunRecord {
            operation_id,
            date: self.date.unwrap_or_default(),
            time: self.time.unwrap_or_default(),
            locations,
        }
    }
}

impl StoredLocation {
    /// A location without both coordinates cannot be placed and is dropped;
    /// so is any grain missing a size.
    fn normalize(self, operation_id: &str, index: usize) -> Option<LocationRecord> {
        let (Some(lat), Some(lon)) = (self.lat, self.lon) else {
            warn!(operation_id, index, "skipping stored location without coordinates");
            return None;
        };
        let stored = self.grains.unwrap_or_default();
        let total = stored.len();
        let grains: Vec<Grain> = stored
            .into_iter()
            .filter_map(|grain| match (grain.diameter, grain.area) {
                (Some(diameter), Some(area)) => Some(Grain { diameter, area }),
                _ => None,
            })
            .collect();
        if grains.len() < total {
            warn!(
                operation_id,
                index,
                skipped = total - grains.len(),
                "skipping stored grains without diameter or area"
            );
        }
        Some(LocationRecord { lat, lon, grains })
    }
}

pub trait DatasetStore: Send + Sync {
    /// Stores the dataset under its id, replacing any previous document, and
    /// upserts the beach's summary record.
    fn save(&self, summary: &BeachInfo, dataset: &BeachDataset) -> Result<(), StoreError>;

    fn list_beaches(&self) -> Result<Vec<BeachInfo>, StoreError>;

    fn load(&self, id: &str) -> Result<Option<StoredDataset>, StoreError>;

    /// Loads and normalizes one document; `None` for unknown ids.
    fn fetch(&self, id: &str) -> Result<Option<BeachRecord>, StoreError> {
        let Some(stored) = self.load(id)? else {
            return Ok(None);
        };
        let fallback = if stored.name.is_none() {
            let name = self
                .list_beaches()?
                .into_iter()
                .find(|beach| beach.id == id)
                .map(|beach| beach.name);
            debug!(id, name = ?name, "document has no name, using summary record");
            name
        } else {
            None
        };
        Ok(Some(stored.normalize(id, fallback.as_deref())))
    }
}

fn upsert(summaries: &mut Vec<BeachInfo>, summary: &BeachInfo) {
    match summaries.iter_mut().find(|beach| beach.id == summary.id) {
        Some(existing) => *existing = summary.clone(),
        None => summaries.push(summary.clone()),
    }
}

/// Directory-backed store: `beaches.json` plus `runs/<id>.json`.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(RUNS_DIR))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the document for `id`, or `None` when the id cannot name a file.
    pub fn document_path(&self, id: &str) -> Option<PathBuf> {
        let valid = !id.is_empty()
            && id != "."
            && id != ".."
            && !id.contains(['/', '\\'])
            && !id.contains('\0');
        valid.then(|| self.root.join(RUNS_DIR).join(format!("{id}.json")))
    }

    fn summary_path(&self) -> PathBuf {
        self.root.join(SUMMARY_FILE)
    }

    fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
        let tmp = path.with_extension("json.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer(&mut writer, value)?;
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl DatasetStore for FileStore {
    /// The summary index is written before the document, so a failed save
    /// never leaves a document that no listing points at.
    fn save(&self, summary: &BeachInfo, dataset: &BeachDataset) -> Result<(), StoreError> {
        let path = self
            .document_path(&dataset.id)
            .ok_or_else(|| StoreError::InvalidId(dataset.id.clone()))?;

        let mut summaries = self.list_beaches()?;
        upsert(&mut summaries, summary);
        Self::write_json(&self.summary_path(), &summaries)?;

        Self::write_json(&path, dataset)?;
        info!(id = %dataset.id, path = %path.display(), "dataset stored");
        Ok(())
    }

    fn list_beaches(&self) -> Result<Vec<BeachInfo>, StoreError> {
        let path = self.summary_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    fn load(&self, id: &str) -> Result<Option<StoredDataset>, StoreError> {
        let Some(path) = self.document_path(id) else {
            warn!(id, "rejected malformed beach id");
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        let reader = BufReader::new(File::open(path)?);
        Ok(Some(serde_json::from_reader(reader)?))
    }
}

/// In-process store, handy for tests and ephemeral servers.
#[derive(Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<String, serde_json::Value>>,
    summaries: RwLock<Vec<BeachInfo>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an arbitrary document, bypassing the typed dataset.
    pub fn insert_raw(&self, id: &str, document: serde_json::Value) -> Result<(), StoreError> {
        self.documents
            .write()
            .map_err(|_| StoreError::Poisoned)?
            .insert(id.to_string(), document);
        Ok(())
    }

    pub fn insert_summary(&self, summary: &BeachInfo) -> Result<(), StoreError> {
        let mut summaries = self.summaries.write().map_err(|_| StoreError::Poisoned)?;
        upsert(&mut summaries, summary);
        Ok(())
    }
}

impl DatasetStore for MemoryStore {
    fn save(&self, summary: &BeachInfo, dataset: &BeachDataset) -> Result<(), StoreError> {
        self.insert_raw(&dataset.id, serde_json::to_value(dataset)?)?;
        self.insert_summary(summary)
    }

    fn list_beaches(&self) -> Result<Vec<BeachInfo>, StoreError> {
        Ok(self
            .summaries
            .read()
            .map_err(|_| StoreError::Poisoned)?
            .clone())
    }

    fn load(&self, id: &str) -> Result<Option<StoredDataset>, StoreError> {
        let documents = self.documents.read().map_err(|_| StoreError::Poisoned)?;
        match documents.get(id) {
            Some(document) => Ok(Some(serde_json::from_value(document.clone())?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn normalize_fills_missing_fields() {
        let stored: StoredDataset = serde_json::from_value(json!({
            "_id": "b1",
            "runs": [
                {"date": "2025-09-21", "time": "08:15"},
                {"operation_id": "run_x", "locations": [{"lat": 1.0, "lon": 2.0}]},
                {"date": "yesterday"}
            ]
        }))
        .unwrap();

        let record = stored.normalize("b1", None);

        assert_eq!(record.name, UNKNOWN_BEACH_NAME);
        assert_eq!(record.runs[0].operation_id, "run_2025-09-21");
        assert!(record.runs[0].locations.is_empty());
        assert_eq!(record.runs[1].operation_id, "run_x");
        assert_eq!(record.runs[1].date, "");
        assert!(record.runs[1].locations[0].grains.is_empty());
        assert_eq!(record.runs[2].operation_id, "run_yesterday");
    }

    #[test]
    fn normalize_prefers_document_name_then_fallback() {
        let named = StoredDataset {
            name: Some("Doc".into()),
            ..StoredDataset::default()
        };
        assert_eq!(named.normalize("x", Some("Summary")).name, "Doc");

        let unnamed = StoredDataset::default();
        let record = unnamed.normalize("x", Some("Summary"));
        assert_eq!(record.name, "Summary");
        assert_eq!(record.id, "x");
        assert!(record.runs.is_empty());
    }

    #[test]
    fn fetch_uses_summary_name_for_unnamed_documents() {
        let store = MemoryStore::new();
        store
            .insert_summary(&BeachInfo {
                id: "b2".into(),
                name: "Listed".into(),
                lat: 1.0,
                lon: 2.0,
            })
            .unwrap();
        store.insert_raw("b2", json!({"runs": []})).unwrap();

        let record = store.fetch("b2").unwrap().unwrap();

        assert_eq!(record.name, "Listed");
        assert!(store.fetch("missing").unwrap().is_none());
    }

    #[test]
    fn file_store_rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        assert!(store.document_path("../etc").is_none());
        assert!(store.document_path("").is_none());
        assert!(store.document_path("beach-1").is_some());
        assert!(store.load("a/b").unwrap().is_none());
    }

    #[test]
    fn failed_summary_write_stores_no_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        fs::create_dir(store.summary_path()).unwrap();
        let info = BeachInfo {
            id: "b1".into(),
            name: "Beach".into(),
            lat: 0.0,
            lon: 0.0,
        };
        let dataset = BeachDataset::new("b1", "Beach");

        assert!(store.save(&info, &dataset).is_err());
        assert!(!store.document_path("b1").unwrap().exists());
    }

    fn location_json(location: serde_json::Value) -> StoredDataset {
        serde_json::from_value(json!({
            "runs": [{"operation_id": "run_a", "locations": [location]}]
        }))
        .unwrap()
    }

    #[test]
    fn location_without_lat_is_skipped() {
        let stored = location_json(json!({"lon": 2.0, "grains": []}));
        let record = stored.normalize("b1", None);
        assert!(record.runs[0].locations.is_empty());
    }

    #[test]
    fn location_without_lon_is_skipped() {
        let stored = location_json(json!({"lat": 1.0}));
        let record = stored.normalize("b1", None);
        assert!(record.runs[0].locations.is_empty());
    }

    #[test]
    fn grain_without_area_is_skipped() {
        let stored = location_json(json!({
            "lat": 1.0,
            "lon": 2.0,
            "grains": [{"diameter": 1.0}, {"diameter": 0.8, "area": 0.4}]
        }));
        let record = stored.normalize("b1", None);
        assert_eq!(
            record.runs[0].locations[0].grains,
            vec![Grain { diameter: 0.8, area: 0.4 }]
        );
    }

    #[test]
    fn grain_without_diameter_is_skipped() {
        let stored = location_json(json!({
            "lat": 1.0,
            "lon": 2.0,
            "grains": [{"area": 0.4}]
        }));
        let record = stored.normalize("b1", None);
        assert_eq!(record.runs[0].locations.len(), 1);
        assert!(record.runs[0].locations[0].grains.is_empty());
    }
}
