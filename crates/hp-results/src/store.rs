//! Artifact storage API.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::ResultsResult;
use crate::map::OperatingMap;
use crate::types::{AttemptRecord, PartloadRecord};

const DELIMITER: u8 = b';';

/// Paths of everything a model persists, rooted at its working directory.
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    root_dir: PathBuf,
}

impl ArtifactStore {
    /// Create the store and its `stable/`, `output/` and `output/logging/`
    /// directories.
    pub fn new(root_dir: PathBuf) -> ResultsResult<Self> {
        fs::create_dir_all(root_dir.join("stable"))?;
        fs::create_dir_all(root_dir.join("output").join("logging"))?;
        Ok(Self { root_dir })
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    pub fn design_path(&self, subdirname: &str) -> PathBuf {
        self.root_dir
            .join("stable")
            .join(format!("{subdirname}_design"))
    }

    pub fn init_path(&self, subdirname: &str) -> PathBuf {
        self.root_dir
            .join("stable")
            .join(format!("{subdirname}_init"))
    }

    pub fn partload_path(&self, subdirname: &str) -> PathBuf {
        self.root_dir
            .join("output")
            .join(format!("{subdirname}_partload.csv"))
    }

    pub fn offdesign_log_path(&self, subdirname: &str) -> PathBuf {
        self.root_dir
            .join("output")
            .join("logging")
            .join(format!("{subdirname}_offdesign_log.csv"))
    }

    pub fn has_design(&self, subdirname: &str) -> bool {
        self.design_path(subdirname).exists()
    }

    /// Remove the warm-start snapshot a previous sweep left behind.
    /// Returns whether there was one.
    pub fn discard_init(&self, subdirname: &str) -> ResultsResult<bool> {
        let path = self.init_path(subdirname);
        if !path.exists() {
            return Ok(false);
        }
        if path.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
        tracing::debug!(path = %path.display(), "stale init snapshot removed");
        Ok(true)
    }

    pub fn save_partload(&self, subdirname: &str, map: &OperatingMap) -> ResultsResult<PathBuf> {
        let path = self.partload_path(subdirname);
        write_partload_csv(&path, &map.to_records())?;
        tracing::info!(path = %path.display(), cells = map.filled(), "partload map written");
        Ok(path)
    }

    pub fn load_partload(&self, subdirname: &str) -> ResultsResult<OperatingMap> {
        let records = read_partload_csv(&self.partload_path(subdirname))?;
        OperatingMap::from_records(&records)
    }

    pub fn open_attempt_log(&self, subdirname: &str) -> ResultsResult<AttemptLog> {
        AttemptLog::create(&self.offdesign_log_path(subdirname))
    }
}

/// Write long-form rows, semicolon-delimited, with a header line.
pub fn write_partload_csv(path: &Path, records: &[PartloadRecord]) -> ResultsResult<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .from_path(path)?;
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn read_partload_csv(path: &Path) -> ResultsResult<Vec<PartloadRecord>> {
    let file = File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(DELIMITER)
        .from_reader(file);
    let mut records = Vec::new();
    for result in rdr.deserialize() {
        let record: PartloadRecord = result?;
        records.push(record);
    }
    Ok(records)
}

/// Append-only CSV log of sweep attempts; flushed after every row.
pub struct AttemptLog {
    wtr: csv::Writer<File>,
    path: PathBuf,
}

impl AttemptLog {
    pub fn create(path: &Path) -> ResultsResult<Self> {
        let wtr = csv::WriterBuilder::new()
            .delimiter(DELIMITER)
            .from_path(path)?;
        Ok(Self {
            wtr,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Log one attempt stamped with the current local time.
    pub fn record(
        &mut self,
        converged: bool,
        t_hs_ff: f64,
        t_cons_ff: f64,
        pl: f64,
        residual: f64,
    ) -> ResultsResult<()> {
        let row = AttemptRecord {
            timestamp: chrono::Local::now().to_rfc3339(),
            converged,
            t_hs_ff,
            t_cons_ff,
            pl,
            residual,
        };
        self.wtr.serialize(&row)?;
        self.wtr.flush()?;
        Ok(())
    }
}

pub fn read_attempt_log(path: &Path) -> ResultsResult<Vec<AttemptRecord>> {
    let file = File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .from_reader(file);
    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        rows.push(result?);
    }
    Ok(rows)
}
