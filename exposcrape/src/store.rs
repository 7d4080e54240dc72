//! Per-site persistence: the authoritative JSON document plus the append-only
//! CSV, and the dedup index rebuilt from the document at startup.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::dedup::DedupIndex;
use crate::export::{append_csv_row, count_csv_rows, write_csv, write_document};
use crate::record::EntityRecord;
use crate::social::SocialClassifier;
use crate::url_utils::site_slug;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to serialize records: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Cannot derive a storage name from listing URL '{0}'")]
    InvalidListingUrl(String),

    #[error("Stored document {path} is corrupt: {source}")]
    CorruptDocument {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Document and columnar file locations for one site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub document: PathBuf,
    pub columnar: PathBuf,
}

impl StorePaths {
    /// `<output_dir>/<slug>_companies.{json,csv}`
    pub fn for_listing(output_dir: &Path, listing_url: &str) -> Result<Self, StoreError> {
        let slug = site_slug(listing_url)
            .ok_or_else(|| StoreError::InvalidListingUrl(listing_url.to_string()))?;
        Ok(Self {
            document: output_dir.join(format!("{}_companies.json", slug)),
            columnar: output_dir.join(format!("{}_companies.csv", slug)),
        })
    }
}

/// Outcome of offering a record to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// Committed under this 1-based index.
    Accepted(usize),
    Duplicate,
}

pub struct CompanyStore {
    paths: StorePaths,
    social: SocialClassifier,
    records: Vec<EntityRecord>,
    index: DedupIndex,
}

impl CompanyStore {
    /// Open the store for `listing_url`, loading any prior document and
    /// bringing the CSV back in line with it.
    pub fn open(output_dir: &Path, listing_url: &str, social: SocialClassifier) -> Result<Self, StoreError> {
        std::fs::create_dir_all(output_dir)?;
        let paths = StorePaths::for_listing(output_dir, listing_url)?;

        let mut records = load_document(&paths.document)?;
        renumber(&mut records);
        let index = DedupIndex::from_records(&records);

        if !records.is_empty() {
            info!(
                "Loaded {} existing companies from {}",
                records.len(),
                paths.document.display()
            );
        }

        let mut store = Self {
            paths,
            social,
            records,
            index,
        };
        store.reconcile()?;
        Ok(store)
    }

    pub fn is_duplicate(&self, record: &EntityRecord) -> bool {
        self.index.is_duplicate(record)
    }

    /// Assign the next index and commit `record`, unless it is a duplicate.
    ///
    /// The document is rewritten first, then one CSV row is appended. If the
    /// document write fails the record is dropped but its key stays in the
    /// index. If only the CSV append fails the record stays committed; the
    /// CSV is rebuilt on the next reconcile.
    pub fn accept(&mut self, mut record: EntityRecord) -> Result<Acceptance, StoreError> {
        if self.index.is_duplicate(&record) {
            debug!("Duplicate skipped: {}", record.display_name());
            return Ok(Acceptance::Duplicate);
        }

        let position = self.records.len() + 1;
        record.index = position;
        self.index.insert(&record);
        self.records.push(record);

        if let Err(e) = write_document(&self.paths.document, &self.records) {
            if let Some(lost) = self.records.pop() {
                error!(record = ?lost, "Failed to save company to {}: {}", self.paths.document.display(), e);
            }
            return Err(e);
        }

        let committed = &self.records[position - 1];
        if let Err(e) = append_csv_row(&self.paths.columnar, committed, &self.social) {
            error!(record = ?committed, "Failed to append company to {}: {}", self.paths.columnar.display(), e);
            return Err(e);
        }

        info!("Saved company {}: {}", position, committed.display_name());
        Ok(Acceptance::Accepted(position))
    }

    /// Rewrite the CSV from the document if their row counts differ or the
    /// CSV has a malformed row. Returns whether a rewrite happened.
    pub fn reconcile(&mut self) -> Result<bool, StoreError> {
        let csv_exists = self.paths.columnar.exists();
        if !csv_exists && self.records.is_empty() {
            return Ok(false);
        }

        let rows = if csv_exists {
            count_csv_rows(&self.paths.columnar)?
        } else {
            None
        };
        if rows == Some(self.records.len()) {
            return Ok(false);
        }

        warn!(
            "CSV {} out of sync with document ({} rows, {} records), rewriting",
            self.paths.columnar.display(),
            rows.map(|r| r.to_string()).unwrap_or_else(|| "unreadable".to_string()),
            self.records.len()
        );
        write_csv(&self.paths.columnar, &self.records, &self.social)?;
        Ok(true)
    }

    /// Delete both files and forget every record and key.
    pub fn clear_all(&mut self) -> Result<(), StoreError> {
        for path in [&self.paths.document, &self.paths.columnar] {
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
        self.records.clear();
        self.index.clear();
        info!("Cleared all stored companies");
        Ok(())
    }

    pub fn records(&self) -> &[EntityRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    pub fn social(&self) -> &SocialClassifier {
        &self.social
    }
}

/// Records from an existing document; an absent or blank file is empty.
pub fn load_document(path: &Path) -> Result<Vec<EntityRecord>, StoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&content).map_err(|source| StoreError::CorruptDocument {
        path: path.to_path_buf(),
        source,
    })
}

/// Loaded records keep their order; indices are forced back to 1..N.
fn renumber(records: &mut [EntityRecord]) {
    for (position, record) in records.iter_mut().enumerate() {
        if record.index != position + 1 {
            debug!("Renumbering stored company {} -> {}", record.index, position + 1);
            record.index = position + 1;
        }
    }
}
