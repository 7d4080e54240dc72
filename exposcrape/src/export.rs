use serde::Serialize;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::record::EntityRecord;
use crate::social::{Platform, SocialClassifier};
use crate::store::StoreError;

/// Column order of the columnar file.
pub const CSV_COLUMNS: [&str; 13] = [
    "company_index",
    "name",
    "description",
    "website_url",
    "phone",
    "email",
    "logo_url",
    "source_url",
    "facebook",
    "instagram",
    "linkedin",
    "twitter",
    "other_socials",
];

/// One columnar row. Field order must match [`CSV_COLUMNS`]; the header is
/// derived from the field names.
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    company_index: usize,
    name: &'a str,
    description: &'a str,
    website_url: &'a str,
    phone: &'a str,
    email: &'a str,
    logo_url: &'a str,
    source_url: &'a str,
    facebook: String,
    instagram: String,
    linkedin: String,
    twitter: String,
    other_socials: String,
}

impl<'a> CsvRow<'a> {
    fn new(record: &'a EntityRecord, social: &SocialClassifier) -> Self {
        let slots = social.categorize(record.socials.iter().map(String::as_str));
        let slot = |platform| slots.slot(platform).unwrap_or_default().to_string();
        Self {
            company_index: record.index,
            name: record.name.as_deref().unwrap_or_default(),
            description: record.description.as_deref().unwrap_or_default(),
            website_url: record.website_url.as_deref().unwrap_or_default(),
            phone: record.phone.as_deref().unwrap_or_default(),
            email: record.email.as_deref().unwrap_or_default(),
            logo_url: record.logo_url.as_deref().unwrap_or_default(),
            source_url: &record.source_url,
            facebook: slot(Platform::Facebook),
            instagram: slot(Platform::Instagram),
            linkedin: slot(Platform::Linkedin),
            twitter: slot(Platform::Twitter),
            other_socials: slots.other_joined(),
        }
    }
}

/// Append one row, writing the header first if the file is new or empty.
pub fn append_csv_row(path: &Path, record: &EntityRecord, social: &SocialClassifier) -> Result<(), StoreError> {
    let is_new = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let mut wtr = csv::WriterBuilder::new()
        .has_headers(is_new)
        .from_writer(file);
    wtr.serialize(CsvRow::new(record, social))?;
    wtr.flush()?;
    Ok(())
}

/// Rewrite the whole columnar file from `records`.
pub fn write_csv(path: &Path, records: &[EntityRecord], social: &SocialClassifier) -> Result<(), StoreError> {
    debug!("Writing {} records to CSV: {}", records.len(), path.display());

    let mut wtr = csv::Writer::from_writer(Vec::new());
    if records.is_empty() {
        wtr.write_record(CSV_COLUMNS)?;
    }
    for record in records {
        wtr.serialize(CsvRow::new(record, social))?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| StoreError::Io(e.into_error()))?;
    atomic_write(path, &bytes)
}

/// Number of well-formed data rows, or `None` if any row has the wrong
/// number of fields (e.g. a row cut short by a crash).
pub fn count_csv_rows(path: &Path) -> Result<Option<usize>, StoreError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let mut rows = 0;
    for result in rdr.records() {
        let row = match result {
            Ok(row) => row,
            Err(_) => return Ok(None),
        };
        if row.len() != CSV_COLUMNS.len() {
            return Ok(None);
        }
        rows += 1;
    }
    Ok(Some(rows))
}

/// Replace the document with a pretty-printed snapshot of `records`.
///
/// Written to a temp file, synced and renamed, so the document is always
/// either the previous or the new complete snapshot.
pub fn write_document(path: &Path, records: &[EntityRecord]) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(records)?;
    atomic_write(path, json.as_bytes())
}

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut temp_name = path.as_os_str().to_os_string();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    {
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

/// Write `records` to `csv_path` and to a sibling `.json` document.
/// Returns the document path.
pub fn export_records(
    csv_path: &Path,
    records: &[EntityRecord],
    social: &SocialClassifier,
) -> Result<PathBuf, StoreError> {
    if let Some(parent) = csv_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    write_csv(csv_path, records, social)?;
    let json_path = csv_path.with_extension("json");
    write_document(&json_path, records)?;

    info!(
        "Exported {} records to {} and {}",
        records.len(),
        csv_path.display(),
        json_path.display()
    );
    Ok(json_path)
}

/// Field fill counts over a set of records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapeStats {
    pub total: usize,
    pub with_name: usize,
    pub with_description: usize,
    pub with_website: usize,
    pub with_phone: usize,
    pub with_email: usize,
    pub with_logo: usize,
    pub with_socials: usize,
    pub facebook: usize,
    pub instagram: usize,
    pub linkedin: usize,
    pub twitter: usize,
    pub with_other_socials: usize,
}

impl ScrapeStats {
    pub fn from_records(records: &[EntityRecord], social: &SocialClassifier) -> Self {
        let mut stats = Self {
            total: records.len(),
            ..Default::default()
        };
        for record in records {
            stats.with_name += record.name.is_some() as usize;
            stats.with_description += record.description.is_some() as usize;
            stats.with_website += record.website_url.is_some() as usize;
            stats.with_phone += record.phone.is_some() as usize;
            stats.with_email += record.email.is_some() as usize;
            stats.with_logo += record.logo_url.is_some() as usize;
            stats.with_socials += (!record.socials.is_empty()) as usize;

            let slots = social.categorize(record.socials.iter().map(String::as_str));
            stats.facebook += slots.facebook.is_some() as usize;
            stats.instagram += slots.instagram.is_some() as usize;
            stats.linkedin += slots.linkedin.is_some() as usize;
            stats.twitter += slots.twitter.is_some() as usize;
            stats.with_other_socials += (!slots.other.is_empty()) as usize;
        }
        stats
    }
}

impl fmt::Display for ScrapeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total companies: {}", self.total)?;
        writeln!(f, "  With name:        {}", self.with_name)?;
        writeln!(f, "  With description: {}", self.with_description)?;
        writeln!(f, "  With website:     {}", self.with_website)?;
        writeln!(f, "  With phone:       {}", self.with_phone)?;
        writeln!(f, "  With email:       {}", self.with_email)?;
        writeln!(f, "  With logo:        {}", self.with_logo)?;
        writeln!(f, "  With socials:     {}", self.with_socials)?;
        writeln!(
            f,
            "    facebook {} / instagram {} / linkedin {} / twitter {} / other {}",
            self.facebook, self.instagram, self.linkedin, self.twitter, self.with_other_socials
        )
    }
}

pub fn print_summary(site: &str, stats: &ScrapeStats, document: &Path, columnar: &Path) {
    if stats.total == 0 {
        println!("No companies stored for {}.", site);
        return;
    }

    println!("\n=== Scrape Summary: {} ===", site);
    print!("{}", stats);
    println!("Document: {}", document.display());
    println!("CSV:      {}", columnar.display());
    println!("==============================\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, Heuristics};
    use tempfile::TempDir;

    fn classifier() -> SocialClassifier {
        let config = AppConfig::from_default().unwrap();
        Heuristics::compile(&config).unwrap().social
    }

    fn record(index: usize, name: &str, socials: &[&str]) -> EntityRecord {
        let mut record = EntityRecord::new(format!("https://fair.test/exhibitors/{}", index));
        record.index = index;
        record.name = Some(name.to_string());
        record.socials = socials.iter().map(|s| s.to_string()).collect();
        record
    }

    #[test]
    fn test_append_writes_header_once() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("site_companies.csv");
        let social = classifier();

        append_csv_row(&path, &record(1, "Acme", &[]), &social).unwrap();
        append_csv_row(&path, &record(2, "Globex", &[]), &social).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_COLUMNS.join(","));
        assert!(lines[1].starts_with("1,Acme,,"));
        assert_eq!(count_csv_rows(&path).unwrap(), Some(2));
    }

    #[test]
    fn test_socials_expand_into_columns() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.csv");
        let r = record(
            1,
            "Acme",
            &[
                "https://facebook.com/acme",
                "https://www.youtube.com/acme",
                "https://tiktok.com/@acme",
            ],
        );
        write_csv(&path, &[r], &classifier()).unwrap();

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), CSV_COLUMNS.to_vec());
        let row = rdr.records().next().unwrap().unwrap();
        assert_eq!(&row[8], "https://facebook.com/acme");
        assert_eq!(&row[9], "");
        assert_eq!(&row[12], "https://tiktok.com/@acme | https://www.youtube.com/acme");
    }

    #[test]
    fn test_truncated_row_is_detected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.csv");
        write_csv(&path, &[record(1, "Acme", &[])], &classifier()).unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"2,Glob").unwrap();
        drop(file);

        assert_eq!(count_csv_rows(&path).unwrap(), None);
    }

    #[test]
    fn test_write_document_leaves_no_temp_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("site_companies.json");
        write_document(&path, &[record(1, "Société Générale", &[])]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Société Générale"));
        assert!(!tmp.path().join("site_companies.json.tmp").exists());
    }

    #[test]
    fn test_export_records_writes_sibling_json() {
        let tmp = TempDir::new().unwrap();
        let csv_path = tmp.path().join("exports").join("fair.csv");
        let json_path = export_records(&csv_path, &[record(1, "Acme", &[])], &classifier()).unwrap();

        assert_eq!(json_path, tmp.path().join("exports").join("fair.json"));
        assert!(csv_path.exists());
        let loaded: Vec<EntityRecord> =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn test_stats() {
        let mut with_site = record(2, "Globex", &["https://www.linkedin.com/company/globex"]);
        with_site.website_url = Some("https://globex.test".into());
        let stats = ScrapeStats::from_records(&[record(1, "Acme", &[]), with_site], &classifier());

        assert_eq!(stats.total, 2);
        assert_eq!(stats.with_name, 2);
        assert_eq!(stats.with_website, 1);
        assert_eq!(stats.with_socials, 1);
        assert_eq!(stats.linkedin, 1);
        assert_eq!(stats.facebook, 0);
        assert!(stats.to_string().contains("Total companies: 2"));
    }
}
