use crate::error::{AppError, AppResult};
use crate::logging::{log, LogLevel};
use csv::StringRecord;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Header names accepted for one column, highest priority first.
type ColumnNames = &'static [&'static str];

/// A reference table row built from the cells of its resolved columns.
pub trait ReferenceRow: Sized {
    const COLUMNS: &'static [ColumnNames];

    fn from_cells(cells: Vec<String>) -> Option<Self>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrgMappingEntry {
    pub primary_domain: String,
    pub org_name: String,
    pub industry: String,
}

impl ReferenceRow for OrgMappingEntry {
    const COLUMNS: &'static [ColumnNames] = &[
        &["primary_domain", "PRIMARY_DOMAIN", "Primary Domain", "domain", "Domain"],
        &["org_name", "ORG_NAME", "Org Name", "org", "name", "Name"],
        &["FINAL", "final", "industry", "Industry"],
    ];

    fn from_cells(cells: Vec<String>) -> Option<Self> {
        let [primary_domain, org_name, industry]: [String; 3] = cells.try_into().ok()?;
        Some(OrgMappingEntry {
            primary_domain,
            org_name,
            industry,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndustryMappingEntry {
    pub industry_code: String,
    pub label: String,
}

impl ReferenceRow for IndustryMappingEntry {
    const COLUMNS: &'static [ColumnNames] = &[
        &[
            "industry_code",
            "INDUSTRY_CODE",
            "Industry (API)",
            "industry_api",
            "INDUSTRY_API",
            "code",
        ],
        &["FINAL", "final", "label"],
    ];

    fn from_cells(cells: Vec<String>) -> Option<Self> {
        let [industry_code, label]: [String; 2] = cells.try_into().ok()?;
        Some(IndustryMappingEntry {
            industry_code,
            label,
        })
    }
}

/// Reference data for one run. Empty tables are valid and make
/// normalization fall through to its identity result.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTables {
    pub orgs: Vec<OrgMappingEntry>,
    pub industries: HashMap<String, String>,
}

impl ReferenceTables {
    pub fn new(orgs: Vec<OrgMappingEntry>, industries: Vec<IndustryMappingEntry>) -> Self {
        ReferenceTables {
            orgs,
            industries: industries
                .into_iter()
                .map(|e| (e.industry_code, e.label))
                .collect(),
        }
    }

    pub fn load(org_path: &Path, industry_path: &Path) -> AppResult<Self> {
        let orgs: Vec<OrgMappingEntry> = load_table(org_path, "organization mapping")?;
        let industries: Vec<IndustryMappingEntry> = load_table(industry_path, "industry mapping")?;
        log(
            LogLevel::Info,
            &format!(
                "Reference data: {} organization(s), {} industry code(s).",
                orgs.len(),
                industries.len()
            ),
        );
        Ok(ReferenceTables::new(orgs, industries))
    }
}

fn load_table<T: ReferenceRow>(path: &Path, label: &str) -> AppResult<Vec<T>> {
    match std::fs::File::open(path) {
        Ok(file) => read_table(file, label),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log(
                LogLevel::Warning,
                &format!(
                    "No {} file at '{}'; continuing with an empty table.",
                    label,
                    path.display()
                ),
            );
            Ok(Vec::new())
        }
        Err(e) => Err(AppError::Io(format!(
            "Cannot open {} file '{}': {}",
            label,
            path.display(),
            e
        ))),
    }
}

/// Picks one header index per column. When several accepted names are
/// present, the one listed first wins. Returns the canonical name of the
/// first column that has no header.
fn resolve_columns(
    headers: &StringRecord,
    columns: &[ColumnNames],
) -> Result<Vec<usize>, &'static str> {
    columns
        .iter()
        .map(|names| {
            names
                .iter()
                .find_map(|name| headers.iter().position(|h| h == *name))
                .ok_or(names[0])
        })
        .collect()
}

/// Reads a headed CSV table, trimming cells and skipping rows that do not fit
/// the expected columns. Unrecognized columns are ignored.
pub fn read_table<T, R>(reader: R, label: &str) -> AppResult<Vec<T>>
where
    T: ReferenceRow,
    R: Read,
{
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let indices = match resolve_columns(&headers, T::COLUMNS) {
        Ok(indices) => indices,
        Err(missing) => {
            log(
                LogLevel::Warning,
                &format!(
                    "The {} table has no '{}' column; continuing with an empty table.",
                    label, missing
                ),
            );
            return Ok(Vec::new());
        }
    };

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for (line, record) in rdr.records().enumerate() {
        let row = match record {
            Ok(record) => indices
                .iter()
                .map(|&i| record.get(i).map(str::to_string))
                .collect::<Option<Vec<String>>>()
                .and_then(T::from_cells)
                .ok_or_else(|| "missing cells".to_string()),
            Err(e) => Err(e.to_string()),
        };
        match row {
            Ok(row) => rows.push(row),
            Err(reason) => {
                skipped += 1;
                log(
                    LogLevel::Debug,
                    &format!("Skipping {} row {}: {}", label, line + 2, reason),
                );
            }
        }
    }
    if skipped > 0 {
        log(
            LogLevel::Warning,
            &format!("Skipped {} malformed {} row(s).", skipped, label),
        );
    }
    Ok(rows)
}
