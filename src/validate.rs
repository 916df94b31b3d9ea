//! Structural validation of generated STAC documents.
//!
//! Checks the fields this generator relies on: required core fields, STAC
//! version, geometry/bbox shape, temporal fields, declared extensions, and
//! that Item asset sets match a registered dataset group.

use chrono::DateTime;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::catalog::{extensions, STAC_VERSION};
use crate::error::{Error, Result};
use crate::registry::registry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// Validation issue
#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    pub document: String,
    pub severity: Severity,
    pub message: String,
}

/// Field prefixes and the extension that must be declared when they are used
const EXTENSION_PREFIXES: &[(&str, &str)] = &[
    ("proj:", extensions::PROJECTION),
    ("sci:", extensions::SCIENTIFIC),
    ("raster:", extensions::RASTER),
    ("file:", extensions::FILE),
];

struct Issues {
    document: String,
    issues: Vec<ValidationIssue>,
}

impl Issues {
    fn new(document: &str) -> Self {
        Issues {
            document: document.to_string(),
            issues: Vec::new(),
        }
    }

    fn error(&mut self, message: impl Into<String>) {
        self.push(Severity::Error, message.into());
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.push(Severity::Warning, message.into());
    }

    fn push(&mut self, severity: Severity, message: String) {
        self.issues.push(ValidationIssue {
            document: self.document.clone(),
            severity,
            message,
        });
    }
}

pub fn has_errors(issues: &[ValidationIssue]) -> bool {
    issues.iter().any(|i| i.severity == Severity::Error)
}

/// Validate an Item or Collection document, dispatching on its `type`
pub fn validate_document(value: &Value) -> Vec<ValidationIssue> {
    match value.get("type").and_then(Value::as_str) {
        Some("Feature") => validate_item(value),
        Some("Collection") => validate_collection(value),
        other => {
            let mut issues = Issues::new(document_id(value));
            issues.error(format!("Unsupported document type: {other:?}"));
            issues.issues
        }
    }
}

pub fn validate_item(value: &Value) -> Vec<ValidationIssue> {
    let mut issues = Issues::new(document_id(value));
    check_common(value, &mut issues);

    match value.get("geometry") {
        Some(Value::Object(geom)) => {
            if !geom.contains_key("type") || !geom.contains_key("coordinates") {
                issues.error("Geometry must have 'type' and 'coordinates'");
            }
        }
        Some(Value::Null) => issues.warning("Missing geometry"),
        _ => issues.error("Missing 'geometry'"),
    }

    match value.get("bbox") {
        Some(bbox) => check_bbox(bbox, &mut issues),
        None if value.get("geometry").is_some_and(|g| !g.is_null()) => {
            issues.error("'bbox' is required when geometry is set")
        }
        None => {}
    }

    match value.get("properties").and_then(Value::as_object) {
        Some(props) => {
            let start = props.get("start_datetime").and_then(Value::as_str);
            let end = props.get("end_datetime").and_then(Value::as_str);
            match props.get("datetime") {
                None => issues.error("Property 'datetime' is required (may be null)"),
                Some(Value::Null) if start.is_none() || end.is_none() => {
                    issues.error("'start_datetime' and 'end_datetime' are required when 'datetime' is null")
                }
                _ => {}
            }
            check_interval(start, end, &mut issues);
        }
        None => issues.error("Missing 'properties'"),
    }

    match value.get("assets").and_then(Value::as_object) {
        Some(assets) if assets.is_empty() => issues.warning("No assets"),
        Some(assets) => {
            for (key, asset) in assets {
                if asset.get("href").and_then(Value::as_str).map_or(true, str::is_empty) {
                    issues.error(format!("Asset '{key}' has no href"));
                }
                check_interval(
                    asset.get("start_datetime").and_then(Value::as_str),
                    asset.get("end_datetime").and_then(Value::as_str),
                    &mut issues,
                );
            }
            check_asset_set(value, assets.keys().map(String::as_str).collect(), &mut issues);
        }
        None => issues.error("Missing 'assets'"),
    }

    if value.get("collection").is_some() && !has_link(value, "collection") {
        issues.error("Item has 'collection' but no link with rel 'collection'");
    }

    check_extensions(value, &mut issues);
    issues.issues
}

pub fn validate_collection(value: &Value) -> Vec<ValidationIssue> {
    let mut issues = Issues::new(document_id(value));
    check_common(value, &mut issues);

    for field in ["description", "license"] {
        if value.get(field).and_then(Value::as_str).is_none() {
            issues.error(format!("Missing '{field}'"));
        }
    }

    match value.pointer("/extent/spatial/bbox").and_then(Value::as_array) {
        Some(boxes) if !boxes.is_empty() => boxes.iter().for_each(|b| check_bbox(b, &mut issues)),
        _ => issues.error("Missing 'extent.spatial.bbox'"),
    }

    match value.pointer("/extent/temporal/interval").and_then(Value::as_array) {
        Some(intervals) if !intervals.is_empty() => {
            for interval in intervals {
                match interval.as_array().map(Vec::as_slice) {
                    Some([start, end]) => check_interval(start.as_str(), end.as_str(), &mut issues),
                    _ => issues.error("Temporal interval must have two entries"),
                }
            }
        }
        _ => issues.error("Missing 'extent.temporal.interval'"),
    }

    if value.get("item_assets").is_some() && !declares(value, extensions::ITEM_ASSETS) {
        issues.error(format!("'item_assets' used but {} not declared", extensions::ITEM_ASSETS));
    }

    check_extensions(value, &mut issues);
    issues.issues
}

/// Validate a document before it is written.
///
/// Error-level issues fail with [`Error::InvalidDocument`]; warnings are logged.
pub fn ensure_valid<T: Serialize>(doc: &T) -> Result<()> {
    let value = serde_json::to_value(doc)?;
    let (errors, warnings): (Vec<_>, Vec<_>) = validate_document(&value)
        .into_iter()
        .partition(|i| i.severity == Severity::Error);

    for issue in &warnings {
        warn!("{}: {}", issue.document, issue.message);
    }
    if !errors.is_empty() {
        return Err(Error::InvalidDocument {
            document: document_id(&value).to_string(),
            issues: errors.into_iter().map(|i| i.message).collect(),
        });
    }
    Ok(())
}

/// Validate one JSON file
pub fn validate_file(path: &Path) -> Result<Vec<ValidationIssue>> {
    let value: Value = serde_json::from_str(&fs::read_to_string(path)?)?;
    Ok(validate_document(&value))
}

/// Validate every `*.json` file below a directory.
///
/// Returns the number of documents checked and the issues found.
pub fn validate_dir(dir: &Path) -> Result<(usize, Vec<ValidationIssue>)> {
    let mut count = 0;
    let mut issues = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut entries: Vec<_> = fs::read_dir(&current)?.collect::<std::io::Result<_>>()?;
        entries.sort_by_key(|e| e.path());
        for entry in entries {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|e| e == "json") {
                debug!("Validating {:?}", path);
                count += 1;
                issues.extend(validate_file(&path)?);
            }
        }
    }

    Ok((count, issues))
}

fn document_id(value: &Value) -> &str {
    value.get("id").and_then(Value::as_str).unwrap_or("unknown")
}

fn check_common(value: &Value, issues: &mut Issues) {
    match value.get("stac_version").and_then(Value::as_str) {
        None => issues.error("Missing 'stac_version'"),
        Some(v) if v != STAC_VERSION => issues.warning(format!("STAC version is not {STAC_VERSION}")),
        _ => {}
    }

    if value.get("id").and_then(Value::as_str).map_or(true, str::is_empty) {
        issues.error("Missing 'id'");
    }

    match value.get("links").and_then(Value::as_array) {
        Some(links) => {
            for link in links {
                if link.get("rel").and_then(Value::as_str).is_none() || link.get("href").and_then(Value::as_str).is_none()
                {
                    issues.error("Link must have 'rel' and 'href'");
                }
            }
        }
        None => issues.error("Missing 'links'"),
    }
}

fn check_bbox(bbox: &Value, issues: &mut Issues) {
    let coords: Option<Vec<f64>> = bbox
        .as_array()
        .and_then(|a| a.iter().map(Value::as_f64).collect::<Option<Vec<_>>>());
    match coords.as_deref() {
        Some([west, south, east, north]) => {
            if south > north {
                issues.error(format!("bbox south {south} is greater than north {north}"));
            }
            if west > east {
                issues.warning(format!("bbox crosses the antimeridian ({west} > {east})"));
            }
        }
        _ => issues.error("bbox must be an array of 4 numbers"),
    }
}

fn check_interval(start: Option<&str>, end: Option<&str>, issues: &mut Issues) {
    let parse = |s: &str, issues: &mut Issues| match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => Some(dt),
        Err(e) => {
            issues.error(format!("Invalid timestamp '{s}': {e}"));
            None
        }
    };
    let start = start.and_then(|s| parse(s, issues));
    let end = end.and_then(|s| parse(s, issues));
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            issues.error(format!("Interval start {start} is after end {end}"));
        }
    }
}

fn check_asset_set(value: &Value, keys: BTreeSet<&str>, issues: &mut Issues) {
    let collection = value.get("collection").and_then(Value::as_str);
    let entry = registry()
        .entries()
        .find(|e| collection == Some(e.collection.id) || (collection.is_none() && e.asset_keys() == keys));

    match entry {
        Some(entry) if entry.asset_keys() != keys => issues.error(format!(
            "Asset set does not match the registered assets of {}",
            entry.collection.id
        )),
        Some(_) => {}
        None => issues.warning("Asset set does not match any dataset group"),
    }
}

fn check_extensions(value: &Value, issues: &mut Issues) {
    let asset_objects = value
        .get("assets")
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(|assets| assets.values().filter_map(Value::as_object));
    let fields: BTreeSet<&str> = [value.as_object(), value.get("properties").and_then(Value::as_object)]
        .into_iter()
        .flatten()
        .chain(asset_objects)
        .flat_map(|obj| obj.keys().map(String::as_str))
        .collect();

    for (prefix, schema) in EXTENSION_PREFIXES {
        if fields.iter().any(|f| f.starts_with(prefix)) && !declares(value, schema) {
            issues.error(format!("Fields '{prefix}*' used but {schema} not declared"));
        }
    }
}

fn declares(value: &Value, schema: &str) -> bool {
    value
        .get("stac_extensions")
        .and_then(Value::as_array)
        .is_some_and(|exts| exts.iter().any(|e| e.as_str() == Some(schema)))
}

fn has_link(value: &Value, rel: &str) -> bool {
    value
        .get("links")
        .and_then(Value::as_array)
        .is_some_and(|links| links.iter().any(|l| l.get("rel").and_then(Value::as_str) == Some(rel)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::tests::FakeReader;
    use crate::collection::{build_collection, build_root_collection, write_collections};
    use crate::item::{create_item, write_item, ItemOptions};
    use crate::registry::DatasetGroup;

    const MONTHLY_HISTORY: &str = "MonthlyHistory/LATEST/tiles/1984/1984_04/1984_04-0000360000-0000480000.tif";

    const SOURCES: [&str; 4] = [
        "Aggregated/LATEST/change/tiles/change-0000360000-0000480000.tif",
        MONTHLY_HISTORY,
        "MonthlyRecurrence/LATEST/tiles/monthlyRecurrence4/0000360000-0000480000.tif",
        "YearlyClassification/LATEST/tiles/yearlyClassification1984/yearlyClassification1984-0000360000-0000480000.tif",
    ];

    fn item_value() -> Value {
        let item = create_item(MONTHLY_HISTORY, &ItemOptions::default(), &FakeReader::default()).unwrap();
        serde_json::to_value(&item).unwrap()
    }

    #[test]
    fn test_generated_documents_are_valid() {
        for source in SOURCES {
            let item = create_item(source, &ItemOptions::default(), &FakeReader::default()).unwrap();
            let issues = validate_document(&serde_json::to_value(&item).unwrap());
            assert!(issues.is_empty(), "{source}: {issues:?}");
        }

        let options = ItemOptions {
            collection_href: Some("./collection.json".into()),
            ..Default::default()
        };
        for source in SOURCES {
            let item = create_item(source, &options, &FakeReader::default()).unwrap();
            let issues = validate_document(&serde_json::to_value(&item).unwrap());
            assert!(issues.is_empty(), "{source}: {issues:?}");
        }

        for group in DatasetGroup::ALL {
            let issues = validate_document(&serde_json::to_value(build_collection(group)).unwrap());
            assert!(issues.is_empty(), "{group}: {issues:?}");
        }
        let issues = validate_document(&serde_json::to_value(build_root_collection()).unwrap());
        assert!(issues.is_empty(), "{issues:?}");
    }

    #[test]
    fn test_ensure_valid() {
        let item = create_item(MONTHLY_HISTORY, &ItemOptions::default(), &FakeReader::default()).unwrap();
        ensure_valid(&item).unwrap();

        let mut broken = build_collection(DatasetGroup::Aggregated);
        broken.extent.spatial.bbox = vec![vec![0.0, 40.0, 10.0]];
        match ensure_valid(&broken).unwrap_err() {
            Error::InvalidDocument { document, issues } => {
                assert_eq!(document, "jrc_gsw_aggregated");
                assert_eq!(issues, vec!["bbox must be an array of 4 numbers".to_string()]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_missing_extension_declaration() {
        let mut value = item_value();
        value["stac_extensions"] = serde_json::json!([]);

        let issues = validate_item(&value);
        assert!(has_errors(&issues));
        assert!(issues.iter().any(|i| i.message.contains("proj:")));
    }

    #[test]
    fn test_partial_asset_set() {
        let mut value = item_value();
        value["assets"]
            .as_object_mut()
            .unwrap()
            .insert("extra".into(), serde_json::json!({"href": "extra.tif"}));

        let issues = validate_item(&value);
        assert!(issues.iter().any(|i| i.message.contains("any dataset group")));
    }

    #[test]
    fn test_bad_temporal_range() {
        let mut value = item_value();
        value["properties"]["end_datetime"] = serde_json::json!("1983-01-01T00:00:00Z");
        assert!(has_errors(&validate_item(&value)));

        value["properties"]["end_datetime"] = serde_json::json!("not a date");
        assert!(has_errors(&validate_item(&value)));
    }

    #[test]
    fn test_bad_bbox() {
        let mut value = item_value();
        value["bbox"] = serde_json::json!([0.0, 40.0, 10.0]);
        assert!(has_errors(&validate_item(&value)));
    }

    #[test]
    fn test_unsupported_type() {
        let issues = validate_document(&serde_json::json!({"type": "Catalog", "id": "x"}));
        assert!(has_errors(&issues));
    }

    #[test]
    fn test_validate_dir() {
        let dir = tempfile::tempdir().unwrap();
        write_collections(dir.path()).unwrap();
        let item = create_item(MONTHLY_HISTORY, &ItemOptions::default(), &FakeReader::default()).unwrap();
        write_item(&item, dir.path()).unwrap();

        let (count, issues) = validate_dir(dir.path()).unwrap();
        assert_eq!(count, 6);
        assert!(issues.is_empty(), "{issues:?}");
    }
}
