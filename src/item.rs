//! STAC Item construction from a classified path and its assembled assets.

use chrono::{DateTime, Months, TimeZone, Utc};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::assets::{self, representative_key, AssetRecord};
use crate::catalog::{self, extensions, Asset, Item, ItemProperties, Link, STAC_VERSION};
use crate::classify::{self, Classification, ClassifiedPath};
use crate::error::{Error, Result};
use crate::raster::RasterReader;
use crate::registry::{self, registry};
use crate::validate;

/// Start (inclusive) and end (exclusive) of the period an Item covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalBounds {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TemporalBounds {
    pub fn for_classification(classification: &Classification) -> Result<Self> {
        match classification {
            Classification::Aggregated { .. } | Classification::MonthlyRecurrence { .. } => Ok(TemporalBounds {
                start: parse_timestamp(registry::START_TIME)?,
                end: parse_timestamp(registry::END_TIME)?,
            }),
            Classification::MonthlyHistory { year, month, .. } => {
                Self::period(classification, *year, *month, Months::new(1))
            }
            Classification::YearlyClassification { year, .. } => {
                Self::period(classification, *year, 1, Months::new(12))
            }
        }
    }

    fn period(classification: &Classification, year: i32, month: u32, length: Months) -> Result<Self> {
        let invalid = || Error::malformed(&item_id(classification), format!("invalid period {year}-{month:02}"));

        let start = Utc
            .with_ymd_and_hms(year, month, 1, 0, 0, 0)
            .single()
            .ok_or_else(invalid)?;
        let end = start.checked_add_months(length).ok_or_else(invalid)?;
        Ok(TemporalBounds { start, end })
    }
}

pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

/// Item id for a classification.
///
/// Aggregated and MonthlyRecurrence Items are one per tile; MonthlyHistory
/// adds `_{year}_{month:02}` and YearlyClassification `_{year}`.
pub fn item_id(classification: &Classification) -> String {
    match classification {
        Classification::Aggregated { tile } | Classification::MonthlyRecurrence { tile, .. } => tile.clone(),
        Classification::MonthlyHistory { tile, year, month } => format!("{tile}_{year}_{month:02}"),
        Classification::YearlyClassification { tile, year } => format!("{tile}_{year}"),
    }
}

/// Options that affect Item construction but not classification
#[derive(Debug, Clone, Default)]
pub struct ItemOptions {
    /// Root of the archive for Aggregated sibling lookup
    pub data_root: Option<String>,
    /// When set, the Item references its collection through this href
    pub collection_href: Option<String>,
}

/// Build an Item from a classified path and its assets.
///
/// The asset set must match the registered keys of the group exactly.
pub fn build_item(
    classified: &ClassifiedPath,
    assets: &BTreeMap<String, AssetRecord>,
    options: &ItemOptions,
) -> Result<Item> {
    let classification = &classified.classification;
    let group = classification.group();
    let entry = registry().entry(group);
    let id = item_id(classification);

    let expected = entry.asset_keys();
    let actual: BTreeSet<&str> = assets.keys().map(String::as_str).collect();
    if expected != actual {
        return Err(Error::IncompleteAssets {
            item_id: id,
            missing: expected.difference(&actual).map(|k| k.to_string()).collect(),
            unexpected: actual.difference(&expected).map(|k| k.to_string()).collect(),
        });
    }

    let rep_key = representative_key(classification);
    let representative = assets.get(&rep_key).ok_or_else(|| Error::IncompleteAssets {
        item_id: id.clone(),
        missing: vec![rep_key.clone()],
        unexpected: vec![],
    })?;

    let bounds = TemporalBounds::for_classification(classification)?;

    let mut stac_assets = BTreeMap::new();
    for descriptor in &entry.assets {
        let Some(record) = assets.get(&descriptor.key) else {
            continue;
        };
        let asset = Asset {
            href: record.href.clone(),
            type_: Some(descriptor.media_type.to_string()),
            title: Some(descriptor.title.clone()),
            description: Some(descriptor.description.to_string()),
            roles: descriptor.roles.iter().map(|r| r.to_string()).collect(),
            start_datetime: descriptor.start_datetime.map(parse_timestamp).transpose()?,
            end_datetime: descriptor.end_datetime.map(parse_timestamp).transpose()?,
            file_size: record.stats.file_size,
            projection: Some(record.stats.projection()),
            raster_bands: record.stats.raster_bands(),
        };
        stac_assets.insert(descriptor.key.clone(), asset);
    }

    let (collection, links) = match &options.collection_href {
        Some(href) => (
            Some(group.collection_id().to_string()),
            vec![Link::new("collection", href.clone(), "application/json")],
        ),
        None => (None, Vec::new()),
    };

    Ok(Item {
        type_: "Feature".to_string(),
        stac_version: STAC_VERSION.to_string(),
        stac_extensions: vec![
            extensions::PROJECTION.to_string(),
            extensions::SCIENTIFIC.to_string(),
            extensions::VERSION.to_string(),
            extensions::RASTER.to_string(),
            extensions::FILE.to_string(),
        ],
        id,
        geometry: representative.stats.geometry.clone(),
        bbox: representative.stats.wgs84_bbox.to_vec(),
        properties: ItemProperties {
            datetime: None,
            start_datetime: bounds.start,
            end_datetime: bounds.end,
            projection: representative.stats.projection(),
            sci_doi: registry::DOI.to_string(),
            sci_citation: registry::CITATION.to_string(),
            version: registry::PRODUCT_VERSION.to_string(),
        },
        links,
        assets: stac_assets,
        collection,
    })
}

/// Classify a source path, read all of its assets and build the Item
pub fn create_item(source: &str, options: &ItemOptions, reader: &dyn RasterReader) -> Result<Item> {
    let classified = classify::classify(source)?;
    let assets = assets::assemble(&classified, options.data_root.as_deref(), reader)?;
    let item = build_item(&classified, &assets, options)?;
    info!("Built item {} ({} assets)", item.id, item.assets.len());
    Ok(item)
}

/// Build Items for many sources. Sources that map to the same Item id within
/// a group are built once, from the first source seen.
pub fn create_items<'a>(
    sources: impl IntoIterator<Item = &'a str>,
    options: &ItemOptions,
    reader: &dyn RasterReader,
) -> Result<Vec<Item>> {
    let mut seen = HashSet::new();
    let mut items = Vec::new();
    for source in sources {
        let classified = classify::classify(source)?;
        if !seen.insert((classified.group(), item_id(&classified.classification))) {
            debug!("Skipping {}: item already built", source);
            continue;
        }
        let assets = assets::assemble(&classified, options.data_root.as_deref(), reader)?;
        items.push(build_item(&classified, &assets, options)?);
    }
    info!("Built {} items", items.len());
    Ok(items)
}

/// Path of an Item below `destination`: `<collection-id>/<item-id>.json`.
///
/// The group is recovered from the asset set, which is distinct per group.
pub fn item_path(item: &Item, destination: &Path) -> Result<PathBuf> {
    let group = registry()
        .group_for_assets(&item.asset_keys())
        .ok_or_else(|| Error::InvalidDocument {
            document: item.id.clone(),
            issues: vec!["Asset set does not match any dataset group".to_string()],
        })?;
    Ok(destination.join(group.collection_id()).join(format!("{}.json", item.id)))
}

/// Validate an Item and write it to [`item_path`]. Nothing is written when
/// validation fails.
pub fn write_item(item: &Item, destination: &Path) -> Result<PathBuf> {
    validate::ensure_valid(item)?;
    let path = item_path(item, destination)?;
    catalog::write_json(&path, item)?;
    debug!("Wrote item {} to {:?}", item.id, path);
    Ok(path)
}

/// Write a batch of Items. Every Item is validated and given a distinct path
/// before the first file is written.
pub fn write_items(items: &[Item], destination: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::with_capacity(items.len());
    let mut seen = HashSet::new();
    for item in items {
        validate::ensure_valid(item)?;
        let path = item_path(item, destination)?;
        if !seen.insert(path.clone()) {
            return Err(Error::DuplicateItem {
                id: item.id.clone(),
                path: path.display().to_string(),
            });
        }
        paths.push(path);
    }

    for (item, path) in items.iter().zip(&paths) {
        catalog::write_json(path, item)?;
    }
    info!("Wrote {} items to {:?}", items.len(), destination);
    Ok(paths)
}
