//! STAC document structures and JSON reading/writing

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::{fs, path::Path};
use tracing::debug;

use crate::error::Result;

pub const STAC_VERSION: &str = "1.0.0";

/// Extension schema URIs
pub mod extensions {
    pub const PROJECTION: &str = "https://stac-extensions.github.io/projection/v1.1.0/schema.json";
    pub const SCIENTIFIC: &str = "https://stac-extensions.github.io/scientific/v1.0.0/schema.json";
    pub const VERSION: &str = "https://stac-extensions.github.io/version/v1.0.0/schema.json";
    pub const RASTER: &str = "https://stac-extensions.github.io/raster/v1.1.0/schema.json";
    pub const FILE: &str = "https://stac-extensions.github.io/file/v2.1.0/schema.json";
    pub const ITEM_ASSETS: &str = "https://stac-extensions.github.io/item-assets/v1.0.0/schema.json";
}

/// STAC Item (Feature)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "type")]
    pub type_: String,
    pub stac_version: String,
    #[serde(default)]
    pub stac_extensions: Vec<String>,
    pub id: String,
    pub geometry: geojson::Geometry,
    pub bbox: Vec<f64>,
    pub properties: ItemProperties,
    #[serde(default)]
    pub links: Vec<Link>,
    pub assets: BTreeMap<String, Asset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

impl Item {
    pub fn asset_keys(&self) -> BTreeSet<&str> {
        self.assets.keys().map(String::as_str).collect()
    }
}

/// Item properties. `datetime` is always null; the period is given by
/// `start_datetime`/`end_datetime`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemProperties {
    pub datetime: Option<DateTime<Utc>>,
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: DateTime<Utc>,
    #[serde(flatten)]
    pub projection: Projection,
    #[serde(rename = "sci:doi")]
    pub sci_doi: String,
    #[serde(rename = "sci:citation")]
    pub sci_citation: String,
    pub version: String,
}

/// Projection extension fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    #[serde(rename = "proj:epsg")]
    pub epsg: Option<u32>,
    #[serde(rename = "proj:bbox")]
    pub bbox: Vec<f64>,
    #[serde(rename = "proj:shape")]
    pub shape: Vec<usize>,
    #[serde(rename = "proj:transform")]
    pub transform: Vec<f64>,
}

/// STAC Asset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub href: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_datetime: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_datetime: Option<DateTime<Utc>>,
    #[serde(rename = "file:size", default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(flatten)]
    pub projection: Option<Projection>,
    #[serde(rename = "raster:bands", default, skip_serializing_if = "Vec::is_empty")]
    pub raster_bands: Vec<RasterBand>,
}

/// Raster extension band object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterBand {
    pub data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodata: Option<NoData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spatial_resolution: Option<f64>,
}

/// Nodata value: a number, or one of "nan", "inf", "-inf"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NoData {
    Value(f64),
    Special(String),
}

impl From<f64> for NoData {
    fn from(v: f64) -> Self {
        if v.is_nan() {
            NoData::Special("nan".into())
        } else if v.is_infinite() {
            NoData::Special(if v > 0.0 { "inf" } else { "-inf" }.into())
        } else {
            NoData::Value(v)
        }
    }
}

/// STAC Collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    #[serde(rename = "type")]
    pub type_: String,
    pub id: String,
    pub stac_version: String,
    #[serde(default)]
    pub stac_extensions: Vec<String>,
    pub title: Option<String>,
    pub description: String,
    pub license: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub providers: Vec<Provider>,
    pub extent: Extent,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub assets: BTreeMap<String, Asset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_assets: Option<BTreeMap<String, ItemAssetDefinition>>,
    #[serde(rename = "sci:doi", default, skip_serializing_if = "Option::is_none")]
    pub sci_doi: Option<String>,
    #[serde(rename = "sci:citation", default, skip_serializing_if = "Option::is_none")]
    pub sci_citation: Option<String>,
}

/// Item-assets extension definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemAssetDefinition {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_datetime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_datetime: Option<String>,
}

/// STAC Provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub name: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub url: Option<String>,
}

/// STAC Extent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extent {
    pub spatial: SpatialExtent,
    pub temporal: TemporalExtent,
}

/// Spatial Extent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpatialExtent {
    pub bbox: Vec<Vec<f64>>,
}

/// Temporal Extent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalExtent {
    pub interval: Vec<Vec<Option<String>>>,
}

/// STAC Link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Link {
    pub fn new(rel: &str, href: impl Into<String>, type_: &str) -> Self {
        Link {
            rel: rel.to_string(),
            href: href.into(),
            type_: Some(type_.to_string()),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Serialize a document the way it is written to disk
pub fn to_json_string<T: Serialize>(doc: &T) -> Result<String> {
    let mut json = serde_json::to_string_pretty(doc)?;
    json.push('\n');
    Ok(json)
}

/// Write a document, creating parent directories as needed
pub fn write_json<T: Serialize>(path: &Path, doc: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    debug!("Writing {:?}", path);
    fs::write(path, to_json_string(doc)?)?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_item() {
        let json = r#"{
            "type": "Feature",
            "stac_version": "1.0.0",
            "id": "0000360000-0000480000_1984",
            "geometry": {"type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]},
            "bbox": [0.0, 0.0, 1.0, 1.0],
            "properties": {
                "datetime": null,
                "start_datetime": "1984-01-01T00:00:00Z",
                "end_datetime": "1985-01-01T00:00:00Z",
                "proj:epsg": 4326,
                "proj:bbox": [0.0, 0.0, 1.0, 1.0],
                "proj:shape": [10, 10],
                "proj:transform": [0.1, 0.0, 0.0, 0.0, -0.1, 1.0],
                "sci:doi": "10.1038/nature20584",
                "sci:citation": "citation",
                "version": "v1.3"
            },
            "links": [],
            "assets": {
                "yearly-classification": {"href": "a.tif", "roles": ["data"]}
            }
        }"#;

        let item: Item = serde_json::from_str(json).unwrap();
        assert_eq!(item.id, "0000360000-0000480000_1984");
        assert_eq!(item.properties.projection.epsg, Some(4326));
        assert!(item.properties.datetime.is_none());
        assert_eq!(item.asset_keys().into_iter().collect::<Vec<_>>(), vec!["yearly-classification"]);
        assert!(item.collection.is_none());
    }

    #[test]
    fn test_nodata_special_values() {
        assert_eq!(NoData::from(f64::NAN), NoData::Special("nan".into()));
        assert_eq!(NoData::from(f64::NEG_INFINITY), NoData::Special("-inf".into()));
        assert_eq!(NoData::from(255.0), NoData::Value(255.0));
        assert_eq!(serde_json::to_string(&NoData::from(f64::NAN)).unwrap(), r#""nan""#);
    }

    #[test]
    fn test_asset_without_projection_omits_fields() {
        let asset = Asset {
            href: "guide.pdf".into(),
            type_: Some("application/pdf".into()),
            title: None,
            description: None,
            roles: vec!["metadata".into()],
            start_datetime: None,
            end_datetime: None,
            file_size: None,
            projection: None,
            raster_bands: vec![],
        };
        let value = serde_json::to_value(&asset).unwrap();
        let obj = value.as_object().unwrap();
        assert!(!obj.contains_key("proj:epsg"));
        assert!(!obj.contains_key("raster:bands"));
        assert_eq!(obj["type"], "application/pdf");
    }

    #[test]
    fn test_write_and_read_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("link.json");
        let link = Link::new("child", "./a/collection.json", "application/json").with_title("A");

        write_json(&path, &link).unwrap();
        let back: Link = read_json(&path).unwrap();
        assert_eq!(back, link);
        assert!(fs::read_to_string(&path).unwrap().ends_with('\n'));
    }
}
