//! STAC Collection construction from the dataset registry.
//!
//! Collections do not depend on any source file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::catalog::{
    self, extensions, Asset, Collection, Extent, ItemAssetDefinition, Link, Provider, SpatialExtent,
    TemporalExtent, STAC_VERSION,
};
use crate::error::Result;
use crate::registry::{self, registry, CollectionMetadata, DatasetGroup};
use crate::validate;

const COLLECTION_FILE: &str = "collection.json";

/// Collection for one dataset group, with item-asset definitions
pub fn build_collection(group: DatasetGroup) -> Collection {
    let entry = registry().entry(group);

    let item_assets: BTreeMap<String, ItemAssetDefinition> = entry
        .assets
        .iter()
        .map(|a| {
            (
                a.key.clone(),
                ItemAssetDefinition {
                    title: a.title.clone(),
                    description: a.description.to_string(),
                    type_: a.media_type.to_string(),
                    roles: a.roles.iter().map(|r| r.to_string()).collect(),
                    start_datetime: a.start_datetime.map(str::to_string),
                    end_datetime: a.end_datetime.map(str::to_string),
                },
            )
        })
        .collect();

    let mut collection = base_collection(&entry.collection);
    collection.stac_extensions.push(extensions::ITEM_ASSETS.to_string());
    collection.item_assets = Some(item_assets);
    collection.links = vec![
        Link::new("root", format!("../{COLLECTION_FILE}"), "application/json"),
        Link::new("parent", format!("../{COLLECTION_FILE}"), "application/json"),
    ];
    collection
}

/// Root collection linking the four group collections
pub fn build_root_collection() -> Collection {
    let mut collection = base_collection(registry().root());
    collection.links = vec![Link::new("root", format!("./{COLLECTION_FILE}"), "application/json")];
    for group in DatasetGroup::ALL {
        let child = &registry().entry(group).collection;
        collection.links.push(
            Link::new("child", format!("./{}/{COLLECTION_FILE}", child.id), "application/json")
                .with_title(child.title),
        );
    }
    collection
}

fn base_collection(meta: &CollectionMetadata) -> Collection {
    let mut assets = BTreeMap::new();
    assets.insert(
        "guide".to_string(),
        Asset {
            href: registry::GUIDE_HREF.to_string(),
            type_: Some("application/pdf".to_string()),
            title: Some("User Guide".to_string()),
            description: Some("Data users guide and description of the JRC GSW datasets.".to_string()),
            roles: vec!["metadata".to_string()],
            start_datetime: None,
            end_datetime: None,
            file_size: None,
            projection: None,
            raster_bands: vec![],
        },
    );

    Collection {
        type_: "Collection".to_string(),
        id: meta.id.to_string(),
        stac_version: STAC_VERSION.to_string(),
        stac_extensions: vec![extensions::SCIENTIFIC.to_string()],
        title: Some(meta.title.to_string()),
        description: meta.description.to_string(),
        license: registry::LICENSE.to_string(),
        keywords: vec![
            "Global Surface Water".to_string(),
            "JRC".to_string(),
            "Landsat".to_string(),
            "Water".to_string(),
        ],
        providers: vec![Provider {
            name: registry::PROVIDER_NAME.to_string(),
            roles: registry::PROVIDER_ROLES.iter().map(|r| r.to_string()).collect(),
            url: Some(registry::PROVIDER_URL.to_string()),
        }],
        extent: Extent {
            spatial: SpatialExtent {
                bbox: vec![meta.spatial_extent.to_vec()],
            },
            temporal: TemporalExtent {
                interval: vec![vec![Some(meta.start_time.to_string()), Some(meta.end_time.to_string())]],
            },
        },
        links: vec![],
        assets,
        item_assets: None,
        sci_doi: Some(registry::DOI.to_string()),
        sci_citation: Some(registry::CITATION.to_string()),
    }
}

/// Write the root collection to `<destination>/collection.json` and each
/// group collection to `<destination>/<collection-id>/collection.json`.
///
/// All collections are validated before any file is written. Returns the
/// written paths, root first.
pub fn write_collections(destination: &Path) -> Result<Vec<PathBuf>> {
    let mut documents = vec![(destination.join(COLLECTION_FILE), build_root_collection())];
    for group in DatasetGroup::ALL {
        let collection = build_collection(group);
        documents.push((destination.join(&collection.id).join(COLLECTION_FILE), collection));
    }
    for (_, collection) in &documents {
        validate::ensure_valid(collection)?;
    }

    let mut written = Vec::with_capacity(documents.len());
    for (path, collection) in documents {
        catalog::write_json(&path, &collection)?;
        info!("Wrote collection {} to {:?}", collection.id, path);
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_item_assets_match_registry() {
        for group in DatasetGroup::ALL {
            let collection = build_collection(group);
            let keys: Vec<&str> = collection.item_assets.as_ref().unwrap().keys().map(String::as_str).collect();
            let expected: Vec<&str> = registry().entry(group).asset_keys().into_iter().collect();
            assert_eq!(keys, expected);
            assert_eq!(collection.id, group.collection_id());
        }
    }

    #[test]
    fn test_collection_metadata() {
        let collection = build_collection(DatasetGroup::Aggregated);
        assert_eq!(collection.license, "CC-BY-4.0");
        assert_eq!(collection.extent.spatial.bbox, vec![vec![-180.0, -56.0, 180.0, 78.0]]);
        assert_eq!(
            collection.extent.temporal.interval,
            vec![vec![Some("1984-03-01T00:00:00Z".to_string()), Some("2020-12-31T11:59:59Z".to_string())]]
        );
        assert_eq!(collection.providers[0].roles, vec!["producer", "processor", "host"]);
        assert!(collection.assets.contains_key("guide"));
        let seasonality = &collection.item_assets.as_ref().unwrap()["seasonality"];
        assert_eq!(seasonality.start_datetime.as_deref(), Some("2020-01-01T00:00:00Z"));
    }

    #[test]
    fn test_root_collection_links_children() {
        let root = build_root_collection();
        let children: Vec<&str> = root
            .links
            .iter()
            .filter(|l| l.rel == "child")
            .map(|l| l.href.as_str())
            .collect();

        assert_eq!(root.id, "jrc_gsw");
        assert!(root.item_assets.is_none());
        assert_eq!(
            children,
            vec![
                "./jrc_gsw_aggregated/collection.json",
                "./jrc_gsw_monthly_history/collection.json",
                "./jrc_gsw_monthly_recurrence/collection.json",
                "./jrc_gsw_yearly_classification/collection.json",
            ]
        );
    }

    #[test]
    fn test_write_collections_layout() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_collections(dir.path()).unwrap();

        assert_eq!(written.len(), 5);
        assert_eq!(written[0], dir.path().join("collection.json"));
        for path in &written {
            assert!(path.exists(), "{path:?}");
        }

        let back: Collection = catalog::read_json(&written[2]).unwrap();
        assert_eq!(back.id, "jrc_gsw_monthly_history");
        assert_eq!(back.item_assets.unwrap().len(), 1);
    }
}
