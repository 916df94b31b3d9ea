//! Asset assembly: derive the sibling file of every asset registered for a
//! classified path and read its raster header.

use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::classify::{Classification, ClassifiedPath};
use crate::error::{Error, Result};
use crate::raster::{RasterReader, RasterStats};
use crate::registry::{self, registry, DatasetGroup, VERSION_MARKER};

/// One asset of an Item: where it lives and what its header says
#[derive(Debug, Clone)]
pub struct AssetRecord {
    pub key: String,
    pub href: String,
    pub stats: RasterStats,
}

/// Compute the href of every asset for a classified path, in registry order.
///
/// `data_root` overrides the root parsed from the path for Aggregated
/// sibling lookup.
pub fn asset_hrefs(classified: &ClassifiedPath, data_root: Option<&str>) -> Vec<(String, String)> {
    let entry = registry().entry(classified.group());

    match &classified.classification {
        Classification::Aggregated { tile } => {
            let root = data_root.unwrap_or(classified.root.as_str());
            entry
                .assets
                .iter()
                .map(|asset| {
                    let name = &asset.key;
                    let relative = format!(
                        "{}/{VERSION_MARKER}/{name}/tiles/{name}-{tile}.{}",
                        DatasetGroup::Aggregated.name(),
                        classified.extension
                    );
                    (asset.key.clone(), join(root, &relative))
                })
                .collect()
        }
        Classification::MonthlyRecurrence { .. } => entry
            .assets
            .iter()
            .filter_map(|asset| {
                classified
                    .with_recurrence_dir(&asset.key)
                    .map(|href| (asset.key.clone(), href))
            })
            .collect(),
        Classification::MonthlyHistory { .. } | Classification::YearlyClassification { .. } => entry
            .assets
            .iter()
            .map(|asset| (asset.key.clone(), classified.source.clone()))
            .collect(),
    }
}

/// Read the header of every asset belonging to the classified path.
///
/// Fails with [`Error::AssetNotFound`] on the first asset that cannot be read.
pub fn assemble(
    classified: &ClassifiedPath,
    data_root: Option<&str>,
    reader: &dyn RasterReader,
) -> Result<BTreeMap<String, AssetRecord>> {
    let hrefs = asset_hrefs(classified, data_root);
    info!(
        "Assembling {} assets for {} tile {}",
        hrefs.len(),
        classified.group(),
        classified.tile()
    );

    let mut assets = BTreeMap::new();
    for (key, href) in hrefs {
        debug!("Reading asset {} from {}", key, href);
        let stats = reader.read_header(&href).map_err(|e| Error::AssetNotFound {
            key: key.clone(),
            href: href.clone(),
            reason: e.to_string(),
        })?;
        assets.insert(key.clone(), AssetRecord { key, href, stats });
    }

    Ok(assets)
}

/// Key of the asset whose header defines the Item geometry.
///
/// MonthlyRecurrence Items span all twelve months, so January is used
/// whichever month the source path names.
pub fn representative_key(classification: &Classification) -> String {
    match classification {
        Classification::Aggregated { .. } => registry::CHANGE_KEY.to_string(),
        Classification::MonthlyHistory { .. } => registry::MONTHLY_HISTORY_KEY.to_string(),
        Classification::MonthlyRecurrence { .. } => registry::recurrence_key(1),
        Classification::YearlyClassification { .. } => registry::YEARLY_CLASSIFICATION_KEY.to_string(),
    }
}

fn join(root: &str, relative: &str) -> String {
    if root.is_empty() {
        relative.to_string()
    } else {
        format!("{}/{}", root.trim_end_matches('/'), relative)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::raster::footprint;
    use std::cell::RefCell;
    use std::collections::HashSet;

    /// Reader returning a fixed header for every href, recording the reads
    #[derive(Default)]
    pub(crate) struct FakeReader {
        pub(crate) missing: HashSet<String>,
        pub(crate) reads: RefCell<Vec<String>>,
    }

    pub(crate) fn stats(x_origin: f64) -> RasterStats {
        let (geometry, wgs84_bbox) = footprint(&[
            [x_origin + 10.0, 30.0],
            [x_origin + 10.0, 40.0],
            [x_origin, 40.0],
            [x_origin, 30.0],
        ]);
        RasterStats {
            shape: [40000, 40000],
            bbox: [x_origin, 30.0, x_origin + 10.0, 40.0],
            transform: [0.00025, 0.0, x_origin, 0.0, -0.00025, 40.0],
            epsg: Some(4326),
            geometry,
            wgs84_bbox,
            file_size: Some(1024),
            bands: vec![crate::raster::BandInfo {
                data_type: "uint8".into(),
                sampling: Some("area".into()),
                nodata: Some(255.0),
                spatial_resolution: Some(0.00025),
            }],
        }
    }

    impl RasterReader for FakeReader {
        fn read_header(&self, href: &str) -> Result<RasterStats> {
            self.reads.borrow_mut().push(href.to_string());
            if self.missing.contains(href) {
                return Err(Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "no such file")));
            }
            // Distinct headers per asset so the representative choice is observable
            let x_origin = if href.contains("change") || href.contains("monthlyRecurrence1/") {
                0.0
            } else {
                20.0
            };
            Ok(stats(x_origin))
        }
    }

    #[test]
    fn test_aggregated_hrefs() {
        let c = classify("/data/Aggregated/LATEST/change/tiles/change-0000360000-0000480000.tif").unwrap();
        let hrefs = asset_hrefs(&c, None);

        assert_eq!(hrefs.len(), 6);
        assert!(hrefs.contains(&(
            "occurrence".to_string(),
            "/data/Aggregated/LATEST/occurrence/tiles/occurrence-0000360000-0000480000.tif".to_string()
        )));
        assert!(hrefs.iter().all(|(_, href)| href.ends_with("-0000360000-0000480000.tif")));
    }

    #[test]
    fn test_aggregated_hrefs_with_data_root() {
        let c = classify("Aggregated/LATEST/change/tiles/change-0000360000-0000480000.tif").unwrap();
        let hrefs = asset_hrefs(&c, Some("/mnt/gsw/"));
        assert!(hrefs.iter().any(|(k, h)| k == "seasonality"
            && h == "/mnt/gsw/Aggregated/LATEST/seasonality/tiles/seasonality-0000360000-0000480000.tif"));
    }

    #[test]
    fn test_monthly_recurrence_hrefs_cover_all_months() {
        let c = classify("MonthlyRecurrence/LATEST/tiles/monthlyRecurrence4/0000360000-0000480000.tif").unwrap();
        let hrefs = asset_hrefs(&c, None);

        assert_eq!(hrefs.len(), 24);
        assert!(hrefs.contains(&(
            "has_observations12".to_string(),
            "MonthlyRecurrence/LATEST/tiles/has_observations12/0000360000-0000480000.tif".to_string()
        )));
        assert!(hrefs.iter().all(|(key, href)| href.contains(&format!("/{key}/"))));
    }

    #[test]
    fn test_single_asset_groups_use_source() {
        let source = "MonthlyHistory/LATEST/tiles/1984/1984_04/1984_04-0000360000-0000480000.tif";
        let c = classify(source).unwrap();
        assert_eq!(asset_hrefs(&c, Some("/ignored")), vec![("monthly-history".to_string(), source.to_string())]);
    }

    #[test]
    fn test_assemble_reads_each_asset_once() {
        let c = classify("Aggregated/LATEST/change/tiles/change-0000360000-0000480000.tif").unwrap();
        let reader = FakeReader::default();

        let assets = assemble(&c, None, &reader).unwrap();

        assert_eq!(assets.len(), 6);
        assert_eq!(reader.reads.borrow().len(), 6);
        assert_eq!(assets["transitions"].key, "transitions");
    }

    #[test]
    fn test_assemble_missing_asset() {
        let c = classify("Aggregated/LATEST/change/tiles/change-0000360000-0000480000.tif").unwrap();
        let missing = "Aggregated/LATEST/extent/tiles/extent-0000360000-0000480000.tif".to_string();
        let reader = FakeReader {
            missing: HashSet::from([missing.clone()]),
            ..Default::default()
        };

        let err = assemble(&c, None, &reader).unwrap_err();
        match err {
            Error::AssetNotFound { key, href, .. } => {
                assert_eq!(key, "extent");
                assert_eq!(href, missing);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_representative_key() {
        for source in [
            "MonthlyRecurrence/LATEST/tiles/has_observations7/0000360000-0000480000.tif",
            "MonthlyRecurrence/LATEST/tiles/monthlyRecurrence12/0000360000-0000480000.tif",
        ] {
            let c = classify(source).unwrap();
            assert_eq!(representative_key(&c.classification), "monthlyRecurrence1");
        }
        let c = classify("Aggregated/LATEST/occurrence/tiles/occurrence-0000360000-0000480000.tif").unwrap();
        assert_eq!(representative_key(&c.classification), "change");
    }
}
