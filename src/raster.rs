//! Raster header reading and footprint reprojection.
//!
//! [`RasterReader`] is the seam between the catalog logic and raster I/O.
//! [`GdalReader`] implements it with GDAL; tests substitute in-memory readers.

use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};
use gdal::{Dataset, Metadata};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::catalog::{NoData, Projection, RasterBand};
use crate::error::Result;

/// Decimal places kept for EPSG:4326 coordinates
const GEOMETRY_PRECISION: i32 = 6;

/// Per-band header information
#[derive(Debug, Clone, PartialEq)]
pub struct BandInfo {
    /// STAC raster data type (`uint8`, `int16`, `float32`, ...)
    pub data_type: String,
    /// `area` or `point`
    pub sampling: Option<String>,
    pub nodata: Option<f64>,
    pub spatial_resolution: Option<f64>,
}

impl BandInfo {
    pub fn to_stac(&self) -> RasterBand {
        RasterBand {
            data_type: self.data_type.clone(),
            nodata: self.nodata.map(NoData::from),
            sampling: self.sampling.clone(),
            spatial_resolution: self.spatial_resolution,
        }
    }
}

/// Static attributes of one raster file
#[derive(Debug, Clone, PartialEq)]
pub struct RasterStats {
    /// (rows, cols)
    pub shape: [usize; 2],
    /// Native bounding box [minx, miny, maxx, maxy]
    pub bbox: [f64; 4],
    /// Affine transform [a, b, c, d, e, f]
    pub transform: [f64; 6],
    pub epsg: Option<u32>,
    /// Footprint in EPSG:4326
    pub geometry: geojson::Geometry,
    /// Bounding box of the footprint in EPSG:4326
    pub wgs84_bbox: [f64; 4],
    pub file_size: Option<u64>,
    pub bands: Vec<BandInfo>,
}

impl RasterStats {
    pub fn projection(&self) -> Projection {
        Projection {
            epsg: self.epsg,
            bbox: self.bbox.to_vec(),
            shape: self.shape.to_vec(),
            transform: self.transform.to_vec(),
        }
    }

    pub fn raster_bands(&self) -> Vec<RasterBand> {
        self.bands.iter().map(BandInfo::to_stac).collect()
    }
}

/// Reads raster headers
pub trait RasterReader {
    fn read_header(&self, href: &str) -> Result<RasterStats>;
}

/// GDAL-backed reader. Accepts any path GDAL can open, including `/vsi*` paths.
#[derive(Debug, Default, Clone, Copy)]
pub struct GdalReader;

impl RasterReader for GdalReader {
    fn read_header(&self, href: &str) -> Result<RasterStats> {
        let dataset = Dataset::open(href)?;

        // Geotransform: [origin_x, pixel_width, rotation_x, origin_y, rotation_y, pixel_height]
        let gt = dataset.geo_transform()?;
        let (width, height) = dataset.raster_size();

        let minx = gt[0];
        let maxy = gt[3];
        let maxx = minx + (width as f64 * gt[1]);
        let miny = maxy + (height as f64 * gt[5]);
        let (minx, maxx) = (minx.min(maxx), minx.max(maxx));
        let (miny, maxy) = (miny.min(maxy), miny.max(maxy));

        let mut source_srs = dataset.spatial_ref()?;
        source_srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
        let epsg = source_srs.auth_code().ok().and_then(|c| u32::try_from(c).ok());

        let corners = reproject_corners(&source_srs, [minx, miny, maxx, maxy])?;
        let (geometry, wgs84_bbox) = footprint(&corners);

        let sampling = dataset
            .metadata_item("AREA_OR_POINT", "")
            .map(|s| s.to_lowercase());

        let mut bands = Vec::with_capacity(dataset.raster_count());
        for index in 1..=dataset.raster_count() {
            let band = dataset.rasterband(index)?;
            bands.push(BandInfo {
                data_type: stac_data_type(&band.band_type().name()),
                sampling: sampling.clone(),
                nodata: band.no_data_value(),
                spatial_resolution: Some(gt[1].abs()),
            });
        }

        debug!("Read header of {} ({}x{}, EPSG:{:?})", href, height, width, epsg);

        Ok(RasterStats {
            shape: [height, width],
            bbox: [minx, miny, maxx, maxy],
            transform: [gt[1], gt[2], gt[0], gt[4], gt[5], gt[3]],
            epsg,
            geometry,
            wgs84_bbox,
            file_size: file_size(href),
            bands,
        })
    }
}

/// Transform the four corners of a native bbox to EPSG:4326,
/// counter-clockwise from the lower left
fn reproject_corners(source: &SpatialRef, bbox: [f64; 4]) -> Result<[[f64; 2]; 4]> {
    let [minx, miny, maxx, maxy] = bbox;
    let mut xs = [maxx, maxx, minx, minx];
    let mut ys = [miny, maxy, maxy, miny];

    let mut target = SpatialRef::from_epsg(4326)?;
    target.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);

    if source.auth_code().ok() != Some(4326) {
        let transform = CoordTransform::new(source, &target)?;
        let mut zs = [0.0; 4];
        transform.transform_coords(&mut xs, &mut ys, &mut zs)?;
    }

    Ok([[xs[0], ys[0]], [xs[1], ys[1]], [xs[2], ys[2]], [xs[3], ys[3]]])
}

/// Build a closed polygon and its bbox from four EPSG:4326 corners
pub fn footprint(corners: &[[f64; 2]; 4]) -> (geojson::Geometry, [f64; 4]) {
    let mut ring: Vec<Vec<f64>> = corners
        .iter()
        .map(|[x, y]| vec![round(*x), round(*y)])
        .collect();
    ring.push(ring[0].clone());

    let bbox = [
        ring.iter().map(|p| p[0]).fold(f64::INFINITY, f64::min),
        ring.iter().map(|p| p[1]).fold(f64::INFINITY, f64::min),
        ring.iter().map(|p| p[0]).fold(f64::NEG_INFINITY, f64::max),
        ring.iter().map(|p| p[1]).fold(f64::NEG_INFINITY, f64::max),
    ];

    (geojson::Geometry::new(geojson::Value::Polygon(vec![ring])), bbox)
}

fn round(v: f64) -> f64 {
    let factor = 10f64.powi(GEOMETRY_PRECISION);
    (v * factor).round() / factor
}

/// Map a GDAL data type name to the raster extension vocabulary
fn stac_data_type(gdal_name: &str) -> String {
    match gdal_name {
        "Byte" => "uint8".to_string(),
        "Int8" | "Int16" | "Int32" | "Int64" | "UInt16" | "UInt32" | "UInt64" | "Float32" | "Float64" => {
            gdal_name.to_lowercase()
        }
        "CInt16" | "CInt32" | "CFloat32" | "CFloat64" => gdal_name.to_lowercase(),
        _ => "other".to_string(),
    }
}

/// Size in bytes of a local file; `None` for virtual or remote paths
fn file_size(href: &str) -> Option<u64> {
    fs::metadata(Path::new(href)).ok().map(|m| m.len())
}
