//! Path classification.
//!
//! Infers the dataset group, tile identity and embedded year/month of a
//! source raster purely from its path. The file itself is never opened.
//!
//! Recognized layouts (relative to a data root):
//!
//! ```text
//! Aggregated/LATEST/change/tiles/change-0000360000-0000480000.tif
//! MonthlyHistory/LATEST/tiles/1984/1984_04/1984_04-0000360000-0000480000.tif
//! MonthlyRecurrence/LATEST/tiles/monthlyRecurrence4/0000360000-0000480000.tif
//! YearlyClassification/LATEST/tiles/yearlyClassification1984/yearlyClassification1984-0000360000-0000480000.tif
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::registry::{DatasetGroup, VERSION_MARKER};

static RECURRENCE_DIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:monthlyRecurrence|has_observations)(\d{1,2})$").expect("valid regex"));

static YEARLY_DIR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^yearlyClassification(\d{4})$").expect("valid regex"));

/// Group-specific tokens extracted from a path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Classification {
    Aggregated { tile: String },
    MonthlyHistory { tile: String, year: i32, month: u32 },
    MonthlyRecurrence { tile: String, month: u32 },
    YearlyClassification { tile: String, year: i32 },
}

impl Classification {
    pub fn group(&self) -> DatasetGroup {
        match self {
            Classification::Aggregated { .. } => DatasetGroup::Aggregated,
            Classification::MonthlyHistory { .. } => DatasetGroup::MonthlyHistory,
            Classification::MonthlyRecurrence { .. } => DatasetGroup::MonthlyRecurrence,
            Classification::YearlyClassification { .. } => DatasetGroup::YearlyClassification,
        }
    }

    pub fn tile(&self) -> &str {
        match self {
            Classification::Aggregated { tile }
            | Classification::MonthlyHistory { tile, .. }
            | Classification::MonthlyRecurrence { tile, .. }
            | Classification::YearlyClassification { tile, .. } => tile,
        }
    }

    pub fn year(&self) -> Option<i32> {
        match self {
            Classification::MonthlyHistory { year, .. } | Classification::YearlyClassification { year, .. } => {
                Some(*year)
            }
            _ => None,
        }
    }

    pub fn month(&self) -> Option<u32> {
        match self {
            Classification::MonthlyHistory { month, .. } | Classification::MonthlyRecurrence { month, .. } => {
                Some(*month)
            }
            _ => None,
        }
    }

    /// `(group, tile, year, month)` view of the classification
    pub fn parts(&self) -> (DatasetGroup, &str, Option<i32>, Option<u32>) {
        (self.group(), self.tile(), self.year(), self.month())
    }
}

/// A source path together with its classification
#[derive(Debug, Clone)]
pub struct ClassifiedPath {
    /// The path as given
    pub source: String,
    /// Everything before the group directory (may be empty)
    pub root: String,
    /// File extension of the source, without the dot
    pub extension: String,
    pub classification: Classification,
    segments: Vec<String>,
    recurrence_dir: Option<usize>,
}

impl ClassifiedPath {
    pub fn group(&self) -> DatasetGroup {
        self.classification.group()
    }

    pub fn tile(&self) -> &str {
        self.classification.tile()
    }

    /// Rebuild the source path with the monthly recurrence directory segment
    /// replaced. Returns `None` for other groups.
    pub fn with_recurrence_dir(&self, dir_name: &str) -> Option<String> {
        let index = self.recurrence_dir?;
        let mut segments = self.segments.clone();
        segments[index] = dir_name.to_string();
        Some(segments.join("/"))
    }
}

/// Classify a raster path by its directory and filename conventions.
pub fn classify(path: &str) -> Result<ClassifiedPath> {
    let segments: Vec<String> = path.split('/').map(str::to_string).collect();

    let marker = segments
        .iter()
        .position(|s| s == VERSION_MARKER)
        .filter(|&i| i > 0 && !segments[i - 1].is_empty())
        .ok_or_else(|| Error::UnrecognizedPath { path: path.to_string() })?;

    let group: DatasetGroup = segments[marker - 1].parse()?;
    let root = segments[..marker - 1].join("/");

    let filename = segments
        .last()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::malformed(path, "path has no filename"))?;
    let (stem, extension) = match filename.rsplit_once('.') {
        Some((stem, ext)) => (stem, ext),
        None => (filename.as_str(), ""),
    };
    let tile = tile_from_stem(path, stem)?;

    // Directory segments between the marker and the filename
    let dirs = segments.get(marker + 1..segments.len() - 1).unwrap_or(&[]);

    let mut recurrence_dir = None;
    let classification = match group {
        DatasetGroup::Aggregated => Classification::Aggregated { tile },
        DatasetGroup::MonthlyHistory => {
            let (year, month) = year_month_from_stem(path, stem)?;
            Classification::MonthlyHistory { tile, year, month }
        }
        DatasetGroup::MonthlyRecurrence => {
            let (offset, month) = dirs
                .iter()
                .enumerate()
                .find_map(|(i, d)| {
                    RECURRENCE_DIR
                        .captures(d)
                        .and_then(|c| c[1].parse::<u32>().ok())
                        .map(|m| (i, m))
                })
                .ok_or_else(|| Error::malformed(path, "no monthlyRecurrence<N> or has_observations<N> directory"))?;
            if !(1..=12).contains(&month) {
                return Err(Error::malformed(path, format!("month {month} out of range")));
            }
            recurrence_dir = Some(marker + 1 + offset);
            Classification::MonthlyRecurrence { tile, month }
        }
        DatasetGroup::YearlyClassification => {
            let year = dirs
                .iter()
                .find_map(|d| YEARLY_DIR.captures(d).and_then(|c| c[1].parse::<i32>().ok()))
                .ok_or_else(|| Error::malformed(path, "no yearlyClassification<N> directory"))?;
            Classification::YearlyClassification { tile, year }
        }
    };

    debug!("Classified {} as {:?}", path, classification);

    Ok(ClassifiedPath {
        source: path.to_string(),
        root,
        extension: extension.to_string(),
        classification,
        segments,
        recurrence_dir,
    })
}

/// Tile id: last two `-` tokens of the stem, e.g. `0000360000-0000480000`
fn tile_from_stem(path: &str, stem: &str) -> Result<String> {
    let tokens: Vec<&str> = stem.split('-').collect();
    match tokens.as_slice() {
        [.., lon, lat] if !lon.is_empty() && !lat.is_empty() => Ok(format!("{lon}-{lat}")),
        _ => Err(Error::malformed(path, format!("cannot extract tile id from '{stem}'"))),
    }
}

/// Year and month from a `YYYY_MM-...` stem
fn year_month_from_stem(path: &str, stem: &str) -> Result<(i32, u32)> {
    let period = stem.split('-').next().unwrap_or_default();
    let mut parts = period.split('_');

    let year = parts
        .next()
        .and_then(|y| y.parse::<i32>().ok())
        .ok_or_else(|| Error::malformed(path, format!("cannot parse year from '{period}'")))?;
    let month = parts
        .next()
        .and_then(|m| m.parse::<u32>().ok())
        .ok_or_else(|| Error::malformed(path, format!("cannot parse month from '{period}'")))?;

    if !(1..=12).contains(&month) {
        return Err(Error::malformed(path, format!("month {month} out of range")));
    }
    Ok((year, month))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TILE: &str = "0000360000-0000480000";

    #[test]
    fn test_classify_aggregated() {
        let c = classify("Aggregated/LATEST/change/tiles/change-0000360000-0000480000.tif").unwrap();
        assert_eq!(c.classification.parts(), (DatasetGroup::Aggregated, TILE, None, None));
        assert_eq!(c.root, "");
        assert_eq!(c.extension, "tif");
    }

    #[test]
    fn test_classify_monthly_history() {
        let c = classify("MonthlyHistory/LATEST/tiles/1984/1984_04/1984_04-0000360000-0000480000.tif").unwrap();
        assert_eq!(
            c.classification.parts(),
            (DatasetGroup::MonthlyHistory, TILE, Some(1984), Some(4))
        );
    }

    #[test]
    fn test_classify_monthly_recurrence() {
        let c = classify("/data/gsw/MonthlyRecurrence/LATEST/tiles/has_observations11/0000360000-0000480000.tif")
            .unwrap();
        assert_eq!(
            c.classification.parts(),
            (DatasetGroup::MonthlyRecurrence, TILE, None, Some(11))
        );
        assert_eq!(c.root, "/data/gsw");
        assert_eq!(
            c.with_recurrence_dir("monthlyRecurrence3").unwrap(),
            "/data/gsw/MonthlyRecurrence/LATEST/tiles/monthlyRecurrence3/0000360000-0000480000.tif"
        );
    }

    #[test]
    fn test_classify_yearly_classification() {
        let c = classify(
            "YearlyClassification/LATEST/tiles/yearlyClassification1984/yearlyClassification1984-0000360000-0000480000.tif",
        )
        .unwrap();
        assert_eq!(
            c.classification.parts(),
            (DatasetGroup::YearlyClassification, TILE, Some(1984), None)
        );
        assert!(c.with_recurrence_dir("monthlyRecurrence1").is_none());
    }

    #[test]
    fn test_classify_url_root() {
        let c = classify("s3://bucket/gsw/Aggregated/LATEST/occurrence/tiles/occurrence-0000360000-0000480000.tif")
            .unwrap();
        assert_eq!(c.root, "s3://bucket/gsw");
        assert_eq!(c.tile(), TILE);
    }

    #[test]
    fn test_missing_marker() {
        let err = classify("Aggregated/change/tiles/change-0000360000-0000480000.tif").unwrap_err();
        assert!(matches!(err, Error::UnrecognizedPath { .. }));
    }

    #[test]
    fn test_marker_without_group() {
        let err = classify("LATEST/change-0000360000-0000480000.tif").unwrap_err();
        assert!(matches!(err, Error::UnrecognizedPath { .. }));
    }

    #[test]
    fn test_absolute_marker_without_group() {
        let err = classify("/LATEST/tiles/change-0000360000-0000480000.tif").unwrap_err();
        assert!(matches!(err, Error::UnrecognizedPath { .. }));
    }

    #[test]
    fn test_unknown_group() {
        let err = classify("Seasonal/LATEST/tiles/x-0000360000-0000480000.tif").unwrap_err();
        assert!(matches!(err, Error::UnknownGroup(ref g) if g == "Seasonal"));
    }

    #[test]
    fn test_filename_without_tile() {
        let err = classify("Aggregated/LATEST/change/tiles/change.tif").unwrap_err();
        assert!(matches!(err, Error::MalformedFilename { .. }));
    }

    #[test]
    fn test_monthly_history_bad_month() {
        let err = classify("MonthlyHistory/LATEST/tiles/1984/1984_13/1984_13-0000360000-0000480000.tif").unwrap_err();
        assert!(matches!(err, Error::MalformedFilename { .. }));

        let err = classify("MonthlyHistory/LATEST/tiles/1984/x/abc-0000360000-0000480000.tif").unwrap_err();
        assert!(matches!(err, Error::MalformedFilename { .. }));
    }

    #[test]
    fn test_monthly_recurrence_without_month_dir() {
        let err = classify("MonthlyRecurrence/LATEST/tiles/0000360000-0000480000.tif").unwrap_err();
        assert!(matches!(err, Error::MalformedFilename { .. }));

        let err = classify("MonthlyRecurrence/LATEST/tiles/monthlyRecurrence13/0000360000-0000480000.tif").unwrap_err();
        assert!(matches!(err, Error::MalformedFilename { .. }));
    }

    #[test]
    fn test_yearly_without_year_dir() {
        let err = classify("YearlyClassification/LATEST/tiles/yearlyClassification1984-0000360000-0000480000.tif")
            .unwrap_err();
        assert!(matches!(err, Error::MalformedFilename { .. }));
    }

    #[test]
    fn test_equivalent_paths_share_classification() {
        let a = classify("MonthlyRecurrence/LATEST/tiles/monthlyRecurrence4/0000360000-0000480000.tif").unwrap();
        let b = classify("/mnt/MonthlyRecurrence/LATEST/tiles/has_observations4/0000360000-0000480000.tif").unwrap();
        assert_eq!(a.classification, b.classification);
    }
}
