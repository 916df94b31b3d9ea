//! Static dataset registry: collection metadata and expected assets per
//! dataset group of the JRC Global Surface Water archive.
//!
//! The registry is built once on first access and is read-only afterwards.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;

use crate::error::{Error, Result};

// =============================================================================
// Provenance & Constants
// =============================================================================

/// Directory segment that marks the dataset version in archive paths.
pub const VERSION_MARKER: &str = "LATEST";

/// Product version recorded on every Item.
pub const PRODUCT_VERSION: &str = "v1.3";

pub const DOI: &str = "10.1038/nature20584";
pub const CITATION: &str = "Jean-Francois Pekel, Andrew Cottam, Noel Gorelick, Alan S. Belward, High-resolution mapping of global surface water and its long-term changes. Nature 540, 418-422 (2016)";
pub const LICENSE: &str = "CC-BY-4.0";

pub const PROVIDER_NAME: &str = "Joint Research Centre - Global Surface Water";
pub const PROVIDER_ROLES: &[&str] = &["producer", "processor", "host"];
pub const PROVIDER_URL: &str = "https://global-surface-water.appspot.com/";

pub const GUIDE_HREF: &str =
    "https://storage.cloud.google.com/global-surface-water/downloads_ancillary/DataUsersGuidev2020.pdf";

pub const COG_MEDIA_TYPE: &str = "image/tiff; application=geotiff; profile=cloud-optimized";

pub const SPATIAL_EXTENT: [f64; 4] = [-180.0, -56.0, 180.0, 78.0];
pub const START_TIME: &str = "1984-03-01T00:00:00Z";
pub const END_TIME: &str = "2020-12-31T11:59:59Z";

/// Seasonality covers a single year, unlike the other aggregated layers.
pub const SEASONALITY_START_TIME: &str = "2020-01-01T00:00:00Z";
pub const SEASONALITY_END_TIME: &str = "2020-12-31T11:59:59Z";

pub const OCCURRENCE_KEY: &str = "occurrence";
pub const CHANGE_KEY: &str = "change";
pub const SEASONALITY_KEY: &str = "seasonality";
pub const RECURRENCE_KEY: &str = "recurrence";
pub const TRANSITIONS_KEY: &str = "transitions";
pub const EXTENT_KEY: &str = "extent";
pub const MONTHLY_HISTORY_KEY: &str = "monthly-history";
pub const MONTHLY_RECURRENCE_KEY: &str = "monthlyRecurrence";
pub const MONTHLY_RECURRENCE_OBSERVATIONS_KEY: &str = "has_observations";
pub const YEARLY_CLASSIFICATION_KEY: &str = "yearly-classification";

// =============================================================================
// Data Structures
// =============================================================================

/// The four dataset groups of the archive. Each maps to one Collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DatasetGroup {
    Aggregated,
    MonthlyHistory,
    MonthlyRecurrence,
    YearlyClassification,
}

impl DatasetGroup {
    pub const ALL: [DatasetGroup; 4] = [
        DatasetGroup::Aggregated,
        DatasetGroup::MonthlyHistory,
        DatasetGroup::MonthlyRecurrence,
        DatasetGroup::YearlyClassification,
    ];

    /// Directory name of the group in the archive layout.
    pub fn name(self) -> &'static str {
        match self {
            DatasetGroup::Aggregated => "Aggregated",
            DatasetGroup::MonthlyHistory => "MonthlyHistory",
            DatasetGroup::MonthlyRecurrence => "MonthlyRecurrence",
            DatasetGroup::YearlyClassification => "YearlyClassification",
        }
    }

    pub fn collection_id(self) -> &'static str {
        registry().entry(self).collection.id
    }
}

impl fmt::Display for DatasetGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DatasetGroup {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DatasetGroup::ALL
            .into_iter()
            .find(|g| g.name() == s)
            .ok_or_else(|| Error::UnknownGroup(s.to_string()))
    }
}

/// Collection-level metadata
#[derive(Debug, Clone)]
pub struct CollectionMetadata {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub spatial_extent: [f64; 4],
    pub start_time: &'static str,
    pub end_time: &'static str,
}

/// Descriptive metadata for one asset key
#[derive(Debug, Clone)]
pub struct AssetDescriptor {
    pub key: String,
    pub title: String,
    pub description: &'static str,
    pub media_type: &'static str,
    pub roles: &'static [&'static str],
    /// Fixed temporal range for assets whose period differs from the Item's.
    pub start_datetime: Option<&'static str>,
    pub end_datetime: Option<&'static str>,
}

impl AssetDescriptor {
    fn cog(key: impl Into<String>, title: impl Into<String>, description: &'static str) -> Self {
        AssetDescriptor {
            key: key.into(),
            title: title.into(),
            description,
            media_type: COG_MEDIA_TYPE,
            roles: &["data"],
            start_datetime: None,
            end_datetime: None,
        }
    }
}

/// Registry entry for one dataset group
#[derive(Debug, Clone)]
pub struct DatasetEntry {
    pub group: DatasetGroup,
    pub collection: CollectionMetadata,
    /// Assets in registration order
    pub assets: Vec<AssetDescriptor>,
}

impl DatasetEntry {
    pub fn asset(&self, key: &str) -> Option<&AssetDescriptor> {
        self.assets.iter().find(|a| a.key == key)
    }

    pub fn asset_keys(&self) -> BTreeSet<&str> {
        self.assets.iter().map(|a| a.key.as_str()).collect()
    }
}

/// Read-only registry of all dataset groups
#[derive(Debug)]
pub struct Registry {
    root: CollectionMetadata,
    aggregated: DatasetEntry,
    monthly_history: DatasetEntry,
    monthly_recurrence: DatasetEntry,
    yearly_classification: DatasetEntry,
}

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::build);

/// Process-wide registry
pub fn registry() -> &'static Registry {
    &REGISTRY
}

/// Look up a dataset group by its directory name
pub fn lookup(group: &str) -> Result<&'static DatasetEntry> {
    registry().lookup(group)
}

impl Registry {
    pub fn root(&self) -> &CollectionMetadata {
        &self.root
    }

    pub fn entry(&self, group: DatasetGroup) -> &DatasetEntry {
        match group {
            DatasetGroup::Aggregated => &self.aggregated,
            DatasetGroup::MonthlyHistory => &self.monthly_history,
            DatasetGroup::MonthlyRecurrence => &self.monthly_recurrence,
            DatasetGroup::YearlyClassification => &self.yearly_classification,
        }
    }

    pub fn lookup(&self, group: &str) -> Result<&DatasetEntry> {
        let group: DatasetGroup = group.parse()?;
        Ok(self.entry(group))
    }

    pub fn entries(&self) -> impl Iterator<Item = &DatasetEntry> {
        DatasetGroup::ALL.into_iter().map(|g| self.entry(g))
    }

    /// Group whose registered asset set is exactly `keys`
    pub fn group_for_assets(&self, keys: &BTreeSet<&str>) -> Option<DatasetGroup> {
        self.entries().find(|e| e.asset_keys() == *keys).map(|e| e.group)
    }

    fn build() -> Self {
        Registry {
            root: CollectionMetadata {
                id: "jrc_gsw",
                title: "European Commission Joint Research Centre - Global Surface Water",
                description: "Global surface water collections (aggregated, monthly history, monthly recurrence, and yearly classification)",
                spatial_extent: SPATIAL_EXTENT,
                start_time: START_TIME,
                end_time: END_TIME,
            },
            aggregated: aggregated_entry(),
            monthly_history: DatasetEntry {
                group: DatasetGroup::MonthlyHistory,
                collection: CollectionMetadata {
                    id: "jrc_gsw_monthly_history",
                    title: "European Commission Joint Research Centre - Global Surface Water (Monthly History)",
                    description: "Historical water detection on a month-by-month basis.",
                    spatial_extent: SPATIAL_EXTENT,
                    start_time: START_TIME,
                    end_time: END_TIME,
                },
                assets: vec![AssetDescriptor::cog(
                    MONTHLY_HISTORY_KEY,
                    "Monthly History",
                    "Historical water detection on a month-by-month basis",
                )],
            },
            monthly_recurrence: monthly_recurrence_entry(),
            yearly_classification: DatasetEntry {
                group: DatasetGroup::YearlyClassification,
                collection: CollectionMetadata {
                    id: "jrc_gsw_yearly_classification",
                    title: "European Commission Joint Research Centre - Global Surface Water (Yearly Classification)",
                    description: "Year-by-year classification of the seasonality of water based on the occurrence values detected throughout the year.",
                    spatial_extent: SPATIAL_EXTENT,
                    start_time: START_TIME,
                    end_time: END_TIME,
                },
                assets: vec![AssetDescriptor::cog(
                    YEARLY_CLASSIFICATION_KEY,
                    "Yearly Classification",
                    "Year-by-year classification of the seasonality of water based on the occurrence values detected throughout the year.",
                )],
            },
        }
    }
}

fn aggregated_entry() -> DatasetEntry {
    let mut seasonality = AssetDescriptor::cog(
        SEASONALITY_KEY,
        "Seasonality",
        "Number of months that water was present from January 2020 to December 2020",
    );
    seasonality.start_datetime = Some(SEASONALITY_START_TIME);
    seasonality.end_datetime = Some(SEASONALITY_END_TIME);

    DatasetEntry {
        group: DatasetGroup::Aggregated,
        collection: CollectionMetadata {
            id: "jrc_gsw_aggregated",
            title: "European Commission Joint Research Centre - Global Surface Water (Aggregated)",
            description: "Global surface water datasets (occurrence, change, seasonality, recurrence, transitions and maximum extent) aggregated over 1984 - 2020.",
            spatial_extent: SPATIAL_EXTENT,
            start_time: START_TIME,
            end_time: END_TIME,
        },
        assets: vec![
            AssetDescriptor::cog(
                OCCURRENCE_KEY,
                "Occurrence",
                "Frequency with which water was present from March 1984 to December 2020",
            ),
            AssetDescriptor::cog(
                CHANGE_KEY,
                "Occurrence Change Intensity",
                "Change in water occurrence between the two periods (1984-1999) and (2000-2020)",
            ),
            seasonality,
            AssetDescriptor::cog(
                RECURRENCE_KEY,
                "Recurrence",
                "Frequency with which water returns from year to year",
            ),
            AssetDescriptor::cog(
                TRANSITIONS_KEY,
                "Transitions",
                "Categorical change in surface water status from 1984 to 2020",
            ),
            AssetDescriptor::cog(
                EXTENT_KEY,
                "Maximum Water Extent",
                "Binary indicator of whether water was ever present (from 1984-2020)",
            ),
        ],
    }
}

fn monthly_recurrence_entry() -> DatasetEntry {
    let mut assets = Vec::with_capacity(24);
    for month in 1..=12u8 {
        let month_name = chrono::Month::try_from(month).map_or("", |m| m.name());
        assets.push(AssetDescriptor::cog(
            recurrence_key(u32::from(month)),
            format!("Monthly Recurrence ({month_name})"),
            "Monthly measures of the seasonality of water based on the occurrence values detected in that month over all years.",
        ));
        assets.push(AssetDescriptor::cog(
            observations_key(u32::from(month)),
            format!("Monthly Recurrence Observations ({month_name})"),
            "Binary indicator of presence of seasonal water based on the occurrence values detected in that month over all years.",
        ));
    }

    DatasetEntry {
        group: DatasetGroup::MonthlyRecurrence,
        collection: CollectionMetadata {
            id: "jrc_gsw_monthly_recurrence",
            title: "European Commission Joint Research Centre - Global Surface Water (Monthly Recurrence)",
            description: "Monthly measures of the seasonality of water based on the occurrence values detected in that month over all years.",
            spatial_extent: SPATIAL_EXTENT,
            start_time: START_TIME,
            end_time: END_TIME,
        },
        assets,
    }
}

/// Asset key (and directory name) of the monthly recurrence layer for a month
pub fn recurrence_key(month: u32) -> String {
    format!("{MONTHLY_RECURRENCE_KEY}{month}")
}

/// Asset key (and directory name) of the observation mask for a month
pub fn observations_key(month: u32) -> String {
    format!("{MONTHLY_RECURRENCE_OBSERVATIONS_KEY}{month}")
}
