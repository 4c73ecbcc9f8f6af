//! Pure aggregation over categorized clients.
//!
//! Raw records enter through [`normalize`], get grouped by one or two
//! [`Dimension`]s, and are filtered and ordered by [`QueryOptions`]. Nothing
//! here performs I/O or keeps state between calls.

pub mod catalog;
pub mod filter;
pub mod grouping;
pub mod normalize;
pub mod summary;
pub mod timeseries;
pub mod types;

pub use filter::{ClientFilter, Facets, QueryOptions, Selection, facets, query, vendor_breakdown};
pub use grouping::{average_conversion, complete, group, group_pair, integration_needs};
pub use normalize::{NormalizedBatch, RawClient, normalize, normalize_values};
pub use summary::{MetricsBundle, Overview, VendorSummary, build_bundle};
pub use timeseries::{monthly_series, year_series};
pub use types::{
    AggregateBucket, CategorizedClient, CategoryAssignment, ClientRecord, Dimension, MonthBucket,
    MonthKey, NOT_AVAILABLE, PairBucket, PairKey, SortBy, VolumeRange,
};
