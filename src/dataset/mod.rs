//! Dataset management.
//!
//! Raw feature matrices are discretized once into a [`BinnedDataset`]; the
//! tree learners only ever see bin ids. [`DataPartition`] tracks which rows
//! sit in which leaf while a tree grows.

pub mod binning;
pub mod bundling;
pub mod dataset;
pub mod metadata;
pub mod partition;

pub use binning::{BinMapper, BinningConfig};
pub use dataset::{BinColumn, BinnedDataset, FeatureGroup};
pub use metadata::Metadata;
pub use partition::DataPartition;
