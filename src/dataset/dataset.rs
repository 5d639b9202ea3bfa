//! Binned training data.
//!
//! A [`BinnedDataset`] stores the bin id of every (row, feature) pair
//! grouped into columns. A column holds either one feature or a bundle of
//! mutually exclusive features, and is stored dense or sparse depending on
//! how many rows sit in its default bin. The dataset is immutable once
//! built and is shared read-only by every histogram computation.

use crate::config::Config;
use crate::core::constants::MAX_BIN_PER_BUNDLE;
use crate::core::error::{LightGBMError, Result};
use crate::core::types::*;
use crate::dataset::binning::{construct_bin_mappers, BinMapper, BinningConfig};
use crate::dataset::bundling::{find_bundles, BundleCandidate};
use crate::dataset::metadata::Metadata;
use ndarray::ArrayView2;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;

/// Storage of one column of bin ids.
#[derive(Debug, Clone, PartialEq)]
pub enum BinColumn {
    /// One bin per row
    Dense(Vec<u16>),
    /// Only rows whose bin differs from `default_bin`, ascending by row
    Sparse {
        rows: Vec<DataSize>,
        bins: Vec<u16>,
        default_bin: u16,
    },
}

impl BinColumn {
    /// Choose dense or sparse storage for a full column of bins.
    pub fn from_bins(bins: Vec<u16>, default_bin: u16, sparse_threshold: f64) -> Self {
        let num_default = bins.iter().filter(|&&b| b == default_bin).count();
        let default_rate = if bins.is_empty() {
            0.0
        } else {
            num_default as f64 / bins.len() as f64
        };
        if default_rate < sparse_threshold || sparse_threshold >= 1.0 {
            return BinColumn::Dense(bins);
        }
        let mut rows = Vec::with_capacity(bins.len() - num_default);
        let mut values = Vec::with_capacity(bins.len() - num_default);
        for (row, &bin) in bins.iter().enumerate() {
            if bin != default_bin {
                rows.push(row as DataSize);
                values.push(bin);
            }
        }
        BinColumn::Sparse {
            rows,
            bins: values,
            default_bin,
        }
    }

    /// Bin of one row.
    #[inline]
    pub fn get(&self, row: DataSize) -> u16 {
        match self {
            BinColumn::Dense(bins) => bins[row as usize],
            BinColumn::Sparse {
                rows,
                bins,
                default_bin,
            } => match rows.binary_search(&row) {
                Ok(i) => bins[i],
                Err(_) => *default_bin,
            },
        }
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self, BinColumn::Sparse { .. })
    }

    /// Column restricted to ascending `rows`, renumbered from zero.
    pub fn subset(&self, rows: &[DataSize]) -> Self {
        match self {
            BinColumn::Dense(bins) => {
                BinColumn::Dense(rows.iter().map(|&r| bins[r as usize]).collect())
            }
            BinColumn::Sparse {
                rows: stored,
                bins,
                default_bin,
            } => {
                let mut new_rows = Vec::new();
                let mut new_bins = Vec::new();
                let mut j = 0usize;
                for (new_row, &r) in rows.iter().enumerate() {
                    while j < stored.len() && stored[j] < r {
                        j += 1;
                    }
                    if j < stored.len() && stored[j] == r {
                        new_rows.push(new_row as DataSize);
                        new_bins.push(bins[j]);
                    }
                }
                BinColumn::Sparse {
                    rows: new_rows,
                    bins: new_bins,
                    default_bin: *default_bin,
                }
            }
        }
    }

    /// Expand to one bin per row.
    pub fn to_dense(&self, num_data: usize) -> Vec<u16> {
        match self {
            BinColumn::Dense(bins) => bins.clone(),
            BinColumn::Sparse {
                rows,
                bins,
                default_bin,
            } => {
                let mut out = vec![*default_bin; num_data];
                for (&r, &b) in rows.iter().zip(bins.iter()) {
                    out[r as usize] = b;
                }
                out
            }
        }
    }
}

/// One stored column: a single feature or a bundle of exclusive features.
///
/// Bundle encoding: group bin 0 means every member is at its most frequent
/// bin; member `j` with `B` bins and most frequent bin `d` stores bin
/// `b != d` as `1 + offset_j + (b if b < d else b - 1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureGroup {
    features: Vec<usize>,
    bin_offsets: Vec<u32>,
    num_bins: Vec<u32>,
    default_bins: Vec<u32>,
    num_total_bin: usize,
    is_bundle: bool,
    column: BinColumn,
}

impl FeatureGroup {
    /// Used-feature indices stored in this group
    pub fn features(&self) -> &[usize] {
        &self.features
    }

    pub fn num_total_bin(&self) -> usize {
        self.num_total_bin
    }

    pub fn is_bundle(&self) -> bool {
        self.is_bundle
    }

    pub fn column(&self) -> &BinColumn {
        &self.column
    }

    /// First group bin of member `sub` inside a bundle.
    pub fn member_bin_offset(&self, sub: usize) -> u32 {
        self.bin_offsets[sub]
    }

    /// Bin count of member `sub`.
    pub fn member_num_bin(&self, sub: usize) -> u32 {
        self.num_bins[sub]
    }

    /// Implicit bin of member `sub`.
    pub fn member_default_bin(&self, sub: usize) -> u32 {
        self.default_bins[sub]
    }

    /// Group bin that sparse storage leaves implicit.
    pub fn storage_default_bin(&self) -> Option<u32> {
        match &self.column {
            BinColumn::Sparse { default_bin, .. } => Some(*default_bin as u32),
            BinColumn::Dense(_) => None,
        }
    }

    /// Decode the bin of member `sub` from a stored group bin.
    #[inline]
    pub fn feature_bin(&self, sub: usize, group_bin: u32) -> u32 {
        if !self.is_bundle {
            return group_bin;
        }
        let lo = 1 + self.bin_offsets[sub];
        let hi = lo + self.num_bins[sub] - 1;
        let d = self.default_bins[sub];
        if group_bin >= lo && group_bin < hi {
            let r = group_bin - lo;
            if r < d {
                r
            } else {
                r + 1
            }
        } else {
            d
        }
    }

    fn build(
        features: Vec<usize>,
        mappers: &[&BinMapper],
        feature_bins: &[&[u16]],
        num_data: usize,
        sparse_threshold: f64,
    ) -> Self {
        if features.len() == 1 {
            let mapper = mappers[0];
            let default_bin = mapper.most_freq_bin();
            let column = BinColumn::from_bins(feature_bins[0].to_vec(), default_bin as u16, sparse_threshold);
            return FeatureGroup {
                features,
                bin_offsets: vec![0],
                num_bins: vec![mapper.num_bin() as u32],
                default_bins: vec![default_bin],
                num_total_bin: mapper.num_bin(),
                is_bundle: false,
                column,
            };
        }

        let mut bin_offsets = Vec::with_capacity(features.len());
        let mut num_bins = Vec::with_capacity(features.len());
        let mut default_bins = Vec::with_capacity(features.len());
        let mut offset = 0u32;
        for mapper in mappers {
            bin_offsets.push(offset);
            num_bins.push(mapper.num_bin() as u32);
            default_bins.push(mapper.most_freq_bin());
            offset += mapper.num_bin() as u32 - 1;
        }

        let mut encoded = vec![0u16; num_data];
        for (sub, bins) in feature_bins.iter().enumerate() {
            let d = default_bins[sub];
            for (row, &b) in bins.iter().enumerate() {
                let b = b as u32;
                if b != d {
                    let rank = if b < d { b } else { b - 1 };
                    encoded[row] = (1 + bin_offsets[sub] + rank) as u16;
                }
            }
        }

        FeatureGroup {
            features,
            bin_offsets,
            num_bins,
            default_bins,
            num_total_bin: 1 + offset as usize,
            is_bundle: true,
            column: BinColumn::from_bins(encoded, 0, sparse_threshold),
        }
    }

    fn subset(&self, rows: &[DataSize]) -> Self {
        FeatureGroup {
            column: self.column.subset(rows),
            ..self.clone_layout()
        }
    }

    fn clone_layout(&self) -> Self {
        FeatureGroup {
            features: self.features.clone(),
            bin_offsets: self.bin_offsets.clone(),
            num_bins: self.num_bins.clone(),
            default_bins: self.default_bins.clone(),
            num_total_bin: self.num_total_bin,
            is_bundle: self.is_bundle,
            column: BinColumn::Dense(Vec::new()),
        }
    }
}

/// Binned, immutable training or validation data.
#[derive(Debug, Clone)]
pub struct BinnedDataset {
    num_data: DataSize,
    /// One mapper per raw column
    bin_mappers: Vec<BinMapper>,
    /// Raw column of every used (non-trivial) feature
    used_features: Vec<usize>,
    /// Used-feature index of every raw column, `None` when trivial
    raw_to_inner: Vec<Option<usize>>,
    feature_to_group: Vec<usize>,
    feature_to_sub: Vec<usize>,
    groups: Vec<FeatureGroup>,
    /// First histogram bin of every group; the last entry is the total
    group_bin_boundaries: Vec<usize>,
    metadata: Metadata,
    feature_names: Vec<String>,
}

impl BinnedDataset {
    /// Bin a dense feature matrix for training on `config.num_threads`
    /// workers.
    pub fn from_array(data: ArrayView2<f32>, metadata: Metadata, config: &Config) -> Result<Self> {
        let pool = config.build_thread_pool()?;
        pool.install(|| Self::bin_training_data(data, metadata, config))
    }

    fn bin_training_data(data: ArrayView2<f32>, metadata: Metadata, config: &Config) -> Result<Self> {
        let (num_data, num_cols) = data.dim();
        if num_data == 0 {
            return Err(LightGBMError::dataset("cannot construct a dataset with zero rows"));
        }
        if num_data > DataSize::MAX as usize {
            return Err(LightGBMError::dataset(format!(
                "{} rows exceed the supported maximum",
                num_data
            )));
        }
        if metadata.num_data() != num_data {
            return Err(LightGBMError::dimension_mismatch(
                format!("{} labels", num_data),
                format!("{} labels", metadata.num_data()),
            ));
        }
        config.validate_for_features(num_cols)?;

        let sample_rows: Vec<usize> = if num_data > config.bin_construct_sample_cnt {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.data_random_seed);
            let mut rows = rand::seq::index::sample(&mut rng, num_data, config.bin_construct_sample_cnt).into_vec();
            rows.sort_unstable();
            rows
        } else {
            (0..num_data).collect()
        };

        let binning = BinningConfig::from(config);
        let bin_mappers = construct_bin_mappers(&data, &sample_rows, &config.categorical_feature, &binning);

        let used_features: Vec<usize> = (0..num_cols).filter(|&c| !bin_mappers[c].is_trivial()).collect();
        if used_features.is_empty() {
            log::warn!(
                "There are no meaningful features which satisfy the provided configuration. \
                 Decreasing Dataset parameters min_data_in_bin or min_data_in_leaf and \
                 re-constructing Dataset might resolve this warning."
            );
        }

        let feature_bins: Vec<Vec<u16>> = used_features
            .par_iter()
            .map(|&col| {
                let mapper = &bin_mappers[col];
                data.column(col)
                    .iter()
                    .map(|&v| mapper.value_to_bin(v as f64) as u16)
                    .collect()
            })
            .collect();

        let bundles = if config.enable_bundle {
            let candidates: Vec<BundleCandidate<'_>> = used_features
                .iter()
                .zip(feature_bins.iter())
                .map(|(&col, bins)| BundleCandidate {
                    bins,
                    default_bin: bin_mappers[col].most_freq_bin(),
                    num_bin: bin_mappers[col].num_bin(),
                })
                .collect();
            find_bundles(&candidates, num_data, MAX_BIN_PER_BUNDLE)
        } else {
            (0..used_features.len()).map(|f| vec![f]).collect()
        };

        let dataset = Self::assemble(
            num_data,
            bin_mappers,
            used_features,
            bundles,
            &feature_bins,
            metadata,
            config.sparse_threshold,
        );

        let total_bins: usize = dataset
            .used_features
            .iter()
            .map(|&c| dataset.bin_mappers[c].num_bin())
            .sum();
        log::info!("Total Bins {}", total_bins);
        log::info!(
            "Number of data points in the train set: {}, number of used features: {}",
            num_data,
            dataset.num_features()
        );
        if dataset.groups.iter().any(|g| g.is_bundle()) {
            log::debug!(
                "Bundled {} features into {} groups",
                dataset.num_features(),
                dataset.num_groups()
            );
        }
        Ok(dataset)
    }

    /// Bin validation data with the mappers of a training dataset.
    ///
    /// Validation data is never bundled; every used feature gets its own
    /// column so that rows violating training-time exclusivity still decode
    /// exactly.
    pub fn with_reference(data: ArrayView2<f32>, metadata: Metadata, reference: &BinnedDataset) -> Result<Self> {
        let (num_data, num_cols) = data.dim();
        if num_data == 0 {
            return Err(LightGBMError::dataset("cannot construct a dataset with zero rows"));
        }
        if num_cols != reference.num_total_features() {
            return Err(LightGBMError::dimension_mismatch(
                format!("{} columns", reference.num_total_features()),
                format!("{} columns", num_cols),
            ));
        }
        if metadata.num_data() != num_data {
            return Err(LightGBMError::dimension_mismatch(
                format!("{} labels", num_data),
                format!("{} labels", metadata.num_data()),
            ));
        }

        let feature_bins: Vec<Vec<u16>> = reference
            .used_features
            .par_iter()
            .map(|&col| {
                let mapper = &reference.bin_mappers[col];
                data.column(col)
                    .iter()
                    .map(|&v| mapper.value_to_bin(v as f64) as u16)
                    .collect()
            })
            .collect();
        let bundles = (0..reference.used_features.len()).map(|f| vec![f]).collect();

        let mut dataset = Self::assemble(
            num_data,
            reference.bin_mappers.clone(),
            reference.used_features.clone(),
            bundles,
            &feature_bins,
            metadata,
            1.0,
        );
        dataset.feature_names = reference.feature_names.clone();
        Ok(dataset)
    }

    fn assemble(
        num_data: usize,
        bin_mappers: Vec<BinMapper>,
        used_features: Vec<usize>,
        bundles: Vec<Vec<usize>>,
        feature_bins: &[Vec<u16>],
        metadata: Metadata,
        sparse_threshold: f64,
    ) -> Self {
        let groups: Vec<FeatureGroup> = bundles
            .into_par_iter()
            .map(|features| {
                let mappers: Vec<&BinMapper> = features.iter().map(|&f| &bin_mappers[used_features[f]]).collect();
                let bins: Vec<&[u16]> = features.iter().map(|&f| feature_bins[f].as_slice()).collect();
                FeatureGroup::build(features, &mappers, &bins, num_data, sparse_threshold)
            })
            .collect();

        let mut raw_to_inner = vec![None; bin_mappers.len()];
        for (inner, &raw) in used_features.iter().enumerate() {
            raw_to_inner[raw] = Some(inner);
        }
        let mut feature_to_group = vec![0; used_features.len()];
        let mut feature_to_sub = vec![0; used_features.len()];
        let mut group_bin_boundaries = Vec::with_capacity(groups.len() + 1);
        let mut total = 0usize;
        for (g, group) in groups.iter().enumerate() {
            for (sub, &f) in group.features().iter().enumerate() {
                feature_to_group[f] = g;
                feature_to_sub[f] = sub;
            }
            group_bin_boundaries.push(total);
            total += group.num_total_bin();
        }
        group_bin_boundaries.push(total);

        let feature_names = (0..bin_mappers.len()).map(|i| format!("Column_{}", i)).collect();

        BinnedDataset {
            num_data: num_data as DataSize,
            bin_mappers,
            used_features,
            raw_to_inner,
            feature_to_group,
            feature_to_sub,
            groups,
            group_bin_boundaries,
            metadata,
            feature_names,
        }
    }

    /// Rows `rows` (ascending) of this dataset sharing its bin mappers and
    /// column layout. Used to give each machine its shard.
    pub fn subset(&self, rows: &[DataSize]) -> Result<Self> {
        if rows.is_empty() {
            return Err(LightGBMError::dataset("cannot construct a dataset with zero rows"));
        }
        if rows.windows(2).any(|w| w[0] >= w[1]) || rows[rows.len() - 1] >= self.num_data {
            return Err(LightGBMError::dataset("subset rows must be ascending and in range"));
        }
        let metadata = self.metadata.subset(rows)?;
        let groups = self.groups.par_iter().map(|g| g.subset(rows)).collect();
        Ok(BinnedDataset {
            num_data: rows.len() as DataSize,
            bin_mappers: self.bin_mappers.clone(),
            used_features: self.used_features.clone(),
            raw_to_inner: self.raw_to_inner.clone(),
            feature_to_group: self.feature_to_group.clone(),
            feature_to_sub: self.feature_to_sub.clone(),
            groups,
            group_bin_boundaries: self.group_bin_boundaries.clone(),
            metadata,
            feature_names: self.feature_names.clone(),
        })
    }

    /// Replace the generated `Column_i` names.
    pub fn set_feature_names(&mut self, names: Vec<String>) -> Result<()> {
        if names.len() != self.bin_mappers.len() {
            return Err(LightGBMError::dimension_mismatch(
                format!("{} names", self.bin_mappers.len()),
                format!("{} names", names.len()),
            ));
        }
        self.feature_names = names;
        Ok(())
    }

    pub fn num_data(&self) -> DataSize {
        self.num_data
    }

    /// Number of raw columns
    pub fn num_total_features(&self) -> usize {
        self.bin_mappers.len()
    }

    /// Number of used (non-trivial) features
    pub fn num_features(&self) -> usize {
        self.used_features.len()
    }

    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn group(&self, g: usize) -> &FeatureGroup {
        &self.groups[g]
    }

    pub fn groups(&self) -> &[FeatureGroup] {
        &self.groups
    }

    /// Histogram bins of all groups together
    pub fn num_total_bin(&self) -> usize {
        self.group_bin_boundaries[self.groups.len()]
    }

    /// First histogram bin of group `g`
    pub fn group_bin_start(&self, g: usize) -> usize {
        self.group_bin_boundaries[g]
    }

    /// Raw column of a used feature
    pub fn real_feature_index(&self, inner: usize) -> usize {
        self.used_features[inner]
    }

    /// Used-feature index of a raw column
    pub fn inner_feature_index(&self, raw: usize) -> Option<usize> {
        self.raw_to_inner.get(raw).copied().flatten()
    }

    /// Group and member position of a used feature
    pub fn feature_location(&self, inner: usize) -> (usize, usize) {
        (self.feature_to_group[inner], self.feature_to_sub[inner])
    }

    /// Mapper of a used feature
    pub fn feature_bin_mapper(&self, inner: usize) -> &BinMapper {
        &self.bin_mappers[self.used_features[inner]]
    }

    /// Mapper of a raw column
    pub fn raw_bin_mapper(&self, raw: usize) -> &BinMapper {
        &self.bin_mappers[raw]
    }

    pub fn bin_mappers(&self) -> &[BinMapper] {
        &self.bin_mappers
    }

    /// Bin of used feature `inner` for `row`
    #[inline]
    pub fn feature_bin(&self, row: DataSize, inner: usize) -> u32 {
        let (g, sub) = self.feature_location(inner);
        let group = &self.groups[g];
        group.feature_bin(sub, group.column().get(row) as u32)
    }

    /// Bin of raw column `raw` for `row`; trivial columns always read bin 0.
    #[inline]
    pub fn raw_feature_bin(&self, row: DataSize, raw: usize) -> u32 {
        match self.inner_feature_index(raw) {
            Some(inner) => self.feature_bin(row, inner),
            None => 0,
        }
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn labels(&self) -> &[Label] {
        self.metadata.labels()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }
}
