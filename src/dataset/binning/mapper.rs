//! Per-feature mapping from raw values to bin ids.

use super::categorical::{as_category, layout_categories};
use super::numerical::{distinct_values, equal_width_upper_bounds, greedy_upper_bounds};
use super::BinningConfig;
use crate::core::constants::MAX_UPPER_BOUND;
use crate::core::types::{BinIndex, BinningPolicy, FeatureType, MissingType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Discretization of one raw feature column.
///
/// Numerical layout: `[numeric bins...][missing bin]`, where the missing
/// bin exists only when the column contained NaN. Categorical layout:
/// `[one bin per kept category...][other bin][missing bin]`, where the
/// "other" bin exists only when categories were capped and the missing bin
/// is reserved whenever the feature is not trivial. Unseen categories map to
/// "other" when it exists and to the missing bin otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinMapper {
    feature_type: FeatureType,
    missing_type: MissingType,
    num_bin: usize,
    /// Inclusive upper bound of every numeric bin
    upper_bounds: Vec<f64>,
    /// Category value of every regular categorical bin
    categories: Vec<i32>,
    category_to_bin: HashMap<i32, BinIndex>,
    has_other_bin: bool,
    most_freq_bin: BinIndex,
    default_bin: BinIndex,
    min_value: f64,
    max_value: f64,
}

impl BinMapper {
    /// Mapper for a column that carries no information.
    pub fn trivial(feature_type: FeatureType) -> Self {
        BinMapper {
            feature_type,
            missing_type: MissingType::None,
            num_bin: 1,
            upper_bounds: vec![MAX_UPPER_BOUND],
            categories: Vec::new(),
            category_to_bin: HashMap::new(),
            has_other_bin: false,
            most_freq_bin: 0,
            default_bin: 0,
            min_value: 0.0,
            max_value: 0.0,
        }
    }

    /// Build a mapper from (possibly sampled) column values.
    ///
    /// The result depends only on the multiset of values and the
    /// configuration, so repeated calls produce identical mappers.
    pub fn find_bin(values: &[f64], feature_type: FeatureType, config: &BinningConfig) -> Self {
        match feature_type {
            FeatureType::Numerical => Self::find_numerical(values, config),
            FeatureType::Categorical => Self::find_categorical(values, config),
        }
    }

    fn find_numerical(values: &[f64], config: &BinningConfig) -> Self {
        let mut finite: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        let nan_count = values.len() - finite.len();
        if finite.is_empty() {
            return Self::trivial(FeatureType::Numerical);
        }
        finite.sort_by(|a, b| a.total_cmp(b));
        let (distinct, counts) = distinct_values(&finite);

        let missing_type = if nan_count > 0 {
            MissingType::NaN
        } else {
            MissingType::None
        };
        let numeric_budget = if missing_type == MissingType::NaN {
            config.max_bin.saturating_sub(1).max(1)
        } else {
            config.max_bin
        };
        let upper_bounds = match config.policy {
            BinningPolicy::Quantile => greedy_upper_bounds(
                &distinct,
                &counts,
                numeric_budget,
                finite.len(),
                config.min_data_in_bin,
            ),
            BinningPolicy::EqualWidth => equal_width_upper_bounds(&distinct, numeric_budget),
        };

        let num_numeric = upper_bounds.len();
        let num_bin = num_numeric + usize::from(missing_type == MissingType::NaN);
        if num_bin <= 1 {
            return Self::trivial(FeatureType::Numerical);
        }

        let mut mapper = BinMapper {
            feature_type: FeatureType::Numerical,
            missing_type,
            num_bin,
            upper_bounds,
            categories: Vec::new(),
            category_to_bin: HashMap::new(),
            has_other_bin: false,
            most_freq_bin: 0,
            default_bin: 0,
            min_value: distinct[0],
            max_value: distinct[distinct.len() - 1],
        };
        mapper.default_bin = mapper.value_to_bin(0.0);

        let mut bin_counts = vec![0usize; num_bin];
        for (&v, &c) in distinct.iter().zip(counts.iter()) {
            bin_counts[mapper.value_to_bin(v) as usize] += c;
        }
        if nan_count > 0 {
            bin_counts[num_bin - 1] += nan_count;
        }
        mapper.most_freq_bin = most_frequent(&bin_counts);
        mapper
    }

    fn find_categorical(values: &[f64], config: &BinningConfig) -> Self {
        // the missing bin is always reserved; "other" needs one more
        let mut layout = layout_categories(values, config.max_cat_bins.min(config.max_bin.saturating_sub(1)));
        if layout.has_other {
            layout = layout_categories(values, config.max_cat_bins.min(config.max_bin.saturating_sub(2)));
        }
        let informative = layout.categories.len()
            + usize::from(layout.has_other)
            + usize::from(layout.missing_count > 0);
        if informative <= 1 {
            return Self::trivial(FeatureType::Categorical);
        }

        let k = layout.categories.len();
        let num_bin = k + usize::from(layout.has_other) + 1;
        let category_to_bin = layout
            .categories
            .iter()
            .enumerate()
            .map(|(bin, &cat)| (cat, bin as BinIndex))
            .collect();

        let mut bin_counts = layout.counts.clone();
        if layout.has_other {
            bin_counts.push(layout.other_count);
        }
        bin_counts.push(layout.missing_count);

        let mut mapper = BinMapper {
            feature_type: FeatureType::Categorical,
            missing_type: MissingType::NaN,
            num_bin,
            upper_bounds: Vec::new(),
            categories: layout.categories,
            category_to_bin,
            has_other_bin: layout.has_other,
            most_freq_bin: most_frequent(&bin_counts),
            default_bin: 0,
            min_value: 0.0,
            max_value: 0.0,
        };
        mapper.default_bin = mapper.value_to_bin(0.0);
        mapper
    }

    /// Map a raw value to its bin.
    pub fn value_to_bin(&self, value: f64) -> BinIndex {
        if self.num_bin <= 1 {
            return 0;
        }
        match self.feature_type {
            FeatureType::Numerical => {
                let value = if value.is_nan() {
                    if self.missing_type == MissingType::NaN {
                        return (self.num_bin - 1) as BinIndex;
                    }
                    0.0
                } else {
                    value
                };
                let idx = self.upper_bounds.partition_point(|&bound| bound < value);
                idx.min(self.upper_bounds.len() - 1) as BinIndex
            }
            FeatureType::Categorical => match as_category(value) {
                Some(cat) => match self.category_to_bin.get(&cat) {
                    Some(&bin) => bin,
                    None if self.has_other_bin => self.categories.len() as BinIndex,
                    None => (self.num_bin - 1) as BinIndex,
                },
                None => (self.num_bin - 1) as BinIndex,
            },
        }
    }

    /// Inclusive upper bound of a numeric bin, used as the split threshold.
    pub fn bin_to_value(&self, bin: BinIndex) -> f64 {
        self.upper_bounds
            .get(bin as usize)
            .copied()
            .unwrap_or(MAX_UPPER_BOUND)
    }

    /// Category id stored in a categorical bin.
    pub fn bin_to_category(&self, bin: BinIndex) -> Option<i32> {
        self.categories.get(bin as usize).copied()
    }

    pub fn num_bin(&self) -> usize {
        self.num_bin
    }

    pub fn feature_type(&self) -> FeatureType {
        self.feature_type
    }

    pub fn missing_type(&self) -> MissingType {
        self.missing_type
    }

    /// A feature with a single bin can never be split.
    pub fn is_trivial(&self) -> bool {
        self.num_bin <= 1
    }

    /// Bin reserved for missing values, if any.
    pub fn missing_bin(&self) -> Option<BinIndex> {
        if self.num_bin > 1 && self.missing_type == MissingType::NaN {
            Some((self.num_bin - 1) as BinIndex)
        } else {
            None
        }
    }

    /// Number of categorical bins that hold exactly one category.
    pub fn num_category_bins(&self) -> usize {
        self.categories.len()
    }

    /// Bin that is implicit in sparse storage and in bundles.
    pub fn most_freq_bin(&self) -> BinIndex {
        self.most_freq_bin
    }

    /// Bin of the raw value zero.
    pub fn default_bin(&self) -> BinIndex {
        self.default_bin
    }

    pub fn upper_bounds(&self) -> &[f64] {
        &self.upper_bounds
    }

    pub fn min_value(&self) -> f64 {
        self.min_value
    }

    pub fn max_value(&self) -> f64 {
        self.max_value
    }
}

fn most_frequent(counts: &[usize]) -> BinIndex {
    let mut best = 0usize;
    for (i, &c) in counts.iter().enumerate() {
        if c > counts[best] {
            best = i;
        }
    }
    best as BinIndex
}
