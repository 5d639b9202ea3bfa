//! Category ordering for categorical features.

use std::collections::HashMap;

/// Categories of one column in bin order.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryLayout {
    /// Category value of each regular bin
    pub categories: Vec<i32>,
    /// Rows per regular bin
    pub counts: Vec<usize>,
    /// Whether categories beyond the cap were collapsed into an "other" bin
    pub has_other: bool,
    /// Rows that fell into the "other" bin
    pub other_count: usize,
    /// Rows with a missing (NaN or negative) category
    pub missing_count: usize,
}

/// Interpret a raw value as a category id. NaN and negative values are missing.
pub fn as_category(value: f64) -> Option<i32> {
    if value.is_nan() || value < 0.0 || value > i32::MAX as f64 {
        None
    } else {
        Some(value as i32)
    }
}

/// Order categories by descending frequency (ties by ascending id) and keep
/// at most `max_cat_bins` of them.
pub fn layout_categories(values: &[f64], max_cat_bins: usize) -> CategoryLayout {
    let mut freq: HashMap<i32, usize> = HashMap::new();
    let mut missing_count = 0usize;
    for &v in values {
        match as_category(v) {
            Some(cat) => *freq.entry(cat).or_insert(0) += 1,
            None => missing_count += 1,
        }
    }

    let mut ordered: Vec<(i32, usize)> = freq.into_iter().collect();
    ordered.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let has_other = ordered.len() > max_cat_bins;
    let other_count = ordered.iter().skip(max_cat_bins).map(|&(_, c)| c).sum();
    ordered.truncate(max_cat_bins);

    CategoryLayout {
        categories: ordered.iter().map(|&(cat, _)| cat).collect(),
        counts: ordered.iter().map(|&(_, c)| c).collect(),
        has_other,
        other_count,
        missing_count,
    }
}
