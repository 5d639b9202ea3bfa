//! Configuration management.
//!
//! [`Config`] carries every training parameter; [`ConfigBuilder`] assembles
//! one fluently and validates it. Both JSON and TOML parameter files are
//! supported.

pub mod core;

pub use self::core::{Config, ConfigBuilder};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{MetricType, TreeLearnerType};

    #[test]
    fn test_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");

        let mut config = Config::default();
        config.num_leaves = 7;
        config.tree_learner = TreeLearnerType::Voting;
        config.metric = vec![MetricType::AUC, MetricType::BinaryLogloss];
        config.save_to_file(&path).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.num_leaves, 7);
        assert_eq!(loaded.tree_learner, TreeLearnerType::Voting);
        assert_eq!(loaded.metric, config.metric);
        assert_eq!(loaded.max_bin, config.max_bin);
    }

    #[test]
    fn test_toml_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.toml");
        std::fs::write(&path, "num_leaves = 15\nlearning_rate = 0.05\nmetric = [\"l2\"]\n").unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.num_leaves, 15);
        assert_eq!(loaded.learning_rate, 0.05);
        assert_eq!(loaded.metric, vec![MetricType::L2]);
        assert_eq!(loaded.max_bin, Config::default().max_bin);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.toml");
        std::fs::write(&path, "max_bin = 1\n").unwrap();
        assert!(Config::load_from_file(&path).is_err());

        let other = dir.path().join("params.yaml");
        std::fs::write(&other, "max_bin: 10\n").unwrap();
        assert!(Config::load_from_file(&other).is_err());
    }
}
