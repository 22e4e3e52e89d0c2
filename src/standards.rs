//! Strength standards: rank tiers and per-exercise weight thresholds.
//!
//! The table is declarative data (`data/strength_standards.json`), embedded at
//! compile time and optionally replaced by a file on disk at runtime.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StandardsError;

/// Standards shipped with the binary.
const BUILTIN_STANDARDS: &str = include_str!("../data/strength_standards.json");

/// Named strength classification, ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RankTier {
    Unranked,
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
    Apex,
}

impl RankTier {
    /// Tiers that carry a threshold, from Bronze to Apex.
    pub fn ranked() -> &'static [RankTier] {
        &[
            RankTier::Bronze,
            RankTier::Silver,
            RankTier::Gold,
            RankTier::Platinum,
            RankTier::Diamond,
            RankTier::Apex,
        ]
    }

    /// Returns the display name for the tier.
    pub fn display_name(&self) -> &'static str {
        match self {
            RankTier::Unranked => "Unranked",
            RankTier::Bronze => "Bronze",
            RankTier::Silver => "Silver",
            RankTier::Gold => "Gold",
            RankTier::Platinum => "Platinum",
            RankTier::Diamond => "Diamond",
            RankTier::Apex => "Apex",
        }
    }
}

impl FromStr for RankTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "unranked" => Ok(RankTier::Unranked),
            "bronze" => Ok(RankTier::Bronze),
            "silver" => Ok(RankTier::Silver),
            "gold" => Ok(RankTier::Gold),
            "platinum" => Ok(RankTier::Platinum),
            "diamond" => Ok(RankTier::Diamond),
            "apex" => Ok(RankTier::Apex),
            _ => Err(format!("unknown rank tier: {}", s)),
        }
    }
}

impl std::fmt::Display for RankTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Minimum weights (kg) for each tier of one exercise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StandardsRow {
    pub bronze: f64,
    pub silver: f64,
    pub gold: f64,
    pub platinum: f64,
    pub diamond: f64,
    pub apex: f64,
}

impl StandardsRow {
    /// Threshold for a tier. Unranked has none.
    pub fn threshold(&self, tier: RankTier) -> Option<f64> {
        match tier {
            RankTier::Unranked => None,
            RankTier::Bronze => Some(self.bronze),
            RankTier::Silver => Some(self.silver),
            RankTier::Gold => Some(self.gold),
            RankTier::Platinum => Some(self.platinum),
            RankTier::Diamond => Some(self.diamond),
            RankTier::Apex => Some(self.apex),
        }
    }

    /// Classifies a weight. Thresholds are inclusive lower bounds.
    pub fn resolve(&self, weight_kg: f64) -> RankTier {
        RankTier::ranked()
            .iter()
            .rev()
            .copied()
            .find(|tier| self.threshold(*tier).is_some_and(|t| weight_kg >= t))
            .unwrap_or(RankTier::Unranked)
    }

    fn is_strictly_increasing(&self) -> bool {
        let values = [
            self.bronze,
            self.silver,
            self.gold,
            self.platinum,
            self.diamond,
            self.apex,
        ];
        values.windows(2).all(|pair| pair[0] < pair[1])
    }
}

/// One step of an exercise's rank distribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierThreshold {
    pub tier: RankTier,
    pub weight_kg: f64,
    pub description: Option<String>,
}

/// The full standards table with tier descriptions and the exercise catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardsTable {
    #[serde(default)]
    pub descriptions: BTreeMap<RankTier, String>,
    #[serde(default)]
    pub catalog: BTreeMap<String, Vec<String>>,
    pub standards: BTreeMap<String, StandardsRow>,
}

impl StandardsTable {
    /// Parses the table embedded in the binary.
    pub fn builtin() -> Result<Self, StandardsError> {
        Self::from_json(BUILTIN_STANDARDS)
    }

    /// Parses and validates a table from JSON text.
    pub fn from_json(text: &str) -> Result<Self, StandardsError> {
        let table: StandardsTable = serde_json::from_str(text)?;

        if let Some((exercise, _)) = table
            .standards
            .iter()
            .find(|(_, row)| !row.is_strictly_increasing())
        {
            return Err(StandardsError::NonMonotonic {
                exercise: exercise.clone(),
            });
        }

        Ok(table)
    }

    /// Loads a table from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StandardsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| StandardsError::CannotRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Returns the thresholds for an exercise, if it has standards.
    pub fn row(&self, exercise_name: &str) -> Option<&StandardsRow> {
        self.standards.get(exercise_name)
    }

    /// Resolves the rank for a weight on an exercise.
    ///
    /// Returns `None` when the exercise has no standards, which is distinct
    /// from `Some(RankTier::Unranked)` for a weight below Bronze.
    pub fn get_rank(&self, exercise_name: &str, weight_kg: f64) -> Option<RankTier> {
        self.row(exercise_name).map(|row| row.resolve(weight_kg))
    }

    /// Returns the description shown for a tier.
    pub fn description(&self, tier: RankTier) -> Option<&str> {
        self.descriptions.get(&tier).map(String::as_str)
    }

    /// Returns the exercise's thresholds from Apex down to Bronze.
    pub fn distribution(&self, exercise_name: &str) -> Option<Vec<TierThreshold>> {
        let row = self.row(exercise_name)?;

        Some(
            RankTier::ranked()
                .iter()
                .rev()
                .filter_map(|tier| {
                    row.threshold(*tier).map(|weight_kg| TierThreshold {
                        tier: *tier,
                        weight_kg,
                        description: self.description(*tier).map(str::to_string),
                    })
                })
                .collect(),
        )
    }

    /// Number of exercises with standards.
    pub fn len(&self) -> usize {
        self.standards.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn table() -> StandardsTable {
        StandardsTable::builtin().unwrap()
    }

    #[test]
    fn test_builtin_table_parses() {
        let table = table();
        assert_eq!(table.len(), 42);
        assert_eq!(table.catalog.len(), 7);
        assert_eq!(table.description(RankTier::Apex), Some("World Class (Top 0.1%)"));
    }

    #[test]
    fn test_bench_press_ranks() {
        let table = table();
        assert_eq!(table.get_rank("Barbell Bench Press", 160.0), Some(RankTier::Apex));
        assert_eq!(table.get_rank("Barbell Bench Press", 59.0), Some(RankTier::Unranked));
        assert_eq!(table.get_rank("Barbell Bench Press", 95.0), Some(RankTier::Gold));
    }

    #[test]
    fn test_unknown_exercise_has_no_rank() {
        assert_eq!(table().get_rank("Unknown Exercise", 100.0), None);
    }

    #[test]
    fn test_thresholds_are_inclusive() {
        let table = table();
        assert_eq!(table.get_rank("Deadlift", 100.0), Some(RankTier::Bronze));
        assert_eq!(table.get_rank("Deadlift", 99.99), Some(RankTier::Unranked));
        assert_eq!(table.get_rank("Deadlift", 220.0), Some(RankTier::Diamond));
    }

    #[test]
    fn test_zero_threshold_bronze() {
        // Bodyweight movements rank Bronze with no added weight
        assert_eq!(table().get_rank("Pull Ups", 0.0), Some(RankTier::Bronze));
    }

    #[test]
    fn test_rank_is_monotonic_in_weight() {
        let table = table();
        for exercise in table.standards.keys() {
            let mut previous = RankTier::Unranked;
            for step in 0..=1400 {
                let weight = step as f64 * 0.5;
                let rank = table.get_rank(exercise, weight).unwrap();
                assert!(rank >= previous, "{} dropped rank at {}kg", exercise, weight);
                previous = rank;
            }
            assert_eq!(previous, RankTier::Apex);
        }
    }

    #[test]
    fn test_tier_ordering() {
        assert!(RankTier::Unranked < RankTier::Bronze);
        assert!(RankTier::Diamond < RankTier::Apex);
    }

    #[test]
    fn test_tier_from_str() {
        assert_eq!(RankTier::from_str("gold").unwrap(), RankTier::Gold);
        assert_eq!(RankTier::from_str(" APEX ").unwrap(), RankTier::Apex);
        assert!(RankTier::from_str("mithril").is_err());
    }

    #[test]
    fn test_distribution_highest_first() {
        let dist = table().distribution("Barbell Squat").unwrap();
        assert_eq!(dist.len(), 6);
        assert_eq!(dist[0].tier, RankTier::Apex);
        assert_eq!(dist[0].weight_kg, 220.0);
        assert_eq!(dist[5].tier, RankTier::Bronze);
        assert_eq!(dist[5].description.as_deref(), Some("Beginner (Top 90%)"));
        assert!(table().distribution("Plank").is_none());
    }

    #[test]
    fn test_rejects_non_monotonic_row() {
        let json = r#"{"standards": {"Bad Lift": {"Bronze": 50, "Silver": 40, "Gold": 60, "Platinum": 70, "Diamond": 80, "Apex": 90}}}"#;
        let err = StandardsTable::from_json(json).unwrap_err();
        assert!(matches!(err, StandardsError::NonMonotonic { ref exercise } if exercise == "Bad Lift"));
    }

    #[test]
    fn test_rejects_missing_tier() {
        let json = r#"{"standards": {"Short": {"Bronze": 50}}}"#;
        assert!(matches!(
            StandardsTable::from_json(json),
            Err(StandardsError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"standards": {{"Sled Push": {{"Bronze": 50, "Silver": 100, "Gold": 150, "Platinum": 200, "Diamond": 250, "Apex": 300}}}}}}"#
        )
        .unwrap();

        let table = StandardsTable::load(file.path()).unwrap();
        assert_eq!(table.get_rank("Sled Push", 175.0), Some(RankTier::Gold));
        assert!(table.descriptions.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let err = StandardsTable::load("/nonexistent/standards.json").unwrap_err();
        assert!(matches!(err, StandardsError::CannotRead { .. }));
    }
}
