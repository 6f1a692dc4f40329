//! Status conditions on a participant
//!
//! Conditions are free-text labels ("poisoned", "prone", "blessed by Tymora").
//! A participant holds a set of them: duplicates collapse, order doesn't
//! matter, and the set is stored as a JSON array.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Set of condition labels held by one participant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionSet(BTreeSet<String>);

impl ConditionSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from arbitrary labels; blank labels are dropped
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for label in labels {
            set.insert(label.as_ref());
        }
        set
    }

    /// Add a label. Returns false if it was blank or already present.
    pub fn insert(&mut self, label: &str) -> bool {
        match normalize(label) {
            Some(label) => self.0.insert(label),
            None => false,
        }
    }

    /// Remove a label. Removing an absent label is a no-op.
    pub fn remove(&mut self, label: &str) -> bool {
        match normalize(label) {
            Some(label) => self.0.remove(&label),
            None => false,
        }
    }

    pub fn contains(&self, label: &str) -> bool {
        normalize(label).is_some_and(|l| self.0.contains(&l))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Serialize for storage
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "[]".to_string())
    }

    /// Parse the stored form. An empty column reads as no conditions.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::new());
        }
        let labels: Vec<String> = serde_json::from_str(raw)?;
        Ok(Self::from_labels(labels))
    }
}

/// Labels are compared after trimming surrounding whitespace
fn normalize(label: &str) -> Option<String> {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_collapses_duplicates() {
        let mut set = ConditionSet::new();
        assert!(set.insert("poisoned"));
        assert!(!set.insert("poisoned"));
        assert!(!set.insert("  poisoned "));
        assert_eq!(set.len(), 1);
        assert!(set.contains("poisoned"));
    }

    #[test]
    fn test_blank_labels_ignored() {
        let mut set = ConditionSet::new();
        assert!(!set.insert(""));
        assert!(!set.insert("   "));
        assert!(set.is_empty());
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut set = ConditionSet::from_labels(["stunned", "prone"]);
        let before = set.clone();

        assert!(!set.remove("blinded"));
        assert_eq!(set, before);

        assert!(set.remove("prone"));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["stunned"]);
    }

    #[test]
    fn test_json_storage() {
        let set = ConditionSet::from_labels(["stunned", "blessed", "stunned"]);
        assert_eq!(set.to_json(), r#"["blessed","stunned"]"#);

        let parsed = ConditionSet::from_json(&set.to_json()).unwrap();
        assert_eq!(parsed, set);

        assert!(ConditionSet::from_json("").unwrap().is_empty());
        assert!(ConditionSet::from_json("not json").is_err());
    }
}
