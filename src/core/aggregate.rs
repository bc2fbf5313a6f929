//! Collecting matched values across roots and combining them.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::cancel::CancellationToken;
use super::error::CoreResult;

/// Append-only storage for collected values.
pub trait ResultStorage: Send {
    fn add(&mut self, value: String);
    fn count(&self) -> usize;
    fn values(&self) -> &[String];
}

#[derive(Debug, Default, Clone)]
pub struct ListResultStorage {
    values: Vec<String>,
}

impl ListResultStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResultStorage for ListResultStorage {
    fn add(&mut self, value: String) {
        self.values.push(value);
    }

    fn count(&self) -> usize {
        self.values.len()
    }

    fn values(&self) -> &[String] {
        &self.values
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AggregateMode {
    /// Values of the first root that no other root has.
    Except,
    /// Values every root has.
    Intersect,
    /// Distinct values with occurrence counts.
    Group,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupedValue {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AggregateResult {
    Values(Vec<String>),
    Groups(Vec<GroupedValue>),
}

/// Records values per root directory and computes set operations over them.
#[derive(Debug)]
pub struct AggregateManager<S: ResultStorage = ListResultStorage> {
    storage: S,
    /// Index in `storage` where each root's values start.
    boundaries: Vec<usize>,
    mode: AggregateMode,
    ignore_case: bool,
}

impl AggregateManager<ListResultStorage> {
    pub fn new(mode: AggregateMode, ignore_case: bool) -> Self {
        Self::with_storage(ListResultStorage::new(), mode, ignore_case)
    }
}

impl<S: ResultStorage> AggregateManager<S> {
    pub fn with_storage(storage: S, mode: AggregateMode, ignore_case: bool) -> Self {
        Self {
            storage,
            boundaries: Vec::new(),
            mode,
            ignore_case,
        }
    }

    pub fn mode(&self) -> AggregateMode {
        self.mode
    }

    /// Marks the start of the values collected for the next root.
    pub fn begin_root(&mut self) {
        self.boundaries.push(self.storage.count());
    }

    pub fn add(&mut self, value: impl Into<String>) {
        if self.boundaries.is_empty() {
            self.boundaries.push(0);
        }
        self.storage.add(value.into());
    }

    pub fn root_count(&self) -> usize {
        self.boundaries.len()
    }

    fn root_values(&self, index: usize) -> &[String] {
        let values = self.storage.values();
        let start = self.boundaries[index];
        let end = self
            .boundaries
            .get(index + 1)
            .copied()
            .unwrap_or(values.len());
        &values[start..end]
    }

    fn key(&self, value: &str) -> String {
        if self.ignore_case {
            value.to_lowercase()
        } else {
            value.to_string()
        }
    }

    fn key_set(&self, index: usize, cancellation: &CancellationToken) -> CoreResult<HashSet<String>> {
        let mut keys = HashSet::new();
        for value in self.root_values(index) {
            cancellation.check()?;
            keys.insert(self.key(value));
        }
        Ok(keys)
    }

    pub fn compute(&self, cancellation: &CancellationToken) -> CoreResult<AggregateResult> {
        if self.boundaries.is_empty() {
            return Ok(match self.mode {
                AggregateMode::Group => AggregateResult::Groups(Vec::new()),
                _ => AggregateResult::Values(Vec::new()),
            });
        }

        match self.mode {
            AggregateMode::Except | AggregateMode::Intersect => {
                let others = (1..self.boundaries.len())
                    .map(|i| self.key_set(i, cancellation))
                    .collect::<CoreResult<Vec<_>>>()?;
                let except = self.mode == AggregateMode::Except;

                let mut seen = HashSet::new();
                let mut values = Vec::new();
                for value in self.root_values(0) {
                    cancellation.check()?;
                    let key = self.key(value);
                    if !seen.insert(key.clone()) {
                        continue;
                    }
                    let keep = if except {
                        others.iter().all(|set| !set.contains(&key))
                    } else {
                        others.iter().all(|set| set.contains(&key))
                    };
                    if keep {
                        values.push(value.clone());
                    }
                }
                Ok(AggregateResult::Values(values))
            }
            AggregateMode::Group => {
                let mut index: HashMap<String, usize> = HashMap::new();
                let mut groups: Vec<GroupedValue> = Vec::new();
                for value in self.storage.values() {
                    cancellation.check()?;
                    let key = self.key(value);
                    match index.get(&key) {
                        Some(&i) => groups[i].count += 1,
                        None => {
                            index.insert(key, groups.len());
                            groups.push(GroupedValue {
                                value: value.clone(),
                                count: 1,
                            });
                        }
                    }
                }
                groups.sort_by(|a, b| b.count.cmp(&a.count));
                Ok(AggregateResult::Groups(groups))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::CoreError;

    fn manager(mode: AggregateMode, ignore_case: bool, roots: &[&[&str]]) -> AggregateManager {
        let mut manager = AggregateManager::new(mode, ignore_case);
        for root in roots {
            manager.begin_root();
            for value in *root {
                manager.add(*value);
            }
        }
        manager
    }

    #[test]
    fn test_except_keeps_values_unique_to_first_root() {
        let m = manager(AggregateMode::Except, false, &[&["a", "b", "c", "a"], &["b"], &["c"]]);
        assert_eq!(
            m.compute(&CancellationToken::new()).unwrap(),
            AggregateResult::Values(vec!["a".into()])
        );
    }

    #[test]
    fn test_intersect_ignoring_case() {
        let m = manager(AggregateMode::Intersect, true, &[&["Foo", "bar"], &["FOO", "baz"]]);
        assert_eq!(
            m.compute(&CancellationToken::new()).unwrap(),
            AggregateResult::Values(vec!["Foo".into()])
        );
    }

    #[test]
    fn test_group_counts_descending() {
        let m = manager(AggregateMode::Group, false, &[&["x", "y", "y"], &["y", "z"]]);
        let AggregateResult::Groups(groups) = m.compute(&CancellationToken::new()).unwrap() else {
            panic!("expected groups");
        };
        assert_eq!(groups[0], GroupedValue { value: "y".into(), count: 3 });
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[1].value, "x");
    }

    #[test]
    fn test_cancellation_is_checked() {
        let m = manager(AggregateMode::Group, false, &[&["x"]]);
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(m.compute(&token), Err(CoreError::Cancelled)));
    }
}
