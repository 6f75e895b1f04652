//! Weight table and omitted-node set
//!
//! Both accumulate over one conversion run and are consumed when the
//! program is assembled.

use indexmap::{IndexMap, IndexSet};

use crate::tensor::Tensor;

/// Generated parameter name → tensor, in registration order
#[derive(Debug, Clone, Default)]
pub struct WeightTable {
    entries: IndexMap<String, Tensor>,
}

impl WeightTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a parameter; the last write wins
    pub fn register(&mut self, name: impl Into<String>, tensor: Tensor) {
        let name = name.into();
        if let Some(previous) = self.entries.insert(name.clone(), tensor) {
            log::warn!(
                "weight `{}` registered twice, replacing {:?} {}",
                name,
                previous.shape(),
                previous.dtype()
            );
        }
    }

    /// Get a parameter by name
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.entries.get(name)
    }

    /// Check if a parameter is registered
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in registration order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Tensor)> {
        self.entries.iter()
    }

    /// Consume into the underlying map
    pub fn into_inner(self) -> IndexMap<String, Tensor> {
        self.entries
    }
}

/// Node names folded into a consumer and excluded at assembly
#[derive(Debug, Clone, Default)]
pub struct OmittedNodeSet {
    names: IndexSet<String>,
}

impl OmittedNodeSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a node as omitted
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.names.insert(name.into())
    }

    /// Check if node is omitted
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Number of omitted nodes
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if set is empty
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.names.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_last_write_wins() {
        let mut table = WeightTable::new();
        table.register("w", Tensor::vec_i64(&[1]));
        table.register("b", Tensor::vec_i64(&[2]));
        table.register("w", Tensor::vec_i64(&[3, 4]));

        assert_eq!(table.len(), 2);
        assert_eq!(table.get("w").unwrap().to_i64_vec(), vec![3, 4]);
        let names: Vec<_> = table.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["w", "b"]);
    }

    #[test]
    fn test_omitted_set() {
        let mut set = OmittedNodeSet::new();
        assert!(set.insert("w"));
        assert!(!set.insert("w"));
        assert!(set.contains("w"));
        assert!(!set.contains("x"));
        assert_eq!(set.len(), 1);
    }
}
