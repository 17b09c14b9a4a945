// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Document-query model produced by the SQL translator and executed by the
//! catalog. The filter is a nested document tree in the catalog's native
//! operator vocabulary; the projection maps field names to 1.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DocumentQuery {
    pub filter: Value,
    pub projection: BTreeMap<String, i32>,
}

impl DocumentQuery {
    pub fn new(filter: Value, projection: BTreeMap<String, i32>) -> Self {
        Self { filter, projection }
    }

    /// An empty filter selects everything; an empty projection is the
    /// catalog's default projection.
    pub fn select_all() -> Self {
        Self {
            filter: Value::Object(serde_json::Map::new()),
            projection: BTreeMap::new(),
        }
    }

    pub fn filter_is_empty(&self) -> bool {
        matches!(&self.filter, Value::Object(map) if map.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn select_all_is_empty() {
        let query = DocumentQuery::select_all();
        assert!(query.filter_is_empty());
        assert!(query.projection.is_empty());
    }

    #[test]
    fn non_empty_filter_detected() {
        let query = DocumentQuery::new(json!({"name": "cat"}), BTreeMap::new());
        assert!(!query.filter_is_empty());
    }
}
