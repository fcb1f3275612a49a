use std::collections::HashSet;

/// Tables whose CREATE statement has been issued by this adapter instance.
///
/// Names are compared case-insensitively (stored lowercased). Entries are
/// never removed: the schema seen first stays authoritative until the
/// adapter is dropped.
#[derive(Debug, Default)]
pub struct TableRegistry {
    created: HashSet<String>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normalize(table_name: &str) -> String {
        table_name.to_lowercase()
    }

    pub fn is_registered(&self, table_name: &str) -> bool {
        self.created.contains(&Self::normalize(table_name))
    }

    /// Returns `false` if the table was already registered.
    pub fn register(&mut self, table_name: &str) -> bool {
        self.created.insert(Self::normalize(table_name))
    }

    pub fn len(&self) -> usize {
        self.created.len()
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
    }

    pub fn tables(&self) -> Vec<String> {
        let mut tables: Vec<String> = self.created.iter().cloned().collect();
        tables.sort();
        tables
    }
}
