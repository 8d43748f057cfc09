use anyhow::Result;
use std::collections::HashMap;

use crate::Catalog;

#[derive(Default, Clone, Debug)]
pub struct MemoryCatalog {
    categories: HashMap<String, Vec<String>>,
}

impl MemoryCatalog {
    pub fn with(mut self, title: &str, items: &[&str]) -> Self {
        self.categories.insert(
            title.to_owned(),
            items.iter().map(|item| item.to_string()).collect(),
        );
        self
    }
}

impl Catalog for MemoryCatalog {
    fn lookup(&self, title: &str) -> Result<Option<Vec<String>>> {
        Ok(self.categories.get(title).cloned())
    }
}
