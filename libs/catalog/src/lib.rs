use anyhow::Result;

mod files;
mod memory;

pub use files::FileCatalog;
pub use memory::MemoryCatalog;

pub trait Catalog: Send + Sync {
    /// Items for `title` in catalog order, `None` when no category has that title.
    fn lookup(&self, title: &str) -> Result<Option<Vec<String>>>;
}
