use anyhow::{Context, Result};
use serde_json::Value as JsonValue;
use std::{
    collections::{BTreeSet, HashMap},
    fs,
    path::{Path, PathBuf},
};
use tracing::*;

use crate::Catalog;

/// A directory of JSON files, each an object of category title to item list.
#[derive(Debug, Clone)]
pub struct FileCatalog {
    path: PathBuf,
}

impl FileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Names of the files in the catalog directory. Empty if it can't be read.
    pub fn files(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.path) else {
            return Vec::new();
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map_or(false, |t| !t.is_dir()))
            .filter_map(|entry| entry.file_name().to_str().map(|s| s.to_owned()))
            .collect();
        names.sort();

        names
    }

    /// Top level keys of one catalog file, `.json` optional. Any problem
    /// reading or parsing the file yields an empty list.
    pub fn titles(&self, file: &str) -> Vec<String> {
        match self.try_titles(file) {
            Ok(titles) => titles,
            Err(e) => {
                debug!(%file, "titles:error {:?}", e);
                Vec::new()
            }
        }
    }

    fn try_titles(&self, file: &str) -> Result<Vec<String>> {
        let Some(path) = self.resolve(file) else {
            return Ok(Vec::new());
        };

        let value: JsonValue = serde_json::from_str(&fs::read_to_string(&path)?)?;
        let titles: BTreeSet<String> = match value {
            JsonValue::Object(map) => map.keys().cloned().collect(),
            JsonValue::Array(values) => values
                .iter()
                .filter_map(|value| value.as_object())
                .flat_map(|map| map.keys().cloned())
                .collect(),
            _ => BTreeSet::new(),
        };

        Ok(titles.into_iter().collect())
    }

    /// Only the base name of `file` is used so requests can't leave the directory.
    fn resolve(&self, file: &str) -> Option<PathBuf> {
        let name = Path::new(file).file_name()?.to_str()?;

        let mut candidates = vec![name.to_owned()];
        if !name.to_lowercase().ends_with(".json") {
            candidates.push(format!("{}.json", name));
        }

        candidates
            .into_iter()
            .map(|candidate| self.path.join(candidate))
            .find(|path| path.is_file())
    }

    fn json_files(&self) -> Result<Vec<PathBuf>> {
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.path)
            .with_context(|| format!("reading catalog {}", self.path.display()))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().map_or(false, |e| e == "json"))
            .collect();
        paths.sort();

        Ok(paths)
    }
}

impl Catalog for FileCatalog {
    fn lookup(&self, title: &str) -> Result<Option<Vec<String>>> {
        for path in self.json_files()? {
            let mut categories = match read_categories(&path) {
                Ok(categories) => categories,
                Err(e) => {
                    warn!(path = %path.display(), "catalog:skipping {:?}", e);
                    continue;
                }
            };

            if let Some(items) = categories.remove(title) {
                trace!(%title, path = %path.display(), "catalog:found");
                return Ok(Some(items));
            }
        }

        Ok(None)
    }
}

fn read_categories(path: &Path) -> Result<HashMap<String, Vec<String>>> {
    let text = fs::read_to_string(path)?;

    Ok(serde_json::from_str(&text)?)
}
