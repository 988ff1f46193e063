//! Configured sources and their restored stores.

use std::collections::HashMap;

use anyhow::Result;
use tracing::{info, warn};

use backstory_core::config::{Settings, SourceSettings};
use backstory_core::error::Error;
use backstory_core::types::SourceId;
use backstory_vector::VectorStore;

#[derive(Debug, Default)]
pub struct StoreCatalog {
    sources: Vec<SourceSettings>,
    stores: HashMap<SourceId, VectorStore>,
}

impl StoreCatalog {
    pub fn new(sources: Vec<SourceSettings>) -> Self {
        Self { sources, stores: HashMap::new() }
    }

    /// Restores the store of every configured source.
    ///
    /// Sources whose store was never built are left unloaded and logged;
    /// corrupt artifacts are an error.
    pub fn load(settings: &Settings) -> Result<Self> {
        let mut catalog = Self::new(settings.sources.clone());
        for source in &settings.sources {
            let dir = settings.store_dir(source);
            let mut store = VectorStore::new(&dir);
            if store.restore()? {
                info!(source = %source.id, vectors = store.len(), "loaded store");
                catalog.stores.insert(source.id.clone(), store);
            } else {
                warn!(source = %source.id, dir = %dir.display(), "store not built, requests for it will be skipped");
            }
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, id: SourceId, store: VectorStore) {
        self.stores.insert(id, store);
    }

    pub fn loaded(&self) -> usize {
        self.stores.len()
    }

    /// Source whose id, title or alias equals `name`, ignoring case and spacing.
    pub fn resolve(&self, name: &str) -> Option<SourceId> {
        let wanted = normalize(name);
        if wanted.is_empty() {
            return None;
        }
        self.sources
            .iter()
            .find(|s| {
                normalize(s.id.as_str()) == wanted
                    || normalize(&s.title) == wanted
                    || s.aliases.iter().any(|a| normalize(a) == wanted)
            })
            .map(|s| s.id.clone())
    }

    pub fn store(&self, id: &SourceId) -> Option<&VectorStore> {
        self.stores.get(id)
    }

    /// Fails when a loaded store was built with a different vector size than `dim`.
    pub fn ensure_dim(&self, dim: usize) -> backstory_core::Result<()> {
        let mut ids: Vec<&SourceId> = self.stores.keys().collect();
        ids.sort();
        for id in ids {
            let Some(stored) = self.stores.get(id).and_then(|s| s.index().dim()) else { continue };
            if stored != dim {
                return Err(Error::InvalidConfig(format!(
                    "store '{id}' holds {stored}-d vectors but the query encoder produces {dim}-d; \
                     rebuild the store or point embedding.model_dir at the model it was built with"
                )));
            }
        }
        Ok(())
    }
}

fn normalize(name: &str) -> String {
    name.split_whitespace().map(str::to_lowercase).collect::<Vec<_>>().join(" ")
}
