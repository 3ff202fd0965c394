//! Compiler facade and family discovery

use crate::cache::DocumentCache;
use crate::config::CompilerConfig;
use crate::link::link;
use crate::loader::SchemaLoader;
use crate::multiplex::synthesize;
use crate::{Error, Result};
use metaschema_model::SchemaGraph;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Runs resolve, link and synthesize for one family at a time.
///
/// A `Compiler` holds no per-family state, so one instance (or several
/// sharing a [`DocumentCache`]) can compile independent families on
/// separate threads.
pub struct Compiler {
    config: CompilerConfig,
    loader: SchemaLoader,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        let loader = SchemaLoader::new(&config);
        Self { config, loader }
    }

    /// Create a compiler whose decoded documents are shared through `cache`
    pub fn with_cache(config: CompilerConfig, cache: Arc<DocumentCache>) -> Self {
        let loader = SchemaLoader::with_cache(&config, cache);
        Self { config, loader }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn loader(&self) -> &SchemaLoader {
        &self.loader
    }

    /// Compile the family whose top document is `path`; imports resolve
    /// against the directory containing it.
    pub fn compile(&self, path: &Path) -> Result<SchemaGraph> {
        let base_dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        self.compile_in(path, base_dir)
    }

    /// Compile with an explicit import base directory
    pub fn compile_in(&self, path: &Path, base_dir: &Path) -> Result<SchemaGraph> {
        let mut graph = self.loader.resolve(path, base_dir)?;
        let linked = link(&mut graph)?;
        let synthesized = synthesize(&mut graph, &self.config.multiplexer_suffix)?;

        info!(
            "Compiled {}: {} documents, {} usages linked, {} multiplexers",
            path.display(),
            graph.documents().len(),
            linked,
            synthesized
        );
        Ok(graph)
    }
}

/// Schema families in `dir`: files with the configured extension whose name
/// has no excluded prefix, sorted by path.
pub fn discover_families(dir: &Path, config: &CompilerConfig) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|err| Error::io(dir, err))?;

    let mut families = Vec::new();
    for entry in entries {
        let path = entry.map_err(|err| Error::io(dir, err))?.path();
        if !path.is_file() {
            continue;
        }
        let matches_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == config.extension);
        let excluded = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| config.is_excluded(name));
        if matches_extension && !excluded {
            families.push(path);
        }
    }

    families.sort();
    Ok(families)
}
