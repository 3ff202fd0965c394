//! Import resolution: builds the import forest of one schema family

use crate::cache::DocumentCache;
use crate::config::CompilerConfig;
use crate::decode;
use crate::xml::EntityMap;
use crate::{Error, Result};
use metaschema_model::{DocumentId, RawDocument, SchemaGraph};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Loads a document and, recursively, everything it imports
pub struct SchemaLoader {
    cache: Arc<DocumentCache>,
    entities: EntityMap,
}

impl SchemaLoader {
    /// Create a loader with its own cache
    pub fn new(config: &CompilerConfig) -> Self {
        Self::with_cache(config, Arc::new(DocumentCache::new()))
    }

    /// Create a loader sharing `cache` with other loaders
    pub fn with_cache(config: &CompilerConfig, cache: Arc<DocumentCache>) -> Self {
        Self {
            cache,
            entities: config.entities.clone(),
        }
    }

    /// Decode `path` and every document it imports into a fresh graph.
    ///
    /// Imports resolve against `base_dir`. A document reached along two
    /// import paths is inserted once per path. Any failure discards the
    /// whole graph.
    pub fn resolve(&self, path: &Path, base_dir: &Path) -> Result<SchemaGraph> {
        let mut graph = SchemaGraph::new();
        let mut active = Vec::new();
        let root = self.resolve_into(&mut graph, path, base_dir, &mut active)?;

        info!(
            "Resolved '{}': {} documents, {} declarations",
            graph.document(root).name(),
            graph.documents().len(),
            graph.declarations().len()
        );
        Ok(graph)
    }

    fn resolve_into(
        &self,
        graph: &mut SchemaGraph,
        path: &Path,
        base_dir: &Path,
        active: &mut Vec<PathBuf>,
    ) -> Result<DocumentId> {
        let key = normalize(path);
        if active.contains(&key) {
            let mut chain: Vec<String> = active.iter().map(|p| p.display().to_string()).collect();
            chain.push(key.display().to_string());
            return Err(Error::ImportCycle { chain });
        }

        let raw = self.load(&key)?;
        let doc = graph.insert(RawDocument::clone(&raw));

        active.push(key);
        for import in &raw.imports {
            debug!("{} imports {}", raw.header.name, import.href);
            let child = self.resolve_into(graph, &base_dir.join(&import.href), base_dir, active)?;
            graph.add_import(doc, child);
        }
        active.pop();

        Ok(doc)
    }

    /// Decoded document at `path`, from the cache when possible
    pub fn load(&self, path: &Path) -> Result<Arc<RawDocument>> {
        self.cache
            .get_or_decode(path, || decode::decode_file(path, &self.entities))
    }

    /// Get the cache (for testing/debugging)
    pub fn cache(&self) -> &DocumentCache {
        &self.cache
    }
}

/// Lexical normalisation so `./a.xml` and `a.xml` share a cache entry
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, format!("<METASCHEMA><short-name>{}</short-name>{body}</METASCHEMA>", name.trim_end_matches(".xml"))).unwrap();
        path
    }

    fn loader() -> SchemaLoader {
        SchemaLoader::new(&CompilerConfig::default())
    }

    #[test]
    fn test_resolve_single_document() {
        let dir = TempDir::new().unwrap();
        let root = write(&dir, "root.xml", r#"<define-flag name="id"/>"#);

        let graph = loader().resolve(&root, dir.path()).unwrap();
        assert_eq!(graph.documents().len(), 1);
        assert_eq!(graph.document(graph.root().unwrap()).name(), "root");
        assert_eq!(graph.declarations().len(), 1);
    }

    #[test]
    fn test_imports_attached_in_order() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.xml", "");
        write(&dir, "b.xml", "");
        let root = write(&dir, "root.xml", r#"<import href="a.xml"/><import href="b.xml"/>"#);

        let graph = loader().resolve(&root, dir.path()).unwrap();
        let root_doc = graph.document(graph.root().unwrap());
        let names: Vec<&str> = root_doc
            .imported
            .iter()
            .map(|&id| graph.document(id).name())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_diamond_is_duplicated() {
        let dir = TempDir::new().unwrap();
        write(&dir, "common.xml", r#"<define-flag name="id"/>"#);
        write(&dir, "left.xml", r#"<import href="common.xml"/>"#);
        write(&dir, "right.xml", r#"<import href="common.xml"/>"#);
        let root = write(&dir, "root.xml", r#"<import href="left.xml"/><import href="right.xml"/>"#);

        let loader = loader();
        let graph = loader.resolve(&root, dir.path()).unwrap();
        let common: Vec<_> = graph
            .documents()
            .iter()
            .filter(|d| d.name() == "common")
            .collect();
        assert_eq!(common.len(), 2);
        assert_ne!(common[0].flags[0], common[1].flags[0]);
        assert_eq!(graph.declaration(common[0].flags[0]).owner, common[0].id);
        assert_eq!(graph.declaration(common[1].flags[0]).owner, common[1].id);

        // decoded once, inserted twice
        assert_eq!(loader.cache().len(), 4);
        assert_eq!(loader.cache().hits(), 1);
    }

    #[test]
    fn test_imports_resolve_against_base_dir() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        write(&dir, "shared.xml", "");
        fs::write(
            dir.path().join("nested/child.xml"),
            r#"<METASCHEMA><import href="shared.xml"/></METASCHEMA>"#,
        )
        .unwrap();
        let root = write(&dir, "root.xml", r#"<import href="nested/child.xml"/>"#);

        let graph = loader().resolve(&root, dir.path()).unwrap();
        assert_eq!(graph.documents().len(), 3);
    }

    #[test]
    fn test_missing_import_is_io_error() {
        let dir = TempDir::new().unwrap();
        let root = write(&dir, "root.xml", r#"<import href="absent.xml"/>"#);

        match loader().resolve(&root, dir.path()) {
            Err(Error::Io { path, .. }) => assert!(path.ends_with("absent.xml")),
            other => panic!("expected I/O error, got {other:?}"),
        }
    }

    #[test]
    fn test_format_error_in_import_propagates() {
        let dir = TempDir::new().unwrap();
        write(&dir, "broken.xml", "<import/>");
        let root = write(&dir, "root.xml", r#"<import href="broken.xml"/>"#);

        let err = loader().resolve(&root, dir.path()).unwrap_err();
        assert!(matches!(err, Error::Format { ref element, .. } if element == "import"));
    }

    #[test]
    fn test_import_cycle_detected() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.xml", r#"<import href="b.xml"/>"#);
        write(&dir, "b.xml", r#"<import href="./a.xml"/>"#);

        let err = loader().resolve(&dir.path().join("a.xml"), dir.path()).unwrap_err();
        match err {
            Error::ImportCycle { chain } => {
                assert_eq!(chain.len(), 3);
                assert!(chain[0].ends_with("a.xml"));
                assert_eq!(chain[0], chain[2]);
            }
            other => panic!("expected import cycle, got {other}"),
        }
    }

    #[test]
    fn test_shared_cache_between_loaders() {
        let dir = TempDir::new().unwrap();
        let root = write(&dir, "root.xml", "");
        let cache = Arc::new(DocumentCache::new());
        let config = CompilerConfig::default();

        SchemaLoader::with_cache(&config, Arc::clone(&cache))
            .resolve(&root, dir.path())
            .unwrap();
        SchemaLoader::with_cache(&config, Arc::clone(&cache))
            .resolve(&root, dir.path())
            .unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn test_normalize_strips_current_dir() {
        assert_eq!(normalize(Path::new("./a/./b.xml")), PathBuf::from("a/b.xml"));
    }
}
