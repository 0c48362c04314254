//! Cross-document symbol index backing `workspace/symbol`: a concurrent map
//! over per-document data, queried by name substring.
//!
//! Keyed by a plain document identifier (a URI string, in practice) rather
//! than `tower_lsp_server::Uri` directly — the library crate stays
//! transport-agnostic; the binary hands in `uri.to_string()`.

use dashmap::DashMap;

use crate::semantic::{Definition, SemanticInfo};

/// One definition plus the document it was found in — the shape
/// `workspace/symbol` needs to build an LSP `Location`.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolEntry {
    pub document: String,
    pub definition: Definition,
}

/// Holds the latest [`SemanticInfo`] for every currently-open document.
#[derive(Debug, Default)]
pub struct WorkspaceSymbolIndex {
    documents: DashMap<String, SemanticInfo>,
}

impl WorkspaceSymbolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the previous analysis for `document`, if any — a newer run
    /// fully supersedes the older one.
    pub fn update(&self, document: impl Into<String>, info: SemanticInfo) {
        self.documents.insert(document.into(), info);
    }

    pub fn remove(&self, document: &str) {
        self.documents.remove(document);
    }

    /// All definitions recorded for `document`, flattened across names —
    /// feeds `textDocument/documentSymbol`.
    pub fn document_symbols(&self, document: &str) -> Vec<Definition> {
        let Some(info) = self.documents.get(document) else {
            return Vec::new();
        };
        info.definitions.values().flatten().cloned().collect()
    }

    /// Every definition across every tracked document whose name contains
    /// `query` case-insensitively (an empty query matches everything) —
    /// feeds `workspace/symbol`.
    pub fn workspace_symbols(&self, query: &str) -> Vec<SymbolEntry> {
        let query = query.to_lowercase();
        let mut results = Vec::new();
        for entry in self.documents.iter() {
            let document = entry.key().clone();
            for definitions in entry.value().definitions.values() {
                for definition in definitions {
                    if !query.is_empty() && !definition.name.to_lowercase().contains(&query) {
                        continue;
                    }
                    results.push(SymbolEntry {
                        document: document.clone(),
                        definition: definition.clone(),
                    });
                }
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::semantic::analyze;

    fn info_for(src: &str) -> SemanticInfo {
        let (program, _) = parse(src);
        analyze(&program)
    }

    #[test]
    fn document_symbols_only_returns_tracked_document() {
        let index = WorkspaceSymbolIndex::new();
        index.update("a.aether", info_for("var x: Int = 1;"));
        assert!(!index.document_symbols("a.aether").is_empty());
        assert!(index.document_symbols("b.aether").is_empty());
    }

    #[test]
    fn workspace_symbols_search_across_documents() {
        let index = WorkspaceSymbolIndex::new();
        index.update("a.aether", info_for("var alpha: Int = 1;"));
        index.update("b.aether", info_for("var beta: Int = 2;"));

        let results = index.workspace_symbols("alpha");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document, "a.aether");
    }

    #[test]
    fn workspace_symbols_query_is_case_insensitive() {
        let index = WorkspaceSymbolIndex::new();
        index.update("a.aether", info_for("var Alpha: Int = 1;"));
        assert_eq!(index.workspace_symbols("ALPHA").len(), 1);
    }

    #[test]
    fn removing_a_document_drops_its_symbols() {
        let index = WorkspaceSymbolIndex::new();
        index.update("a.aether", info_for("var x: Int = 1;"));
        index.remove("a.aether");
        assert!(index.document_symbols("a.aether").is_empty());
        assert!(index.workspace_symbols("x").is_empty());
    }
}
