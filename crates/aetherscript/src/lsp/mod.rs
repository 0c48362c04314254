//! LSP-facing helpers: position conversion, word-under-cursor extraction,
//! completion candidate enumeration, diagnostic-message parsing, and a
//! cross-document symbol index.
//!
//! Kept dependency-light and `tower-lsp-server`-free (no `async`, no wire
//! types) so it stays unit-testable without a runtime — the binary crate
//! (`src/main.rs`) does the final conversion into `tower_lsp_server::lsp_types`
//! values.

mod position;
mod symbol_index;
mod word;

pub use position::{to_lsp_position, to_lsp_range, LspPosition, LspRange};
pub use symbol_index::{SymbolEntry, WorkspaceSymbolIndex};
pub use word::word_at;

use crate::parser::ParseError;
use crate::semantic::{Definition, DefinitionKind, SemanticInfo, BUILTIN_LOCATION};
use crate::typechecker::TypeError;

/// The fixed 15-entry keyword list advertised for completion.
pub const KEYWORDS: &[&str] = &[
    "if", "else", "elif", "while", "for", "return", "break", "continue", "function", "spell", "ritual", "conjure",
    "entity", "realm", "dimension",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    Function,
    Variable,
    Keyword,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionCandidate {
    pub label: String,
    pub kind: CompletionKind,
    pub detail: String,
    pub documentation: String,
}

/// Enumerates completion candidates from `info`'s definitions plus the
/// fixed keyword list, filtered by `prefix` (empty prefix returns
/// everything).
pub fn completions(info: &SemanticInfo, prefix: &str) -> Vec<CompletionCandidate> {
    let mut candidates = Vec::new();

    for (name, defs) in &info.definitions {
        if !prefix.is_empty() && !name.starts_with(prefix) {
            continue;
        }
        for definition in defs {
            let kind = match definition.kind {
                DefinitionKind::Function => CompletionKind::Function,
                DefinitionKind::Variable | DefinitionKind::Parameter => CompletionKind::Variable,
            };
            candidates.push(CompletionCandidate {
                label: name.clone(),
                kind,
                detail: format!("{}: {}", definition.kind.as_str(), definition.type_name),
                documentation: definition.detail.clone(),
            });
        }
    }

    for keyword in KEYWORDS {
        if !prefix.is_empty() && !keyword.starts_with(prefix) {
            continue;
        }
        candidates.push(CompletionCandidate {
            label: keyword.to_string(),
            kind: CompletionKind::Keyword,
            detail: "keyword".to_string(),
            documentation: String::new(),
        });
    }

    candidates
}

/// The two diagnostic severities used across the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawDiagnostic {
    pub message: String,
    pub pos: crate::lexer::Pos,
    /// Length, in characters, of the span to underline — word length for
    /// semantic errors, one character for most type errors, the offending
    /// token's lexeme length for parse errors.
    pub len: usize,
    pub severity: Severity,
    pub source: &'static str,
}

/// Converts parse errors into diagnostics. Source: `"aetherscript-parser"`,
/// severity: `Error`.
pub fn parse_error_diagnostics(errors: &[ParseError]) -> Vec<RawDiagnostic> {
    errors
        .iter()
        .map(|e| RawDiagnostic {
            message: e.message.clone(),
            pos: e.pos(),
            len: e.token.lexeme.chars().count().max(1),
            severity: Severity::Error,
            source: "aetherscript-parser",
        })
        .collect()
}

/// Converts type errors into diagnostics. Source:
/// `"aetherscript-type-checker"`, severity: `Error`.
pub fn type_error_diagnostics(errors: &[TypeError]) -> Vec<RawDiagnostic> {
    errors
        .iter()
        .map(|e| RawDiagnostic {
            message: e.message.clone(),
            pos: crate::lexer::Pos::new(e.line, e.column),
            len: 1,
            severity: Severity::Error,
            source: "aetherscript-type-checker",
        })
        .collect()
}

/// Converts free-form semantic error strings (each ending in `" at
/// L:C"`) into diagnostics, re-parsing the trailing location at the
/// boundary. A string with no parseable suffix falls back to `(1,1)` so no
/// diagnostic is silently dropped.
pub fn semantic_error_diagnostics(errors: &[String]) -> Vec<RawDiagnostic> {
    errors
        .iter()
        .map(|raw| {
            let (message, pos) = parse_semantic_error(raw);
            RawDiagnostic {
                message,
                pos,
                len: 1,
                severity: Severity::Warning,
                source: "aetherscript-semantic-analyzer",
            }
        })
        .collect()
}

fn parse_semantic_error(raw: &str) -> (String, crate::lexer::Pos) {
    if let Some(at_idx) = raw.rfind(" at ") {
        let (message, suffix) = raw.split_at(at_idx);
        let suffix = &suffix[" at ".len()..];
        if let Some((line_str, col_str)) = suffix.split_once(':') {
            if let (Ok(line), Ok(column)) = (line_str.parse(), col_str.parse()) {
                return (message.to_string(), crate::lexer::Pos::new(line, column));
            }
        }
    }
    (raw.to_string(), crate::lexer::Pos::new(1, 1))
}

/// Whether `definition` sits at the synthetic builtin location — the LSP
/// boundary suppresses go-to-definition/references for these.
pub fn is_builtin_location(definition: &Definition) -> bool {
    definition.location == BUILTIN_LOCATION
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::semantic::analyze;

    #[test]
    fn completions_include_definitions_and_keywords() {
        let (program, _) = parse("var x: Int = 1;");
        let info = analyze(&program);
        let items = completions(&info, "");
        assert!(items.iter().any(|c| c.label == "x" && c.kind == CompletionKind::Variable));
        assert!(items.iter().any(|c| c.label == "if" && c.kind == CompletionKind::Keyword));
    }

    #[test]
    fn completions_filtered_by_prefix() {
        let (program, _) = parse("var xray: Int = 1; var yankee: Int = 2;");
        let info = analyze(&program);
        let items = completions(&info, "x");
        assert!(items.iter().any(|c| c.label == "xray"));
        assert!(!items.iter().any(|c| c.label == "yankee"));
    }

    #[test]
    fn semantic_error_suffix_is_parsed_back_out() {
        let (message, pos) = parse_semantic_error("Undefined identifier 'y' at 3:7");
        assert_eq!(message, "Undefined identifier 'y'");
        assert_eq!(pos, crate::lexer::Pos::new(3, 7));
    }

    #[test]
    fn semantic_error_without_suffix_falls_back_to_one_one() {
        let (message, pos) = parse_semantic_error("something went wrong");
        assert_eq!(message, "something went wrong");
        assert_eq!(pos, crate::lexer::Pos::new(1, 1));
    }

    #[test]
    fn builtin_print_definition_is_flagged() {
        let (program, _) = parse("print(1);");
        let info = analyze(&program);
        let def = info.find_definition("print", crate::lexer::Pos::new(1, 1)).unwrap();
        assert!(is_builtin_location(def));
    }
}
