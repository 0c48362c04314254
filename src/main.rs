use std::collections::HashMap;
use std::fs::OpenOptions;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tokio::sync::RwLock;
use tower_lsp_server::jsonrpc::Result as LspResult;
use tower_lsp_server::lsp_types::notification::PublishDiagnostics;
use tower_lsp_server::lsp_types::*;
use tower_lsp_server::{Client, LanguageServer, LspService, Server};
use tracing::info;
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

use aetherscript::lexer::Pos;
use aetherscript::lsp::{
    self, completions, is_builtin_location, parse_error_diagnostics, semantic_error_diagnostics,
    to_lsp_range, type_error_diagnostics, word_at, CompletionKind, RawDiagnostic,
    Severity, SymbolEntry, WorkspaceSymbolIndex,
};
use aetherscript::parser::parse;
use aetherscript::semantic::{self, SemanticInfo};
use aetherscript::typechecker;

/// CLI configuration for the AetherScript language server.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Write logs to this file in addition to stderr.
    #[arg(long)]
    pub log_file: Option<std::path::PathBuf>,

    /// Minimum severity of logged events.
    #[arg(value_enum, long, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    /// No level above `Error` exists in `tracing`; mapped to it.
    Critical,
}

impl From<LogLevel> for tracing::Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warning => tracing::Level::WARN,
            LogLevel::Error | LogLevel::Critical => tracing::Level::ERROR,
        }
    }
}

fn init_logging(cli: &Cli) -> Result<()> {
    let level: tracing::Level = cli.log_level.into();
    let targets = filter::Targets::new().with_target("aetherscript_lsp", level);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .compact()
        .with_ansi(false);

    if let Some(path) = &cli.log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening log file {}", path.display()))?;
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file)
            .compact()
            .with_ansi(false);
        tracing_subscriber::registry()
            .with(stderr_layer)
            .with(file_layer)
            .with(targets)
            .init();
    } else {
        tracing_subscriber::registry().with(stderr_layer).with(targets).init();
    }

    Ok(())
}

/// Everything the adapter keeps per open document: the raw text plus the
/// latest [`SemanticInfo`], so hover/definition/references/symbol requests
/// don't re-run the whole pipeline.
struct DocumentState {
    text: String,
    info: SemanticInfo,
}

struct Backend {
    client: Client,
    documents: Arc<RwLock<HashMap<Uri, DocumentState>>>,
    index: Arc<WorkspaceSymbolIndex>,
}

impl Backend {
    async fn analyze_and_publish(&self, uri: Uri, text: String) {
        let (program, parse_errors) = parse(&text);
        let type_errors = typechecker::check(&program);
        let info = semantic::analyze(&program);

        let mut diagnostics = Vec::new();
        diagnostics.extend(to_lsp_diagnostics(parse_error_diagnostics(&parse_errors)));
        diagnostics.extend(to_lsp_diagnostics(type_error_diagnostics(&type_errors)));
        diagnostics.extend(to_lsp_diagnostics(semantic_error_diagnostics(&info.errors)));

        self.index.update(uri.to_string(), info.clone());

        {
            let mut documents = self.documents.write().await;
            documents.insert(uri.clone(), DocumentState { text, info });
        }

        self.client
            .send_notification::<PublishDiagnostics>(PublishDiagnosticsParams {
                uri,
                version: None,
                diagnostics,
            })
            .await;
    }

    async fn document_line(&self, uri: &Uri, line: u32) -> Option<String> {
        let documents = self.documents.read().await;
        let text = &documents.get(uri)?.text;
        text.lines().nth(line as usize).map(|l| l.to_string())
    }

    async fn word_and_info(&self, uri: &Uri, position: Position) -> Option<(String, SemanticInfo)> {
        let line = self.document_line(uri, position.line).await?;
        let (word, _, _) = word_at(&line, position.character as usize)?;
        let documents = self.documents.read().await;
        let info = documents.get(uri)?.info.clone();
        Some((word, info))
    }
}

fn to_lsp_diagnostics(raw: Vec<RawDiagnostic>) -> Vec<Diagnostic> {
    raw.into_iter()
        .map(|d| Diagnostic {
            range: to_lsp_range(d.pos, d.len).into(),
            severity: Some(match d.severity {
                Severity::Error => DiagnosticSeverity::ERROR,
                Severity::Warning => DiagnosticSeverity::WARNING,
            }),
            source: Some(d.source.to_string()),
            message: d.message,
            ..Default::default()
        })
        .collect()
}

impl From<lsp::LspPosition> for Position {
    fn from(value: lsp::LspPosition) -> Self {
        Position::new(value.line, value.character)
    }
}

impl From<lsp::LspRange> for Range {
    fn from(value: lsp::LspRange) -> Self {
        Range::new(value.start.into(), value.end.into())
    }
}

fn location(uri: Uri, pos: Pos, word_len: usize) -> Location {
    Location {
        uri,
        range: to_lsp_range(pos, word_len).into(),
    }
}

impl LanguageServer for Backend {
    async fn initialize(&self, _: InitializeParams) -> LspResult<InitializeResult> {
        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(
                    TextDocumentSyncOptions {
                        open_close: Some(true),
                        change: Some(TextDocumentSyncKind::FULL),
                        save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                            include_text: Some(true),
                        })),
                        ..Default::default()
                    },
                )),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(vec![".".to_string()]),
                    ..Default::default()
                }),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                definition_provider: Some(OneOf::Left(true)),
                references_provider: Some(OneOf::Left(true)),
                document_symbol_provider: Some(OneOf::Left(true)),
                workspace_symbol_provider: Some(OneOf::Left(true)),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        info!("aetherscript-lsp initialized");
    }

    async fn shutdown(&self) -> LspResult<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let DidOpenTextDocumentParams {
            text_document: TextDocumentItem { uri, text, .. },
        } = params;
        self.analyze_and_publish(uri, text).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let DidChangeTextDocumentParams {
            text_document: VersionedTextDocumentIdentifier { uri, .. },
            content_changes,
        } = params;
        if let Some(change) = content_changes.into_iter().next() {
            self.analyze_and_publish(uri, change.text).await;
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let DidSaveTextDocumentParams {
            text_document: TextDocumentIdentifier { uri },
            text,
            ..
        } = params;
        if let Some(text) = text {
            self.analyze_and_publish(uri, text).await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.index.remove(&uri.to_string());
        let mut documents = self.documents.write().await;
        documents.remove(&uri);
    }

    async fn completion(&self, params: CompletionParams) -> LspResult<Option<CompletionResponse>> {
        let uri = params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;

        let Some(line) = self.document_line(&uri, position.line).await else {
            return Ok(None);
        };
        let prefix_end = (position.character as usize).min(line.chars().count());
        let prefix: String = line.chars().take(prefix_end).collect();
        let prefix = prefix
            .rsplit(|c: char| !(c.is_alphanumeric() || c == '_'))
            .next()
            .unwrap_or("")
            .to_string();

        let documents = self.documents.read().await;
        let Some(doc) = documents.get(&uri) else {
            return Ok(None);
        };

        let items = completions(&doc.info, &prefix)
            .into_iter()
            .map(|c| CompletionItem {
                label: c.label,
                kind: Some(match c.kind {
                    CompletionKind::Function => CompletionItemKind::FUNCTION,
                    CompletionKind::Variable => CompletionItemKind::VARIABLE,
                    CompletionKind::Keyword => CompletionItemKind::KEYWORD,
                }),
                detail: Some(c.detail),
                documentation: if c.documentation.is_empty() {
                    None
                } else {
                    Some(Documentation::String(c.documentation))
                },
                ..Default::default()
            })
            .collect();

        Ok(Some(CompletionResponse::Array(items)))
    }

    async fn hover(&self, params: HoverParams) -> LspResult<Option<Hover>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        let Some((word, info)) = self.word_and_info(&uri, position).await else {
            return Ok(None);
        };
        let core_pos = Pos::new(position.line as usize + 1, position.character as usize + 1);
        let Some(text) = info.find_hover_info(&word, core_pos) else {
            return Ok(None);
        };

        Ok(Some(Hover {
            contents: HoverContents::Markup(MarkupContent {
                kind: MarkupKind::Markdown,
                value: format!("```aetherscript\n{}\n```", text),
            }),
            range: None,
        }))
    }

    async fn goto_definition(&self, params: GotoDefinitionParams) -> LspResult<Option<GotoDefinitionResponse>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        let Some((word, info)) = self.word_and_info(&uri, position).await else {
            return Ok(None);
        };
        let core_pos = Pos::new(position.line as usize + 1, position.character as usize + 1);
        let Some(definition) = info.find_definition(&word, core_pos) else {
            return Ok(None);
        };
        if is_builtin_location(definition) {
            return Ok(None);
        }

        Ok(Some(GotoDefinitionResponse::Scalar(location(
            uri,
            definition.location,
            definition.name.chars().count(),
        ))))
    }

    async fn references(&self, params: ReferenceParams) -> LspResult<Option<Vec<Location>>> {
        let uri = params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;

        let Some((word, info)) = self.word_and_info(&uri, position).await else {
            return Ok(None);
        };
        let core_pos = Pos::new(position.line as usize + 1, position.character as usize + 1);
        let Some(definition) = info.find_definition(&word, core_pos) else {
            return Ok(None);
        };
        if is_builtin_location(definition) {
            return Ok(None);
        }

        let locations: Vec<Location> = info
            .find_all_references(&word, definition.location)
            .into_iter()
            .map(|r| location(uri.clone(), r.location, r.name.chars().count()))
            .collect();

        if locations.is_empty() {
            Ok(None)
        } else {
            Ok(Some(locations))
        }
    }

    async fn document_symbol(&self, params: DocumentSymbolParams) -> LspResult<Option<DocumentSymbolResponse>> {
        let uri = params.text_document.uri;
        let definitions = self.index.document_symbols(&uri.to_string());
        if definitions.is_empty() {
            return Ok(None);
        }

        #[allow(deprecated)]
        let symbols = definitions
            .into_iter()
            .map(|d| SymbolInformation {
                name: d.name.clone(),
                kind: definition_symbol_kind(&d),
                tags: None,
                deprecated: None,
                location: location(uri.clone(), d.location, d.name.chars().count()),
                container_name: None,
            })
            .collect();

        Ok(Some(DocumentSymbolResponse::Flat(symbols)))
    }

    async fn symbol(&self, params: WorkspaceSymbolParams) -> LspResult<Option<Vec<SymbolInformation>>> {
        let entries = self.index.workspace_symbols(&params.query);
        if entries.is_empty() {
            return Ok(None);
        }

        #[allow(deprecated)]
        let symbols = entries
            .into_iter()
            .map(|entry: SymbolEntry| {
                let uri: Uri = entry.document.parse().unwrap_or_else(|_| {
                    "file:///".parse().expect("static fallback URI is valid")
                });
                SymbolInformation {
                    name: entry.definition.name.clone(),
                    kind: definition_symbol_kind(&entry.definition),
                    tags: None,
                    deprecated: None,
                    location: location(uri, entry.definition.location, entry.definition.name.chars().count()),
                    container_name: None,
                }
            })
            .collect();

        Ok(Some(symbols))
    }
}

fn definition_symbol_kind(definition: &semantic::Definition) -> SymbolKind {
    match definition.kind {
        semantic::DefinitionKind::Function => SymbolKind::FUNCTION,
        semantic::DefinitionKind::Variable => SymbolKind::VARIABLE,
        semantic::DefinitionKind::Parameter => SymbolKind::VARIABLE,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(|client| Backend {
        client,
        documents: Arc::new(RwLock::new(HashMap::new())),
        index: Arc::new(WorkspaceSymbolIndex::new()),
    });
    Server::new(stdin, stdout, socket).serve(service).await;

    Ok(())
}
