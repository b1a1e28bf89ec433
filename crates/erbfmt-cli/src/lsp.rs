//! LSP server for erbfmt editor integration
//!
//! Provides whole-document and range formatting for ERB files.
//!
//! Usage:
//!   erbfmt --lsp
//!
//! Settings are read from `initializationOptions` and from
//! `workspace/didChangeConfiguration`, either as a bare object or nested
//! under `erbBeautify`:
//! ```json
//! {
//!   "erbBeautify": {
//!     "useBundler": true,
//!     "ignoreFormatFilePatterns": ["**/*.text.erb"]
//!   }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use dashmap::DashMap;
use erbfmt_core::{Config, ConfigSource, FormatOutcome, FormatService};
use serde_json::Value;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService, Server};

/// Keys editors nest our settings under
const SETTINGS_SECTIONS: &[&str] = &["erbBeautify", "vscode-erb-beautify", "erbfmt"];

/// erbfmt LSP server backend
pub struct ErbfmtLsp {
    client: Client,
    /// Settings from `.erbfmt.toml`; editor settings are layered on top
    base: Config,
    service: FormatService<RwLock<Config>>,
    workspace_root: RwLock<Option<PathBuf>>,
    documents: DashMap<Url, String>,
}

impl ErbfmtLsp {
    pub fn new(client: Client, base: Config) -> Self {
        Self {
            client,
            service: FormatService::new(RwLock::new(base.clone())),
            base,
            workspace_root: RwLock::new(None),
            documents: DashMap::new(),
        }
    }

    /// Replace the current settings with `settings` layered over the base config
    ///
    /// A payload that carries no settings object leaves the current ones alone.
    fn apply_settings(&self, settings: &Value) -> std::result::Result<(), serde_json::Error> {
        let Some(mut config) = merge_settings(&self.base, settings)? else {
            tracing::debug!(%settings, "no settings object, keeping current settings");
            return Ok(());
        };
        if config.working_directory.is_none() {
            config.working_directory = self.root();
        }

        tracing::info!(?config, "settings updated");
        match self.service.source().write() {
            Ok(mut current) => *current = config,
            Err(poisoned) => *poisoned.into_inner() = config,
        }
        Ok(())
    }

    fn root(&self) -> Option<PathBuf> {
        match self.workspace_root.read() {
            Ok(root) => root.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Format `text` with a fresh settings snapshot
    ///
    /// Returns `None` for ignored files and on failure; failures are shown
    /// to the user and the document is left alone.
    async fn format_text(&self, text: &str, path: &Path, options: &FormattingOptions) -> Option<String> {
        let mut config = self.service.source().snapshot();
        if let Some(insert) = options.insert_final_newline {
            config.insert_final_newline = insert;
        }

        match self.service.format_with_config(&config, text, path).await {
            Ok(FormatOutcome::Formatted(formatted)) => Some(formatted),
            Ok(FormatOutcome::Ignored(_)) => None,
            Err(err) => {
                self.client
                    .show_message(
                        MessageType::ERROR,
                        format!("Error occurred while formatting: {}", err),
                    )
                    .await;
                None
            }
        }
    }
}

/// Overlay editor `settings` on `base`
///
/// Settings may be the bare object or nested under one of [`SETTINGS_SECTIONS`].
/// Returns `None` when there is no settings object to apply.
fn merge_settings(base: &Config, settings: &Value) -> serde_json::Result<Option<Config>> {
    let section = SETTINGS_SECTIONS
        .iter()
        .find_map(|key| settings.get(*key))
        .unwrap_or(settings);

    let Value::Object(overrides) = section else {
        return Ok(None);
    };

    // Round-trip through JSON so unspecified keys keep their base value
    let mut merged = serde_json::to_value(base)?;
    if let Value::Object(fields) = &mut merged {
        for (key, value) in overrides {
            fields.insert(key.clone(), value.clone());
        }
    }
    serde_json::from_value(merged).map(Some)
}

fn uri_to_path(uri: &Url) -> PathBuf {
    uri.to_file_path()
        .unwrap_or_else(|_| PathBuf::from(uri.path()))
}

/// Byte offset of an LSP position (UTF-16 columns), clamped to the text
fn offset_at(text: &str, position: Position) -> usize {
    let mut line_start = 0;
    for _ in 0..position.line {
        match text[line_start..].find('\n') {
            Some(i) => line_start += i + 1,
            None => return text.len(),
        }
    }

    let rest = &text[line_start..];
    let line = &rest[..rest.find('\n').unwrap_or(rest.len())];
    let line = line.strip_suffix('\r').unwrap_or(line);

    let mut units = 0;
    for (i, ch) in line.char_indices() {
        if units >= position.character {
            return line_start + i;
        }
        units += ch.len_utf16() as u32;
    }
    line_start + line.len()
}

/// Position just past the last character
fn end_position(text: &str) -> Position {
    let line = text.matches('\n').count() as u32;
    let last_line = text.rsplit('\n').next().unwrap_or("");
    let character = last_line.encode_utf16().count() as u32;
    Position { line, character }
}

fn full_range(text: &str) -> Range {
    Range {
        start: Position {
            line: 0,
            character: 0,
        },
        end: end_position(text),
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for ErbfmtLsp {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        #[allow(deprecated)]
        let root = params
            .workspace_folders
            .as_ref()
            .and_then(|folders| folders.first())
            .and_then(|folder| folder.uri.to_file_path().ok())
            .or_else(|| params.root_uri.as_ref().and_then(|uri| uri.to_file_path().ok()));

        match self.workspace_root.write() {
            Ok(mut current) => *current = root,
            Err(poisoned) => *poisoned.into_inner() = root,
        }

        // Always install a snapshot so the workspace root becomes the cwd
        let settings = match params.initialization_options {
            Some(options @ Value::Object(_)) => options,
            _ => Value::Object(Default::default()),
        };
        if let Err(err) = self.apply_settings(&settings) {
            tracing::warn!(%err, "invalid initializationOptions, using defaults");
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                document_formatting_provider: Some(OneOf::Left(true)),
                document_range_formatting_provider: Some(OneOf::Left(true)),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "erbfmt".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "erbfmt LSP server initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        if let Err(err) = self.apply_settings(&params.settings) {
            self.client
                .show_message(
                    MessageType::WARNING,
                    format!("Invalid erbfmt settings, keeping previous ones: {}", err),
                )
                .await;
        }
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        self.documents
            .insert(params.text_document.uri, params.text_document.text);
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        // Full sync: the last change carries the whole document
        if let Some(change) = params.content_changes.into_iter().last() {
            self.documents.insert(params.text_document.uri, change.text);
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        self.documents.remove(&params.text_document.uri);
    }

    async fn formatting(&self, params: DocumentFormattingParams) -> Result<Option<Vec<TextEdit>>> {
        let uri = params.text_document.uri;
        let Some(text) = self.documents.get(&uri).map(|doc| doc.value().clone()) else {
            return Ok(None);
        };

        let formatted = self
            .format_text(&text, &uri_to_path(&uri), &params.options)
            .await;

        Ok(formatted
            .filter(|new_text| *new_text != text)
            .map(|new_text| {
                vec![TextEdit {
                    range: full_range(&text),
                    new_text,
                }]
            }))
    }

    async fn range_formatting(
        &self,
        params: DocumentRangeFormattingParams,
    ) -> Result<Option<Vec<TextEdit>>> {
        let uri = params.text_document.uri;
        let Some(text) = self.documents.get(&uri).map(|doc| doc.value().clone()) else {
            return Ok(None);
        };

        let start = offset_at(&text, params.range.start);
        let end = offset_at(&text, params.range.end).max(start);
        let selection = &text[start..end];

        let formatted = self
            .format_text(selection, &uri_to_path(&uri), &params.options)
            .await;

        Ok(formatted
            .filter(|new_text| new_text != selection)
            .map(|new_text| {
                vec![TextEdit {
                    range: params.range,
                    new_text,
                }]
            }))
    }
}

/// Run the LSP server on stdio
pub async fn run_lsp_server(base: Config) {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(move |client| ErbfmtLsp::new(client, base));
    Server::new(stdin, stdout, socket).serve(service).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pos(line: u32, character: u32) -> Position {
        Position { line, character }
    }

    #[test]
    fn test_offset_at() {
        let text = "<div>\n  <p>x</p>\r\n</div>";
        assert_eq!(offset_at(text, pos(0, 0)), 0);
        assert_eq!(offset_at(text, pos(0, 5)), 5);
        assert_eq!(offset_at(text, pos(1, 2)), 8);
        // Past the end of a CRLF line stops before the \r
        assert_eq!(offset_at(text, pos(1, 99)), 16);
        assert_eq!(offset_at(text, pos(2, 6)), text.len());
        assert_eq!(offset_at(text, pos(9, 0)), text.len());
    }

    #[test]
    fn test_offset_at_utf16() {
        // 'é' is one UTF-16 unit, '😀' is two
        let text = "é😀x";
        assert_eq!(offset_at(text, pos(0, 1)), 2);
        assert_eq!(offset_at(text, pos(0, 3)), 6);
        assert_eq!(&text[offset_at(text, pos(0, 3))..], "x");
    }

    #[test]
    fn test_end_position() {
        assert_eq!(end_position(""), pos(0, 0));
        assert_eq!(end_position("<p>x</p>"), pos(0, 8));
        assert_eq!(end_position("<p>\n</p>\n"), pos(2, 0));
        assert_eq!(end_position("a\r\nbé"), pos(1, 2));
    }

    #[test]
    fn test_merge_settings_sections() {
        let base = Config {
            indent_by: 3,
            ..Default::default()
        };

        let nested = merge_settings(&base, &json!({"erbBeautify": {"tab": true}}))
            .unwrap()
            .unwrap();
        assert!(nested.tab);
        assert_eq!(nested.indent_by, 3);

        let legacy =
            merge_settings(&base, &json!({"vscode-erb-beautify": {"indentBy": 6}}))
                .unwrap()
                .unwrap();
        assert_eq!(legacy.indent_by, 6);

        let bare = merge_settings(&base, &json!({"useBundler": true, "unknown": 1}))
            .unwrap()
            .unwrap();
        assert!(bare.use_bundler);

        assert_eq!(merge_settings(&base, &Value::Null).unwrap(), None);
        assert_eq!(merge_settings(&base, &json!({"erbBeautify": null})).unwrap(), None);
        assert_eq!(merge_settings(&base, &json!([1, 2])).unwrap(), None);
    }

    #[test]
    fn test_merge_settings_round_trips_base() {
        let mut base = Config {
            eol: erbfmt_core::EndOfLine::CrLf,
            timeout_ms: Some(1500),
            working_directory: Some(PathBuf::from("/srv/app")),
            ..Default::default()
        };
        base.custom_env_var
            .insert("RUBYOPT".to_string(), "-W0".to_string());
        base.executable_extensions.execute.windows = ".cmd".to_string();

        assert_eq!(merge_settings(&base, &json!({})).unwrap(), Some(base));
    }

    #[test]
    fn test_merge_settings_rejects_bad_values() {
        let base = Config::default();
        assert!(merge_settings(&base, &json!({"indentBy": "four"})).is_err());
    }

    #[tokio::test]
    async fn test_empty_configuration_change_keeps_settings() {
        let (service, _socket) = LspService::new(|client| ErbfmtLsp::new(client, Config::default()));
        let server = service.inner();

        server
            .initialize(InitializeParams {
                initialization_options: Some(json!({
                    "erbBeautify": {"indentBy": 6, "useBundler": true}
                })),
                ..Default::default()
            })
            .await
            .unwrap();
        let configured = server.service.source().snapshot();
        assert_eq!(configured.indent_by, 6);
        assert!(configured.use_bundler);

        server
            .did_change_configuration(DidChangeConfigurationParams {
                settings: Value::Null,
            })
            .await;
        assert_eq!(server.service.source().snapshot(), configured);

        server
            .did_change_configuration(DidChangeConfigurationParams {
                settings: json!({"erbBeautify": {"indentBy": 4}}),
            })
            .await;
        let changed = server.service.source().snapshot();
        assert_eq!(changed.indent_by, 4);
        // A change replaces the editor settings; the base config is the fallback
        assert!(!changed.use_bundler);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_formatting_requests() {
        let (service, _socket) = LspService::new(|client| {
            // `true` accepts any arguments and prints nothing
            let base = Config {
                execute_path: "true".to_string(),
                ignore_format_file_patterns: vec!["**/*.text.erb".to_string()],
                ..Default::default()
            };
            ErbfmtLsp::new(client, base)
        });
        let server = service.inner();

        server
            .initialize(InitializeParams::default())
            .await
            .unwrap();

        let uri = Url::parse("file:///app/views/index.html.erb").unwrap();
        let text = "<div>\n<p>x</p>\n</div>\n";
        server
            .did_open(DidOpenTextDocumentParams {
                text_document: TextDocumentItem {
                    uri: uri.clone(),
                    language_id: "erb".to_string(),
                    version: 1,
                    text: text.to_string(),
                },
            })
            .await;

        let edits = server
            .formatting(DocumentFormattingParams {
                text_document: TextDocumentIdentifier { uri: uri.clone() },
                options: FormattingOptions::default(),
                work_done_progress_params: Default::default(),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].range, full_range(text));
        // Empty output, trailing newline of the input restored
        assert_eq!(edits[0].new_text, "\n");

        let selection = Range {
            start: pos(1, 0),
            end: pos(1, 8),
        };
        let edits = server
            .range_formatting(DocumentRangeFormattingParams {
                text_document: TextDocumentIdentifier { uri: uri.clone() },
                range: selection,
                options: FormattingOptions {
                    insert_final_newline: Some(true),
                    ..Default::default()
                },
                work_done_progress_params: Default::default(),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].range, selection);
        assert_eq!(edits[0].new_text, "\n");

        let ignored = Url::parse("file:///app/views/mail.text.erb").unwrap();
        server
            .did_open(DidOpenTextDocumentParams {
                text_document: TextDocumentItem {
                    uri: ignored.clone(),
                    language_id: "erb".to_string(),
                    version: 1,
                    text: "<p>x</p>".to_string(),
                },
            })
            .await;
        let edits = server
            .formatting(DocumentFormattingParams {
                text_document: TextDocumentIdentifier { uri: ignored },
                options: FormattingOptions::default(),
                work_done_progress_params: Default::default(),
            })
            .await
            .unwrap();
        assert!(edits.is_none());
    }
}
