// ABOUTME: Owns one LspClient per language, starts it lazily on first use and
// ABOUTME: multiplexes definition/references lookups for the reference resolver.
use crate::client::{root_uri_for, LspClient};
use crate::position::LspPositionIndex;
use anyhow::{anyhow, Result};
use codegraph_core::{Language, Location, LspServerConfig};
use dashmap::{DashMap, DashSet};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::warn;

/// Pool of per-language LSP servers, constructed once per ingest and torn down
/// after the last Reference Resolver worker exits.
pub struct LspCoordinator {
    root_path: std::path::PathBuf,
    configs: std::collections::HashMap<String, LspServerConfig>,
    clients: DashMap<Language, LspClient>,
    opened: DashSet<(Language, String)>,
}

impl LspCoordinator {
    pub fn new(root_path: impl Into<std::path::PathBuf>, configs: std::collections::HashMap<String, LspServerConfig>) -> Self {
        Self {
            root_path: root_path.into(),
            configs,
            clients: DashMap::new(),
            opened: DashSet::new(),
        }
    }

    async fn client_for(&self, language: Language) -> Result<LspClient> {
        if let Some(existing) = self.clients.get(&language) {
            return Ok(existing.clone());
        }
        let key = language.to_string();
        let config = self
            .configs
            .get(&key)
            .ok_or_else(|| anyhow!("no LSP server configured for {key}"))?;
        let root_uri = root_uri_for(&self.root_path)?;
        let client = LspClient::start(
            &config.command,
            &config.args,
            &root_uri,
            Duration::from_millis(config.request_timeout_ms),
        )
        .await?;
        self.clients.insert(language, client.clone());
        Ok(client)
    }

    async fn ensure_open(&self, language: Language, client: &LspClient, file_uri: &str, content: &str) -> Result<()> {
        let key = (language, file_uri.to_string());
        if self.opened.contains(&key) {
            return Ok(());
        }
        client
            .notify(
                "textDocument/didOpen",
                serde_json::json!({
                    "textDocument": {
                        "uri": file_uri,
                        "languageId": language.to_string(),
                        "version": 1,
                        "text": content
                    }
                }),
            )
            .await?;
        self.opened.insert(key);
        Ok(())
    }

    /// Resolves the definition(s) of the identifier at `line`/`column` (1-based)
    /// inside `file_uri`, whose full text is `content`. A server that has no
    /// configuration for `language` yields an empty result rather than an error,
    /// matching the "omit the edge, continue" policy for recoverable LSP failures.
    pub async fn definition(
        &self,
        language: Language,
        file_uri: &str,
        content: &str,
        line: u32,
        column: u32,
    ) -> Vec<Location> {
        self.locations_for("textDocument/definition", language, file_uri, content, line, column)
            .await
    }

    pub async fn references(
        &self,
        language: Language,
        file_uri: &str,
        content: &str,
        line: u32,
        column: u32,
    ) -> Vec<Location> {
        self.locations_for("textDocument/references", language, file_uri, content, line, column)
            .await
    }

    async fn locations_for(
        &self,
        method: &str,
        language: Language,
        file_uri: &str,
        content: &str,
        line: u32,
        column: u32,
    ) -> Vec<Location> {
        let client = match self.client_for(language).await {
            Ok(client) => client,
            Err(err) => {
                warn!("lsp unavailable for {language}: {err}");
                return Vec::new();
            }
        };
        if let Err(err) = self.ensure_open(language, &client, file_uri, content).await {
            warn!("lsp didOpen failed for {file_uri}: {err}");
            return Vec::new();
        }

        let index = LspPositionIndex::new(content);
        let byte_offset = index.byte_offset_for_line_column(line, column);
        let pos = index.position_for_byte_offset(byte_offset);

        let mut params = serde_json::json!({
            "textDocument": { "uri": file_uri },
            "position": { "line": pos.line, "character": pos.character }
        });
        if method == "textDocument/references" {
            params["context"] = serde_json::json!({ "includeDeclaration": false });
        }

        match client.request(method, params).await {
            Ok(value) => extract_locations(&value),
            Err(err) => {
                warn!("{method} timed out or failed for {file_uri}:{line}:{column}: {err}");
                Vec::new()
            }
        }
    }

    pub async fn shutdown_all(&self) {
        for entry in self.clients.iter() {
            let _ = entry.value().shutdown().await;
        }
    }
}

fn extract_locations(value: &JsonValue) -> Vec<Location> {
    let entries: Vec<&JsonValue> = match value {
        JsonValue::Array(arr) => arr.iter().collect(),
        JsonValue::Null => Vec::new(),
        single => vec![single],
    };

    entries.iter().filter_map(|entry| location_from_json(entry)).collect()
}

fn location_from_json(entry: &JsonValue) -> Option<Location> {
    let uri = entry.get("uri").or_else(|| entry.get("targetUri")).and_then(|v| v.as_str())?;
    let range = entry.get("range").or_else(|| entry.get("targetRange"))?;
    let start = range.get("start")?;
    let line0 = start.get("line")?.as_u64()? as u32;
    let char0 = start.get("character")?.as_u64()? as u32;

    let path = url::Url::parse(uri).ok().and_then(|u| u.to_file_path().ok());
    let file_uri = match path {
        Some(p) => p.to_string_lossy().to_string(),
        None => uri.to_string(),
    };

    Some(Location { file_uri, line: line0 + 1, column: char0 + 1 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_locations_handles_single_and_array_responses() {
        let single = serde_json::json!({
            "uri": "file:///tmp/a.py",
            "range": { "start": { "line": 2, "character": 4 }, "end": { "line": 2, "character": 8 } }
        });
        let locs = extract_locations(&single);
        assert_eq!(locs.len(), 1);
        assert_eq!(locs[0].line, 3);
        assert_eq!(locs[0].column, 5);

        let array = serde_json::json!([single.clone(), single]);
        assert_eq!(extract_locations(&array).len(), 2);

        assert!(extract_locations(&JsonValue::Null).is_empty());
    }
}
