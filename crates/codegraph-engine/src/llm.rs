// ABOUTME: In-tree LlmClient test double so the batch processor is exercisable
// ABOUTME: without a live model endpoint. Not used in any production wiring.
use async_trait::async_trait;
use codegraph_core::{LlmClient, Result};
use std::collections::HashMap;

/// Deterministic stand-in: echoes the prompt's `name`/`body` inputs back as a
/// one-line description. Useful for exercising the batch processor's scheduling
/// and idempotence guarantees without depending on an external model.
pub struct EchoLlmClient;

#[async_trait]
impl LlmClient for EchoLlmClient {
    async fn generate(
        &self,
        _system_prompt: &str,
        input: &HashMap<String, String>,
        _schema_hint: Option<&str>,
    ) -> Result<String> {
        let name = input.get("name").map(String::as_str).unwrap_or("unknown");
        let children = input.get("children_descriptions").map(String::as_str).unwrap_or("");
        if children.is_empty() {
            Ok(format!("{name} is a leaf definition with no resolved dependencies."))
        } else {
            Ok(format!("{name} builds on: {children}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_name_and_children() {
        let client = EchoLlmClient;
        let mut input = HashMap::new();
        input.insert("name".to_string(), "parse_file".to_string());
        input.insert("children_descriptions".to_string(), "tokenize, validate".to_string());
        let out = client.generate("system", &input, None).await.unwrap();
        assert!(out.contains("parse_file"));
        assert!(out.contains("tokenize, validate"));
    }
}
