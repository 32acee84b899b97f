use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::chunk_text::Chunk;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::http::post_json;

/// Maps text to a fixed-length vector.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Model identifier, for logging
    fn model(&self) -> &str;
}

/// Embedder backed by an Ollama-compatible HTTP server.
#[derive(Clone, Debug)]
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Serialize)]
struct EmbedLegacyRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

impl OllamaEmbedder {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            timeout,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(&cfg.ollama_url, &cfg.embed_model, cfg.http_timeout)
    }
}

impl Embedder for OllamaEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embed", self.base_url);
        let req = EmbedRequest {
            model: &self.model,
            input: text,
        };
        let res = match post_json::<Value, _>(&url, &[], &req, self.timeout) {
            Ok(res) => res,
            Err(err) if lacks_embed_endpoint(&err) => {
                tracing::debug!(error = %err, "falling back to legacy embeddings endpoint");
                let url = format!("{}/api/embeddings", self.base_url);
                let req = EmbedLegacyRequest {
                    model: &self.model,
                    prompt: text,
                };
                post_json::<Value, _>(&url, &[], &req, self.timeout)?
            }
            Err(err) => return Err(err),
        };
        parse_embedding(&res)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Older Ollama servers only know `/api/embeddings` and answer 404 or 405 on
/// `/api/embed`. Any other failure is reported as is.
fn lacks_embed_endpoint(err: &Error) -> bool {
    matches!(err, Error::Status { status: 404 | 405, .. })
}

/// Embeds every chunk, one provider call per chunk, in order.
pub fn embed_chunks(embedder: &dyn Embedder, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
    let mut vectors = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let vector = embedder.embed(&chunk.text)?;
        if vector.is_empty() {
            return Err(Error::embedding(format!(
                "empty vector for chunk {} of '{}'",
                chunk.index, chunk.source.filename
            )));
        }
        vectors.push(vector);
    }
    Ok(vectors)
}

fn parse_embedding(value: &Value) -> Result<Vec<f32>> {
    let raw = value
        .get("embeddings")
        .or_else(|| value.get("embedding"))
        .ok_or_else(|| Error::embedding("no embeddings in response"))?;
    let arr = raw
        .as_array()
        .ok_or_else(|| Error::embedding("invalid embeddings format"))?;
    match arr.first() {
        None => Err(Error::embedding("response carried no vectors")),
        Some(first) if first.is_array() => parse_vec(first),
        Some(_) => parse_vec(raw),
    }
}

fn parse_vec(value: &Value) -> Result<Vec<f32>> {
    let arr = value
        .as_array()
        .ok_or_else(|| Error::embedding("embedding is not an array"))?;
    let mut out = Vec::with_capacity(arr.len());
    for v in arr {
        let n = v
            .as_f64()
            .ok_or_else(|| Error::embedding("embedding value is not a number"))?;
        out.push(n as f32);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_batched_and_legacy_shapes() {
        let batched = json!({"embeddings": [[0.5, 1.0, -2.0]]});
        assert_eq!(parse_embedding(&batched).unwrap(), vec![0.5, 1.0, -2.0]);

        let legacy = json!({"embedding": [0.25, 0.75]});
        assert_eq!(parse_embedding(&legacy).unwrap(), vec![0.25, 0.75]);
    }

    #[test]
    fn rejects_missing_or_malformed_vectors() {
        assert!(parse_embedding(&json!({"model": "x"})).is_err());
        assert!(parse_embedding(&json!({"embeddings": []})).is_err());
        assert!(parse_embedding(&json!({"embedding": ["a"]})).is_err());
    }

    #[test]
    fn only_a_missing_endpoint_triggers_the_legacy_call() {
        let status = |status| Error::Status {
            url: "http://localhost:11434/api/embed".to_string(),
            status,
            body: String::new(),
        };
        assert!(lacks_embed_endpoint(&status(404)));
        assert!(lacks_embed_endpoint(&status(405)));
        assert!(!lacks_embed_endpoint(&status(500)));
        assert!(!lacks_embed_endpoint(&status(429)));
        assert!(!lacks_embed_endpoint(&Error::Http("connection refused".to_string())));
    }
}
