use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
pub const DEFAULT_TOP_K: usize = 4;

#[derive(Clone, Debug)]
pub struct Config {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub ollama_url: String,
    pub embed_model: String,
    pub gemini_url: String,
    pub chat_model: String,
    pub api_key: String,
    pub http_timeout: Duration,
    pub log_file: String,
}

impl Config {
    /// Reads configuration from the process environment, loading `.env` first when present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("GOOGLE_API_KEY")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(Error::MissingConfig("GOOGLE_API_KEY"))?;

        let chunk_size = parse_or(&lookup, "RAG_CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?;
        let chunk_overlap = parse_or(&lookup, "RAG_CHUNK_OVERLAP", DEFAULT_CHUNK_OVERLAP)?;
        if chunk_size == 0 {
            return Err(Error::Config("RAG_CHUNK_SIZE must be greater than zero".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::Config(format!(
                "RAG_CHUNK_OVERLAP ({}) must be smaller than RAG_CHUNK_SIZE ({})",
                chunk_overlap, chunk_size
            )));
        }

        let top_k = parse_or(&lookup, "RAG_TOP_K", DEFAULT_TOP_K)?;
        if top_k == 0 {
            return Err(Error::Config("RAG_TOP_K must be at least 1".to_string()));
        }

        let timeout_secs: u64 = parse_or(&lookup, "RAG_HTTP_TIMEOUT_SECS", 120)?;

        Ok(Self {
            chunk_size,
            chunk_overlap,
            top_k,
            ollama_url: string_or(&lookup, "OLLAMA_URL", "http://localhost:11434"),
            embed_model: string_or(&lookup, "OLLAMA_EMBED_MODEL", "nomic-embed-text"),
            gemini_url: string_or(
                &lookup,
                "GEMINI_API_URL",
                "https://generativelanguage.googleapis.com",
            ),
            chat_model: string_or(&lookup, "GEMINI_MODEL", "gemini-2.0-flash"),
            api_key,
            http_timeout: Duration::from_secs(timeout_secs.max(1)),
            log_file: string_or(&lookup, "RAG_LOG_FILE", "pdfqa.log"),
        })
    }
}

fn string_or<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().trim_end_matches('/').to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key).map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => v
            .parse()
            .map_err(|_| Error::Config(format!("{} has invalid value '{}'", key, v))),
        _ => Ok(default),
    }
}
