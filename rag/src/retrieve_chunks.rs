use crate::embed_chunks::Embedder;
use crate::embed_query::embed_query;
use crate::error::Result;
use crate::vector_index::{Hit, VectorIndex};

/// Embeds the question and returns the `top_k` closest chunks.
pub fn retrieve_top(
    embedder: &dyn Embedder,
    index: &VectorIndex,
    question: &str,
    top_k: usize,
) -> Result<Vec<Hit>> {
    let vector = embed_query(embedder, question, index.dimension())?;
    let hits = index.query(&vector, top_k)?;
    tracing::debug!(hits = hits.len(), best = ?hits.first().map(|h| h.score), "retrieved");
    Ok(hits)
}
