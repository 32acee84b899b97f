use crate::embed_chunks::Embedder;
use crate::error::{Error, Result};

/// Embeds a question for retrieval against an index of `dimension`-wide vectors.
pub fn embed_query(embedder: &dyn Embedder, text: &str, dimension: usize) -> Result<Vec<f32>> {
    let vector = embedder.embed(text)?;
    if vector.len() != dimension {
        return Err(Error::embedding(format!(
            "question vector has {} dimensions, index expects {}",
            vector.len(),
            dimension
        )));
    }
    Ok(vector)
}
