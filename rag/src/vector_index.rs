//! In-memory nearest-neighbour index over chunk embeddings

use crate::chunk_text::ChunkSource;
use crate::error::{Error, Result};

#[derive(Clone, Debug)]
pub struct IndexEntry {
    pub vector: Vec<f32>,
    pub text: String,
    pub source: ChunkSource,
}

/// A retrieved chunk with its cosine similarity to the query.
#[derive(Clone, Debug)]
pub struct Hit {
    pub text: String,
    pub source: ChunkSource,
    pub score: f32,
}

/// Exact cosine-similarity index. Immutable once built.
#[derive(Debug)]
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    dimension: usize,
}

impl VectorIndex {
    pub fn build(entries: Vec<IndexEntry>) -> Result<Self> {
        let dimension = entries
            .first()
            .map(|e| e.vector.len())
            .ok_or_else(|| Error::index("cannot build an index from zero entries"))?;
        if dimension == 0 {
            return Err(Error::index("entry vectors must not be empty"));
        }
        if let Some(bad) = entries.iter().position(|e| e.vector.len() != dimension) {
            return Err(Error::index(format!(
                "entry {} has {} dimensions, expected {}",
                bad,
                entries[bad].vector.len(),
                dimension
            )));
        }
        Ok(Self { entries, dimension })
    }

    /// The `k` most similar entries, best first. Ties keep insertion order.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Hit>> {
        if k == 0 {
            return Err(Error::index("k must be at least 1"));
        }
        if vector.len() != self.dimension {
            return Err(Error::index(format!(
                "query has {} dimensions, index has {}",
                vector.len(),
                self.dimension
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(vector, &e.vector)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(i, score)| {
                let entry = &self.entries[i];
                Hit {
                    text: entry.text.clone(),
                    source: entry.source.clone(),
                    score,
                }
            })
            .collect())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(vector: Vec<f32>, text: &str) -> IndexEntry {
        IndexEntry {
            vector,
            text: text.to_string(),
            source: ChunkSource {
                filename: "a.pdf".to_string(),
                first_page: 1,
                last_page: 1,
            },
        }
    }

    #[test]
    fn orders_hits_best_first_and_caps_at_k() {
        let index = VectorIndex::build(vec![
            entry(vec![0.0, 1.0], "north"),
            entry(vec![1.0, 0.0], "east"),
            entry(vec![0.7, 0.7], "north-east"),
        ])
        .unwrap();

        let hits = index.query(&[1.0, 0.1], 2).unwrap();
        let texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, vec!["east", "north-east"]);
        assert!(hits[0].score >= hits[1].score);

        assert_eq!(index.query(&[1.0, 0.0], 10).unwrap().len(), 3);
    }

    #[test]
    fn rejects_empty_mixed_or_mismatched_input() {
        assert!(VectorIndex::build(Vec::new()).is_err());
        assert!(VectorIndex::build(vec![entry(vec![], "x")]).is_err());
        assert!(VectorIndex::build(vec![entry(vec![1.0], "x"), entry(vec![1.0, 2.0], "y")]).is_err());

        let index = VectorIndex::build(vec![entry(vec![1.0, 0.0], "x")]).unwrap();
        assert!(index.query(&[1.0, 0.0], 0).is_err());
        assert!(index.query(&[1.0], 1).is_err());
    }
}
