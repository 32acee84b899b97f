mod build_prompt;
mod chunk_text;
mod config;
mod embed_chunks;
mod embed_query;
mod error;
mod generate;
mod http;
mod load_documents;
mod retrieve_chunks;
mod session;
mod vector_index;

pub use build_prompt::{
    build_prompt_with_context, format_context_from_hits, system_prompt, Message, Role,
    NOT_IN_CONTEXT_REPLY,
};
pub use chunk_text::{
    chunk_documents, chunk_pages, chunk_text, Chunk, ChunkSettings, ChunkSource, SEPARATORS,
};
pub use config::{Config, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_TOP_K};
pub use embed_chunks::{embed_chunks, Embedder, OllamaEmbedder};
pub use error::{Error, Result};
pub use generate::{synthesize_answer, AnswerModel, GeminiModel};
pub use load_documents::{
    collect_uploads, load_pdf, load_pdfs, LoadReport, LoadedDocument, Page, UploadedFile,
};
pub use retrieve_chunks::retrieve_top;
pub use session::{
    ConversationTurn, IndexOutcome, Pipeline, Reply, Session, SessionState, UploadSetId,
};
pub use vector_index::{Hit, IndexEntry, VectorIndex};

/// A freshly built index plus what the loader had to skip.
#[derive(Debug)]
pub struct IndexBuild {
    pub index: VectorIndex,
    pub files_indexed: usize,
    pub warnings: Vec<String>,
}

/// Runs loader, chunker, embedder and index build over one upload set.
pub fn index_uploads(
    settings: &ChunkSettings,
    embedder: &dyn Embedder,
    files: &[UploadedFile],
) -> Result<IndexBuild> {
    let report = load_pdfs(files)?;
    tracing::info!(
        files = report.files_loaded(),
        pages = report.page_count(),
        skipped = report.warnings.len(),
        "documents loaded"
    );

    let chunks = chunk_documents(&report.documents, settings);
    if chunks.is_empty() {
        return Err(Error::NoValidDocuments {
            warnings: report.warnings,
        });
    }
    tracing::info!(chunks = chunks.len(), model = embedder.model(), "embedding chunks");

    let vectors = embed_chunks(embedder, &chunks)?;
    let entries = chunks
        .into_iter()
        .zip(vectors)
        .map(|(chunk, vector)| IndexEntry {
            vector,
            text: chunk.text,
            source: chunk.source,
        })
        .collect();
    let index = VectorIndex::build(entries)?;
    tracing::info!(entries = index.len(), dimension = index.dimension(), "index built");

    Ok(IndexBuild {
        index,
        files_indexed: report.files_loaded(),
        warnings: report.warnings,
    })
}

/// An answer together with the passages it was grounded on.
#[derive(Clone, Debug)]
pub struct Answer {
    pub text: String,
    pub hits: Vec<Hit>,
}

pub fn answer_question(
    embedder: &dyn Embedder,
    model: &dyn AnswerModel,
    index: &VectorIndex,
    question: &str,
    top_k: usize,
) -> Result<Answer> {
    let hits = retrieve_top(embedder, index, question, top_k)?;
    let text = synthesize_answer(model, question, &hits)?;
    Ok(Answer { text, hits })
}
