//! Per-session state machine: documents in, grounded answers out

use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::build_prompt::Role;
use crate::chunk_text::ChunkSettings;
use crate::config::Config;
use crate::embed_chunks::{Embedder, OllamaEmbedder};
use crate::error::{Error, Result};
use crate::generate::{AnswerModel, GeminiModel};
use crate::load_documents::UploadedFile;
use crate::vector_index::{Hit, VectorIndex};
use crate::{answer_question, index_uploads};

/// The collaborators and tunables one session runs with.
#[derive(Clone)]
pub struct Pipeline {
    pub chunking: ChunkSettings,
    pub top_k: usize,
    pub embedder: Arc<dyn Embedder>,
    pub model: Arc<dyn AnswerModel>,
}

impl Pipeline {
    pub fn new(embedder: Arc<dyn Embedder>, model: Arc<dyn AnswerModel>) -> Self {
        Self {
            chunking: ChunkSettings::default(),
            top_k: crate::config::DEFAULT_TOP_K,
            embedder,
            model,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self {
            chunking: ChunkSettings::from_config(cfg),
            top_k: cfg.top_k.max(1),
            embedder: Arc::new(OllamaEmbedder::from_config(cfg)),
            model: Arc::new(GeminiModel::from_config(cfg)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    NoDocuments,
    Indexing,
    Ready,
    Answering,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::NoDocuments => "no documents",
            SessionState::Indexing => "indexing",
            SessionState::Ready => "ready",
            SessionState::Answering => "answering",
        };
        f.write_str(label)
    }
}

/// Content-derived identity of an upload set: SHA-256 over names and bytes, in order.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UploadSetId(String);

impl UploadSetId {
    pub fn of(files: &[UploadedFile]) -> Self {
        let mut hasher = Sha256::new();
        for file in files {
            hasher.update((file.name.len() as u64).to_le_bytes());
            hasher.update(file.name.as_bytes());
            hasher.update((file.bytes.len() as u64).to_le_bytes());
            hasher.update(&file.bytes);
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
}

/// What happened to an upload request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexOutcome {
    /// Nothing was uploaded; state is unchanged
    NoFiles,
    /// Same content as the current index; nothing was rebuilt
    Unchanged { chunks: usize },
    Indexed {
        files: usize,
        chunks: usize,
        warnings: Vec<String>,
    },
    /// Indexing failed and the session is back to `NoDocuments`
    Failed {
        message: String,
        warnings: Vec<String>,
    },
}

/// The assistant side of one answered turn.
#[derive(Clone, Debug)]
pub struct Reply {
    pub text: String,
    pub sources: Vec<Hit>,
    /// Retrieval or generation failed and `text` carries the error
    pub failed: bool,
}

struct IndexedSet {
    id: UploadSetId,
    index: VectorIndex,
}

/// One user's documents and conversation.
pub struct Session {
    pipeline: Pipeline,
    state: SessionState,
    transcript: Vec<ConversationTurn>,
    indexed: Option<IndexedSet>,
}

impl Session {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            state: SessionState::NoDocuments,
            transcript: Vec::new(),
            indexed: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transcript(&self) -> &[ConversationTurn] {
        &self.transcript
    }

    pub fn index(&self) -> Option<&VectorIndex> {
        self.indexed.as_ref().map(|set| &set.index)
    }

    pub fn upload_set_id(&self) -> Option<&UploadSetId> {
        self.indexed.as_ref().map(|set| &set.id)
    }

    pub fn accepts_questions(&self) -> bool {
        self.state == SessionState::Ready && self.indexed.is_some()
    }

    /// Replaces the document set. Rebuilds the index in full unless the content is
    /// identical to what is already indexed.
    pub fn upload(&mut self, files: Vec<UploadedFile>) -> IndexOutcome {
        if files.is_empty() {
            return IndexOutcome::NoFiles;
        }

        let id = UploadSetId::of(&files);
        if let Some(current) = &self.indexed {
            if current.id == id && self.state == SessionState::Ready {
                tracing::info!(set = id.as_str(), "upload set unchanged, keeping index");
                return IndexOutcome::Unchanged {
                    chunks: current.index.len(),
                };
            }
        }

        self.state = SessionState::Indexing;
        self.indexed = None;
        tracing::info!(files = files.len(), set = id.as_str(), "indexing upload set");

        match index_uploads(
            &self.pipeline.chunking,
            self.pipeline.embedder.as_ref(),
            &files,
        ) {
            Ok(build) => {
                let chunks = build.index.len();
                self.indexed = Some(IndexedSet {
                    id,
                    index: build.index,
                });
                self.state = SessionState::Ready;
                IndexOutcome::Indexed {
                    files: build.files_indexed,
                    chunks,
                    warnings: build.warnings,
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "indexing failed");
                self.state = SessionState::NoDocuments;
                let warnings = match &err {
                    Error::NoValidDocuments { warnings } => warnings.clone(),
                    _ => Vec::new(),
                };
                let message = match err {
                    Error::NoValidDocuments { .. } => {
                        "None of the uploaded files could be read as a PDF with text.".to_string()
                    }
                    other => other.to_string(),
                };
                IndexOutcome::Failed { message, warnings }
            }
        }
    }

    /// Answers one question against the current index.
    ///
    /// Rejected with [`Error::NotReady`] before indexing succeeds and with
    /// [`Error::EmptyQuestion`] for blank input; neither touches the transcript.
    /// Provider failures still complete the turn, with the error as the reply.
    pub fn ask(&mut self, question: &str) -> Result<Reply> {
        let question = question.trim();
        if !self.accepts_questions() {
            return Err(Error::NotReady);
        }
        if question.is_empty() {
            return Err(Error::EmptyQuestion);
        }
        let Some(indexed) = self.indexed.as_ref() else {
            return Err(Error::NotReady);
        };

        self.state = SessionState::Answering;
        self.transcript.push(ConversationTurn {
            role: Role::User,
            text: question.to_string(),
        });

        let reply = match answer_question(
            self.pipeline.embedder.as_ref(),
            self.pipeline.model.as_ref(),
            &indexed.index,
            question,
            self.pipeline.top_k,
        ) {
            Ok(answer) => Reply {
                text: answer.text,
                sources: answer.hits,
                failed: false,
            },
            Err(err) => {
                tracing::warn!(error = %err, "answering failed");
                Reply {
                    text: format!("Sorry, I couldn't answer that: {}", err),
                    sources: Vec::new(),
                    failed: true,
                }
            }
        };

        self.transcript.push(ConversationTurn {
            role: Role::Assistant,
            text: reply.text.clone(),
        });
        self.state = SessionState::Ready;
        Ok(reply)
    }
}
