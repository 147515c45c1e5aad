use std::path::PathBuf;

use crate::embedding::EmbeddingSignature;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot read document {}: {reason}", path.display())]
    DocumentUnreadable { path: PathBuf, reason: String },

    #[error("document {} produced no text chunks", path.display())]
    EmptyDocument { path: PathBuf },

    #[error("embedding unavailable during {stage}: {reason}")]
    EmbeddingUnavailable { stage: &'static str, reason: String },

    #[error(
        "embedding dimension mismatch: expected {expected}, got {actual}"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("the document has not been indexed yet; run indexing first")]
    PipelineNotIndexed,

    #[error(
        "collection '{collection}' already holds {count} entries; reset it before indexing again"
    )]
    IndexNotEmpty { collection: String, count: usize },

    #[error(
        "collection '{collection}' was built with {stored} but the current embedding model is {current}; reset the collection and index again"
    )]
    EmbeddingMismatch {
        collection: String,
        stored: EmbeddingSignature,
        current: EmbeddingSignature,
    },

    #[error("remote generation failed: {0}")]
    RemoteGeneration(String),

    #[error("vector index error ({backend}): {message}")]
    VectorIndex {
        backend: &'static str,
        message: String,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Redb(#[from] redb::Error),

    #[error("database open error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("database storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("database transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("database table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("database commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("data directory does not exist and could not be created: {0}")]
    DataDir(PathBuf),
}

impl Error {
    /// Name of the pipeline stage this error aborted.
    pub fn stage(&self) -> &'static str {
        match self {
            Error::DocumentUnreadable { .. } => "extract",
            Error::EmptyDocument { .. } => "chunk",
            Error::EmbeddingUnavailable { .. }
            | Error::DimensionMismatch { .. } => "embed",
            Error::PipelineNotIndexed => "query",
            Error::RemoteGeneration(_) => "generate",
            Error::IndexNotEmpty { .. }
            | Error::VectorIndex { .. }
            | Error::Redb(_)
            | Error::RedbDatabase(_)
            | Error::RedbStorage(_)
            | Error::RedbTransaction(_)
            | Error::RedbTable(_)
            | Error::RedbCommit(_) => "store",
            Error::Config(_)
            | Error::EmbeddingMismatch { .. }
            | Error::DataDir(_) => "config",
            Error::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_the_underlying_cause() {
        let err = Error::DocumentUnreadable {
            path: PathBuf::from("plan.pdf"),
            reason: "file does not exist".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("plan.pdf"));
        assert!(message.contains("file does not exist"));
        assert_eq!(err.stage(), "extract");
    }

    #[test]
    fn embedding_errors_name_their_stage() {
        let err = Error::EmbeddingUnavailable {
            stage: "query",
            reason: "backend offline".to_string(),
        };
        assert_eq!(err.stage(), "embed");
        assert!(err.to_string().contains("backend offline"));
    }

    #[test]
    fn embedding_mismatch_names_both_models() {
        let signature = |model_name: &str| EmbeddingSignature {
            model_name: model_name.to_string(),
            dimension: 384,
            normalized: true,
        };
        let err = Error::EmbeddingMismatch {
            collection: "plan".to_string(),
            stored: signature("hash-embedder-384"),
            current: signature("some-other-model"),
        };
        let message = err.to_string();
        assert!(message.contains("'hash-embedder-384' (dimension 384)"));
        assert!(message.contains("'some-other-model' (dimension 384)"));
        assert!(message.contains("reset"));
        assert_eq!(err.stage(), "config");
    }
}
