use thiserror::Error;

/// Startup configuration is missing or invalid. Fatal.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("missing required configuration: {0}")]
    Missing(&'static str),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// The completion capability failed or produced nothing usable.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion service unreachable: {0}")]
    Transport(String),

    #[error("completion request rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("completion service returned no choices")]
    NoChoices,

    #[error("invalid completion options: {0}")]
    InvalidOptions(String),
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("knowledge index is not built")]
    NotReady,

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("similarity index backend failed: {0}")]
    Backend(String),

    #[error("failed to read corpus: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a build produced no index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyCorpus {
    NoDocuments,
    NoChunks,
}

impl std::fmt::Display for EmptyCorpus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EmptyCorpus::NoDocuments => "no documents found",
            EmptyCorpus::NoChunks => "no chunks generated",
        };
        write!(f, "{s}")
    }
}

/// A pipeline run aborted. Escalation is not an error and never surfaces here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("graph error: {0}")]
    Graph(String),
}
