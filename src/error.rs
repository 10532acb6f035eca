use std::path::PathBuf;

/// Text extraction failures. Per-page problems are soft and never surface
/// here; only a document that cannot be parsed or yields no text at all.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("pdf could not be parsed: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("no extractable text in document")]
    NoText,
}

/// Failures talking to the document host. A non-2xx probe status is not
/// one of these; the locator treats it as "no bulletin for that date".
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("document host unavailable: {0}")]
    Unavailable(String),
}

/// Failures of the summarization provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("model request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("model returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("model returned no text candidate")]
    EmptyResponse,
    #[error("model output is not the required JSON shape: {detail}")]
    MalformedPayload { detail: String },
}

/// Failures while committing one document's rows.
#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    #[error(transparent)]
    Db(#[from] rusqlite::Error),
    #[error("post row could not be resolved for {0}")]
    PostNotResolved(String),
}

/// Anything that aborts processing of a single document. The batch loop
/// logs these and moves on to the next date.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] SourceError),
    #[error("cache i/o at {path}: {source}")]
    Cache {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Summarize(#[from] ProviderError),
    #[error(transparent)]
    Commit(#[from] CommitError),
}
