/// Type-erased error returned by the platform capabilities.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("could not get {target} in namespace '{namespace}' (selector '{selector}'): {source}")]
    Discovery {
        target: String,
        namespace: String,
        selector: String,
        #[source]
        source: BoxError,
    },

    #[error("could not add '{path}' to zip: {source}")]
    Archive {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not stream the logs of pod '{pod}': {source}")]
    StreamOpen {
        pod: String,
        #[source]
        source: BoxError,
    },

    #[error("could not send the logs of pod '{pod}' to the archive: {source}")]
    StreamCopy {
        pod: String,
        #[source]
        source: BoxError,
    },

    #[error("could not close the log stream of pod '{pod}': {source}")]
    StreamClose {
        pod: String,
        #[source]
        source: BoxError,
    },

    #[error("log collection was cancelled")]
    Cancelled,
}

impl ReportError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ReportError::Cancelled)
    }
}
