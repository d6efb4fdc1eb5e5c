use crate::report::Phase;
use crate::transport::TransportError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Worker pool error: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("{count} task(s) panicked during the {phase} phase")]
    TaskPanicked { phase: Phase, count: usize },

    #[error("Remote listing of '{folder}' failed: {source}")]
    Listing {
        folder: String,
        #[source]
        source: TransportError,
    },

    #[error("Report error: {0}")]
    Report(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
