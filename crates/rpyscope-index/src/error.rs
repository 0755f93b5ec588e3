use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("failed to read {path:?}")]
    NotReadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
