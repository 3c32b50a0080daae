#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(
        "failed to create directory (path: {path}): {source}",
        path = path.display()
    )]
    DirCreation {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "failed to resolve directory (path: {path}): {source}",
        path = path.display()
    )]
    DirResolve {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("staging directory must not be the upload directory or inside it")]
    StagingInsideUploads,
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
