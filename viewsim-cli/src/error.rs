use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Session error: {0}")]
    Session(#[from] viewsim_engine::SessionError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Viewer task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}
