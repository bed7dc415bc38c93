use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("permission to observe global keyboard events has not been granted")]
    PermissionDenied,
    #[error("failed to register the keyboard hook: {0}")]
    HookCreationFailed(std::io::Error),
    #[error("the hook thread terminated unexpectedly")]
    HookThreadCrashed,
}

pub type Result<T> = std::result::Result<T, Error>;
