use thiserror::Error;

pub type ExecResult<T> = Result<T, ExecError>;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("backend instance already started")]
    AlreadyStarted,
    #[error("cannot stop a backend instance before it is started")]
    NotStarted,
    #[error("backend instance already stopped")]
    AlreadyStopped,
    #[error("failed to spawn backend `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("backend program is empty")]
    MissingProgram,
}
