use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("argv[0] must be an absolute path, got {0:?}")]
    InvalidInvocation(String),

    #[error("argv must not be empty")]
    EmptyArgv,

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while capturing output of {program}: {source}")]
    Capture {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to terminate process group for {program}: {source}")]
    Kill {
        program: String,
        #[source]
        source: std::io::Error,
    },
}
