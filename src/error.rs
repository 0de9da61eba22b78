use thiserror::Error;

/// All errors produced by cwkit.
#[derive(Debug, Error)]
pub enum CwError {
    #[error("parameter {name} out of range: {value}")]
    InvalidParameter { name: &'static str, value: i64 },

    #[error("tone queue is full")]
    QueueFull,

    #[error("tone queue is empty")]
    QueueEmpty,

    #[error("no Morse representation for character {0:?}")]
    UnknownCharacter(char),

    #[error("invalid representation string: {0:?}")]
    InvalidRepresentation(String),

    #[error("representation exceeds {max} marks")]
    RepresentationTooLong { max: usize },

    #[error("mark of {duration_us} us is outside dot/dash tolerance")]
    TimingError { duration_us: u32 },

    #[error("mark of {duration_us} us is below the noise spike threshold")]
    NoiseSpike { duration_us: u32 },

    #[error("receiver event out of sequence")]
    OutOfSequence,

    #[error("generator is already running")]
    AlreadyRunning,

    #[error("generator is not running")]
    NotRunning,

    #[error("audio sink error: {0}")]
    Sink(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CwError>;
