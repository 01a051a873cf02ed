use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("configuration: {0}")]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Engine(#[from] engine::EngineError),
    #[error("database: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("output: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Process exit code: `2` for rejected input, `1` otherwise.
    pub fn exit_code(&self) -> i32 {
        use engine::EngineError::*;
        match self {
            AppError::Engine(
                NoEligibleRecipients
                | InvalidAmount(_)
                | InvalidBiasFactor(_)
                | InvalidNote(_)
                | InvalidName(_)
                | ExceedsMaxDistributable { .. }
                | ExceedsGoal { .. }
                | KeyNotFound(_)
                | ExistingKey(_)
                | InvalidId(_),
            ) => 2,
            _ => 1,
        }
    }
}
