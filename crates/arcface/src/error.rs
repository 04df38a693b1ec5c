/// Fatal conditions of a training or evaluation run.
#[derive(Debug, thiserror::Error)]
pub enum ArcFaceError {
    /// Loss became NaN or infinite.
    #[error("non-finite loss {loss} at epoch {epoch}, step {step}")]
    Diverged { epoch: usize, step: usize, loss: f64 },

    /// Validation produced no pairs.
    #[error("validation set is empty")]
    EmptyValidation,

    /// ROC is undefined without both classes present.
    #[error(
        "validation labels are single-class ({positives} positive, {negatives} negative); ROC is undefined"
    )]
    DegenerateLabels { positives: usize, negatives: usize },

    /// Backbone output width does not match the margin head input.
    #[error("backbone produces {backbone}-dim embeddings but margin head expects {head}")]
    DimensionMismatch { backbone: usize, head: usize },

    /// Checkpoint serialisation or deserialisation failed.
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Error bubbled up from a data source.
    #[error(transparent)]
    Data(#[from] anyhow::Error),
}
