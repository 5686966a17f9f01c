/// Coarse error classification for reporting and routing logic.
///
/// Use [`EvalError::class`] to get this. None of the classes are retryable: the
/// engine is deterministic, so the same inputs fail the same way.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorClass {
    /// A metric was invoked without configuration it requires.
    Configuration,
    /// Gold and predicted sequences do not line up.
    Alignment,
    /// Nothing to score.
    DegenerateInput,
    /// A binary-only metric saw more than two labels.
    UnsupportedLabelSpace,
    /// Malformed labels or score vectors coming from a collaborator.
    InvalidInput,
    /// Resource failure unrelated to the data (thread pool, etc.).
    Internal,
}

/// Failure raised by the resolution, metric, evaluator or threshold layers.
///
/// Every variant aborts the operation it occurs in; no partial results are
/// returned. Per-example lookup failures are *not* errors: see
/// [`QASystem::get_answers`](crate::QASystem::get_answers), which reports them
/// as a side list instead.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// The metric needs a no-answer sentinel and none was configured.
    #[error("metric `{metric}` requires a no-answer sentinel but none was configured")]
    MissingConfiguration { metric: String },

    /// Gold and predicted sequences differ in length.
    #[error("gold and predicted answers differ in length ({gold} vs {predicted})")]
    LengthMismatch { gold: usize, predicted: usize },

    /// A subset mask does not line up with the records it filters.
    #[error("mask has {mask} entries for {records} records")]
    MaskMismatch { records: usize, mask: usize },

    /// Zero-length input would divide by zero.
    #[error("metric `{metric}` received no answers to score")]
    EmptyInput { metric: String },

    /// Confusion-style scoring is binary only.
    #[error("metric `{metric}` supports at most 2 labels, observed {observed}")]
    UnsupportedLabelSpace { metric: String, observed: usize },

    /// A label could not be mapped to an option index.
    #[error("label `{label}` cannot be mapped to an option index")]
    InvalidLabel { label: String },

    /// A score vector was present but empty.
    #[error("example `{example_id}` has an empty score vector")]
    EmptyScores { example_id: String },

    /// The worker pool for a parallel sweep could not be built.
    #[error("failed to build sweep worker pool")]
    ThreadPool {
        #[source]
        source: rayon::ThreadPoolBuildError,
    },
}

impl EvalError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MissingConfiguration { .. } => ErrorClass::Configuration,
            Self::LengthMismatch { .. } | Self::MaskMismatch { .. } => ErrorClass::Alignment,
            Self::EmptyInput { .. } => ErrorClass::DegenerateInput,
            Self::UnsupportedLabelSpace { .. } => ErrorClass::UnsupportedLabelSpace,
            Self::InvalidLabel { .. } | Self::EmptyScores { .. } => ErrorClass::InvalidInput,
            Self::ThreadPool { .. } => ErrorClass::Internal,
        }
    }
}

impl From<rayon::ThreadPoolBuildError> for EvalError {
    fn from(source: rayon::ThreadPoolBuildError) -> Self {
        Self::ThreadPool { source }
    }
}
