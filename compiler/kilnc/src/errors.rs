/// Why a target could not be lowered or started.
///
/// Load and lowering problems have already been pushed to the sink when
/// these are returned; the error only says which stage stopped the target.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("target `{target}` has no sources")]
    NoSources { target: String },

    #[error("target `{target}`: {count} source(s) failed to load")]
    Load { target: String, count: usize },

    #[error("target `{target}`: lowering reported {errors} error(s)")]
    Lowering { target: String, errors: usize },

    #[error("target `{target}` declares no function `{entry}` taking no arguments")]
    MissingEntry { target: String, entry: String },
}

impl DriverError {
    /// Whether the sink already holds a report explaining this error.
    pub fn is_reported(&self) -> bool {
        matches!(
            self,
            DriverError::Load { .. } | DriverError::Lowering { .. }
        )
    }
}
