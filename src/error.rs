pub type ScrimResult<T> = Result<T, ScrimError>;

#[derive(thiserror::Error, Debug)]
pub enum ScrimError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("evaluation error: {0}")]
    Evaluation(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ScrimError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            ScrimError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(
            ScrimError::evaluation("x")
                .to_string()
                .contains("evaluation error:")
        );
        assert!(ScrimError::decode("x").to_string().contains("decode error:"));
        assert!(ScrimError::encode("x").to_string().contains("encode error:"));
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = ScrimError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
