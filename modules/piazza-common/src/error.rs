use thiserror::Error;

#[derive(Error, Debug)]
pub enum PiazzaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_render_without_extra_wrapping() {
        let err = PiazzaError::Config("PIAZZA_API_URL is required".into());
        assert_eq!(err.to_string(), "Configuration error: PIAZZA_API_URL is required");

        let err: PiazzaError = anyhow::anyhow!("disk full").into();
        assert_eq!(err.to_string(), "disk full");
    }
}
