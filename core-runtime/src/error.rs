use thiserror::Error;

/// Runtime wiring errors, surfaced at startup rather than mid-operation.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or incomplete configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required bridge capability was not provided
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_problem() {
        let err = Error::CapabilityMissing {
            capability: "HttpClient".to_string(),
            message: "inject a platform adapter".to_string(),
        };
        assert!(err.to_string().contains("HttpClient"));

        let err = Error::Config("database_path is required".to_string());
        assert!(err.to_string().contains("database_path"));
    }
}
