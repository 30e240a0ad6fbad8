//! Client configuration

use crate::error::{Result, YandexError};

pub const TOKEN_ENV: &str = "YC_TOKEN";
pub const DEFAULT_ENDPOINT: &str = "https://serverless-containers.api.cloud.yandex.net";
pub const DEFAULT_OPERATION_ENDPOINT: &str = "https://operation.api.cloud.yandex.net";

#[derive(Debug, Clone)]
pub struct YandexConfig {
    /// IAM or OAuth bearer token
    pub token: String,
    pub endpoint: String,
    pub operation_endpoint: String,
}

impl YandexConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            operation_endpoint: DEFAULT_OPERATION_ENDPOINT.to_string(),
        }
    }

    /// Read the token from `YC_TOKEN`
    pub fn from_env() -> Result<Self> {
        let token = std::env::var(TOKEN_ENV)
            .ok()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| YandexError::MissingEnvVar(TOKEN_ENV.to_string()))?;
        Ok(Self::new(token))
    }

    pub fn with_endpoints(
        mut self,
        endpoint: impl Into<String>,
        operation_endpoint: impl Into<String>,
    ) -> Self {
        self.endpoint = endpoint.into();
        self.operation_endpoint = operation_endpoint.into();
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        for endpoint in [&self.endpoint, &self.operation_endpoint] {
            if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
                return Err(YandexError::InvalidEndpoint {
                    endpoint: endpoint.clone(),
                    reason: "expected an http(s) URL".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = YandexConfig::new("t1.token");
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bare_host() {
        let config = YandexConfig::new("t").with_endpoints("localhost:8080", DEFAULT_OPERATION_ENDPOINT);
        assert!(matches!(
            config.validate(),
            Err(YandexError::InvalidEndpoint { .. })
        ));
    }
}
