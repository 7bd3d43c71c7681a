//! Connection configuration for soql-rdbc

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;

use crate::error::{Error, Result};

/// Driver parameter naming the instance URL
pub const PARAM_INSTANCE: &str = "salesforceInstance";
/// Driver parameter naming the OAuth consumer key
pub const PARAM_CONSUMER_KEY: &str = "consumerKey";
/// Driver parameter naming the OAuth consumer secret
pub const PARAM_CONSUMER_SECRET: &str = "consumerSecret";
/// Driver parameter naming the API version
pub const PARAM_API_VERSION: &str = "apiVersion";
/// Driver parameter naming the user
pub const PARAM_USER: &str = "user";
/// Driver parameter naming the password
pub const PARAM_PASSWORD: &str = "password";

/// Configuration for creating connections
#[derive(Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Instance base URL (e.g. `https://example.my.salesforce.com`)
    pub instance_url: String,
    /// REST API version segment (default: `v59.0`)
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// OAuth consumer key
    pub consumer_key: String,
    /// OAuth consumer secret
    #[serde(deserialize_with = "deserialize_secret")]
    pub consumer_secret: SecretString,
    /// Login user for the password grant
    #[serde(default)]
    pub username: Option<String>,
    /// Login password (with security token appended, when required)
    #[serde(default, deserialize_with = "deserialize_optional_secret")]
    pub password: Option<SecretString>,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Ask the provider for indented JSON (default: true)
    #[serde(default = "default_true")]
    pub pretty_print: bool,
    /// Additional client settings, readable through `HttpClient::config`
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

fn default_api_version() -> String {
    "v59.0".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn deserialize_secret<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

fn deserialize_optional_secret<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<SecretString>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("instance_url", &self.instance_url)
            .field("api_version", &self.api_version)
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"[REDACTED]")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .field("pretty_print", &self.pretty_print)
            .field("properties", &self.properties)
            .finish()
    }
}

impl ConnectionConfig {
    /// Create configuration for an instance and connected app
    pub fn new(
        instance_url: impl Into<String>,
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
    ) -> Self {
        Self {
            instance_url: instance_url.into(),
            api_version: default_api_version(),
            consumer_key: consumer_key.into(),
            consumer_secret: SecretString::from(consumer_secret.into()),
            username: None,
            password: None,
            timeout_secs: default_timeout(),
            pretty_print: true,
            properties: HashMap::new(),
        }
    }

    /// Build configuration from driver parameters
    ///
    /// `salesforceInstance`, `consumerKey` and `consumerSecret` are required;
    /// `apiVersion`, `user` and `password` are optional. Unknown keys are kept
    /// as properties.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self> {
        let required = |key: &str| {
            params
                .get(key)
                .cloned()
                .ok_or_else(|| Error::config(format!("missing required parameter \"{key}\"")))
        };

        let mut config = Self::new(
            required(PARAM_INSTANCE)?,
            required(PARAM_CONSUMER_KEY)?,
            required(PARAM_CONSUMER_SECRET)?,
        );

        for (key, value) in params {
            match key.as_str() {
                PARAM_INSTANCE | PARAM_CONSUMER_KEY | PARAM_CONSUMER_SECRET => {}
                PARAM_API_VERSION => config.api_version = value.clone(),
                PARAM_USER => config.username = Some(value.clone()),
                PARAM_PASSWORD => config.password = Some(SecretString::from(value.clone())),
                _ => {
                    config.properties.insert(key.clone(), value.clone());
                }
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the API version
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Set the login credentials
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(SecretString::from(password.into()));
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Toggle indented responses
    pub fn with_pretty_print(mut self, enabled: bool) -> Self {
        self.pretty_print = enabled;
        self
    }

    /// Add a client property
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Check the URL and version are usable
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.instance_url)
            .map_err(|e| Error::config(format!("invalid instance URL: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "instance URL must be http(s), got {}",
                url.scheme()
            )));
        }

        let version = self.api_version.strip_prefix('v').unwrap_or("");
        if version.is_empty() || !version.chars().all(|c| c.is_ascii_digit() || c == '.') {
            return Err(Error::config(format!(
                "API version must look like v59.0, got {:?}",
                self.api_version
            )));
        }

        if self.timeout_secs == 0 {
            return Err(Error::config("timeout_secs must be greater than zero"));
        }

        Ok(())
    }
}
