use config::{Config, ConfigError, File};
use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;

/// Top-level configuration.
///
/// Tuning knobs come from an optional TOML file; connection details and the
/// API key come from the environment (`DB_*`, `OPENAI_API_KEY`) and always
/// take precedence over the file.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct PgTalkConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub query: QueryConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    pub schema: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            name: String::new(),
            user: String::new(),
            password: String::new(),
            schema: "public".to_string(),
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    /// Credentials go to the driver as discrete options, so nothing needs
    /// URL-escaping.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.name)
            .username(&self.user)
            .password(&self.password)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    #[serde(skip)]
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gpt-4".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            temperature: 0.7,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dimensions: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub n_ddl: u32,
    pub n_sql: u32,
    pub n_documentation: u32,
    /// Character budget for the generation prompt (roughly four per token).
    pub max_prompt_chars: usize,
    pub dialect: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            n_ddl: 10,
            n_sql: 10,
            n_documentation: 10,
            max_prompt_chars: 56_000,
            dialect: "PostgreSQL".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QueryConfig {
    pub max_rows: usize,
    pub statement_timeout_ms: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_rows: 1000,
            statement_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
        }
    }
}

impl PgTalkConfig {
    /// Load the optional TOML file at `path`, then overlay the process
    /// environment. Does not validate.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .build()?;
        let mut config: Self = s.try_deserialize()?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay connection settings from `lookup`. `DB_DATABASE` wins over
    /// `DB_NAME`; empty values count as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(host) = get("DB_HOST") {
            self.database.host = host;
        }
        if let Some(port) = get("DB_PORT") {
            self.database.port = port
                .parse()
                .map_err(|_| ConfigError::Message(format!("DB_PORT is not a valid port: {port}")))?;
        }
        if let Some(name) = get("DB_DATABASE").or_else(|| get("DB_NAME")) {
            self.database.name = name;
        }
        if let Some(user) = get("DB_USER") {
            self.database.user = user;
        }
        if let Some(password) = lookup("DB_PASSWORD") {
            self.database.password = password;
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.llm.api_key = key;
        }
        Ok(())
    }

    pub fn validate_database(&self) -> Result<(), ConfigError> {
        if self.database.user.is_empty() || self.database.name.is_empty() {
            return Err(ConfigError::Message(
                "Please set DB_USER and either DB_DATABASE or DB_NAME in the .env file".to_string(),
            ));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.api_key.is_empty() {
            return Err(ConfigError::Message(
                "Please set your OPENAI_API_KEY in the .env file".to_string(),
            ));
        }
        self.validate_database()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_file() {
        let config = PgTalkConfig::default();
        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.schema, "public");
        assert_eq!(config.llm.model, "gpt-4");
        assert_eq!(config.http.port, 8501);
        assert_eq!(config.retrieval.n_ddl, 10);
    }

    #[test]
    fn test_db_database_wins_over_db_name() {
        let mut config = PgTalkConfig::default();
        config
            .apply_env(lookup_from(&[
                ("DB_DATABASE", "primary"),
                ("DB_NAME", "fallback"),
                ("DB_USER", "alice"),
            ]))
            .unwrap();
        assert_eq!(config.database.name, "primary");
    }

    #[test]
    fn test_db_name_used_when_db_database_empty() {
        let mut config = PgTalkConfig::default();
        config
            .apply_env(lookup_from(&[("DB_DATABASE", ""), ("DB_NAME", "fallback")]))
            .unwrap();
        assert_eq!(config.database.name, "fallback");
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let mut config = PgTalkConfig::default();
        let result = config.apply_env(lookup_from(&[("DB_PORT", "not-a-port")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_user_fails_validation() {
        let mut config = PgTalkConfig::default();
        config
            .apply_env(lookup_from(&[("DB_NAME", "shop"), ("OPENAI_API_KEY", "sk-test")]))
            .unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("DB_USER"), "unexpected message: {err}");
    }

    #[test]
    fn test_missing_api_key_fails_full_validation_only() {
        let mut config = PgTalkConfig::default();
        config
            .apply_env(lookup_from(&[("DB_NAME", "shop"), ("DB_USER", "alice")]))
            .unwrap();
        assert!(config.validate_database().is_ok());
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_password_with_special_characters_is_kept_verbatim() {
        let mut config = PgTalkConfig::default();
        config
            .apply_env(lookup_from(&[("DB_PASSWORD", "p@ss:w/rd%")]))
            .unwrap();
        assert_eq!(config.database.password, "p@ss:w/rd%");
        let opts = config.database.connect_options();
        assert_eq!(opts.get_port(), 5432);
    }

    #[test]
    fn test_load_reads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pgtalk.toml");
        std::fs::write(
            &path,
            "[llm]\nmodel = \"gpt-4o\"\n\n[query]\nmax_rows = 50\n",
        )
        .unwrap();

        let config = PgTalkConfig::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.query.max_rows, 50);
        assert_eq!(config.query.statement_timeout_ms, 30_000);
    }
}
