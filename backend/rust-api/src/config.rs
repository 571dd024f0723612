use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub mongo_uri: String,
    pub mongo_database: String,
    pub jwt_secret: String,
    pub metrics_auth: String,
    pub upload_dir: String,
    pub max_upload_bytes: u64,
    pub generation: GenerationConfig,
    pub quiz: QuizDefaults,
    pub extraction: ExtractionConfig,
}

/// Where records live. `Memory` is for local runs without MongoDB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Mongo,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = config::ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StoreBackend::Mongo),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(config::ConfigError::Message(format!(
                "unknown store backend {:?}, expected mongo or memory",
                other
            ))),
        }
    }
}

/// Chat-completion provider settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    /// Missing key means every generation resolves to fallback content.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub referer: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuizDefaults {
    pub time_limit_secs: u32,
    pub passing_score: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub stale_after_secs: i64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            model: "anthropic/claude-3-haiku".to_string(),
            referer: "http://localhost:8080".to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl Default for QuizDefaults {
    fn default() -> Self {
        Self {
            time_limit_secs: 1800,
            passing_score: 70,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 64,
            stale_after_secs: 600,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_backend: StoreBackend::Mongo,
            mongo_uri: "mongodb://localhost:27017".to_string(),
            mongo_database: "studyforge".to_string(),
            jwt_secret: "dev-secret-only-for-local-testing".to_string(),
            metrics_auth: "admin:changeme".to_string(),
            upload_dir: "./uploads".to_string(),
            max_upload_bytes: 10 << 20,
            generation: GenerationConfig::default(),
            quiz: QuizDefaults::default(),
            extraction: ExtractionConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first, then the local one
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/{env}.toml, then APP__* overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let defaults = Config::default();

        let store_backend = match settings
            .get_string("database.backend")
            .or_else(|_| env::var("STORE_BACKEND"))
        {
            Ok(value) => value.parse()?,
            Err(_) => defaults.store_backend,
        };

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or(defaults.mongo_uri);

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or(defaults.mongo_database);

        let jwt_secret = settings
            .get_string("auth.jwt_secret")
            .or_else(|_| env::var("JWT_SECRET"))
            .unwrap_or_else(|_| {
                if env == "prod" {
                    panic!("FATAL: JWT_SECRET must be set in production!");
                }
                eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
                defaults.jwt_secret.clone()
            });

        let metrics_auth = settings
            .get_string("metrics.auth")
            .or_else(|_| env::var("METRICS_AUTH"))
            .unwrap_or(defaults.metrics_auth);

        let upload_dir = settings
            .get_string("uploads.dir")
            .or_else(|_| env::var("UPLOAD_DIR"))
            .unwrap_or(defaults.upload_dir);

        let max_upload_bytes = settings
            .get_int("uploads.max_bytes")
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(defaults.max_upload_bytes);

        let api_key = settings
            .get_string("generation.api_key")
            .or_else(|_| env::var("OPENROUTER_API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            eprintln!("WARNING: OPENROUTER_API_KEY not set, generation will use fallback content");
        }

        let generation = GenerationConfig {
            api_key,
            base_url: settings
                .get_string("generation.base_url")
                .or_else(|_| env::var("OPENROUTER_BASE_URL"))
                .unwrap_or(defaults.generation.base_url),
            model: settings
                .get_string("generation.model")
                .or_else(|_| env::var("OPENROUTER_MODEL"))
                .unwrap_or(defaults.generation.model),
            referer: settings
                .get_string("generation.referer")
                .unwrap_or(defaults.generation.referer),
            request_timeout_secs: settings
                .get_int("generation.request_timeout_secs")
                .ok()
                .and_then(|v| u64::try_from(v).ok())
                .unwrap_or(defaults.generation.request_timeout_secs),
        };

        let quiz = QuizDefaults {
            time_limit_secs: settings
                .get_int("quiz.time_limit_secs")
                .ok()
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(defaults.quiz.time_limit_secs),
            passing_score: settings
                .get_int("quiz.passing_score")
                .ok()
                .and_then(|v| u32::try_from(v).ok())
                .map(|v| v.min(100))
                .unwrap_or(defaults.quiz.passing_score),
        };

        let extraction = ExtractionConfig {
            workers: settings
                .get_int("extraction.workers")
                .ok()
                .and_then(|v| usize::try_from(v).ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.extraction.workers),
            queue_capacity: settings
                .get_int("extraction.queue_capacity")
                .ok()
                .and_then(|v| usize::try_from(v).ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.extraction.queue_capacity),
            stale_after_secs: settings
                .get_int("extraction.stale_after_secs")
                .unwrap_or(defaults.extraction.stale_after_secs),
        };

        Ok(Config {
            store_backend,
            mongo_uri,
            mongo_database,
            jwt_secret,
            metrics_auth,
            upload_dir,
            max_upload_bytes,
            generation,
            quiz,
            extraction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn defaults_match_quiz_contract() {
        let config = Config::default();
        assert_eq!(config.quiz.time_limit_secs, 1800);
        assert_eq!(config.quiz.passing_score, 70);
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert!(config.generation.api_key.is_none());
    }

    #[test]
    #[serial]
    fn env_overrides_are_applied() {
        env::set_var("SKIP_ROOT_ENV", "1");
        env::set_var("APP__QUIZ__PASSING_SCORE", "80");
        env::set_var("APP__EXTRACTION__WORKERS", "4");
        env::set_var("OPENROUTER_API_KEY", "sk-test");

        let config = Config::load().unwrap();
        assert_eq!(config.quiz.passing_score, 80);
        assert_eq!(config.extraction.workers, 4);
        assert_eq!(config.generation.api_key.as_deref(), Some("sk-test"));

        env::remove_var("APP__QUIZ__PASSING_SCORE");
        env::remove_var("APP__EXTRACTION__WORKERS");
        env::remove_var("OPENROUTER_API_KEY");
        env::remove_var("SKIP_ROOT_ENV");
    }

    #[test]
    #[serial]
    fn store_backend_switch() {
        env::set_var("SKIP_ROOT_ENV", "1");
        assert_eq!(Config::load().unwrap().store_backend, StoreBackend::Mongo);

        env::set_var("STORE_BACKEND", "Memory");
        assert_eq!(Config::load().unwrap().store_backend, StoreBackend::Memory);

        env::set_var("STORE_BACKEND", "sqlite");
        assert!(Config::load().is_err());

        env::remove_var("STORE_BACKEND");
        env::remove_var("SKIP_ROOT_ENV");
    }

    #[test]
    #[serial]
    fn blank_api_key_counts_as_missing() {
        env::set_var("SKIP_ROOT_ENV", "1");
        env::set_var("OPENROUTER_API_KEY", "   ");

        let config = Config::load().unwrap();
        assert!(config.generation.api_key.is_none());

        env::remove_var("OPENROUTER_API_KEY");
        env::remove_var("SKIP_ROOT_ENV");
    }
}
