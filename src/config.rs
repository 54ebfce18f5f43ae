use crate::errors::AppError;
use crate::jwt::JwtConfig;

const DEFAULT_PORT: u16 = 8000;

/// Where the route guard sends people.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandingPaths {
    pub login: String,
    pub student_home: String,
    pub admin_home: String,
}

impl Default for LandingPaths {
    fn default() -> Self {
        Self {
            login: "/login".to_string(),
            student_home: "/dashboard".to_string(),
            admin_home: "/admin".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt: JwtConfig,
    /// Operator address granted admin without a profile lookup.
    pub seeded_admin_email: Option<String>,
    pub port: u16,
    pub landing: LandingPaths,
}

impl Config {
    /// Reads the process environment. Call `load_env` first to pick up `.env`.
    pub fn from_env() -> Result<Self, AppError> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| AppError::configuration("DATABASE_URL not set"))?;
        let jwt = JwtConfig::from_env()?;

        let seeded_admin_email = std::env::var("SEEDED_ADMIN_EMAIL")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let port = match std::env::var("APP_PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| AppError::configuration("APP_PORT must be a valid port number"))?,
            Err(_) => DEFAULT_PORT,
        };

        let defaults = LandingPaths::default();
        let landing = LandingPaths {
            login: path_var("LOGIN_PATH", defaults.login)?,
            student_home: path_var("STUDENT_HOME", defaults.student_home)?,
            admin_home: path_var("ADMIN_HOME", defaults.admin_home)?,
        };

        Ok(Self {
            database_url,
            jwt,
            seeded_admin_email,
            port,
            landing,
        })
    }

    /// Configuration for tests and tools that already hold a pool.
    pub fn for_secret(secret: impl Into<String>) -> Self {
        Self {
            database_url: String::new(),
            jwt: JwtConfig::new(secret, 24),
            seeded_admin_email: None,
            port: DEFAULT_PORT,
            landing: LandingPaths::default(),
        }
    }

    pub fn with_seeded_admin(mut self, email: impl Into<String>) -> Self {
        self.seeded_admin_email = Some(email.into());
        self
    }
}

fn path_var(key: &str, default: String) -> Result<String, AppError> {
    match std::env::var(key) {
        Ok(value) if value.starts_with('/') => Ok(value),
        Ok(value) => Err(AppError::configuration(format!("{key} must be an absolute path, got `{value}`"))),
        Err(_) => Ok(default),
    }
}

pub fn load_env() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let _ = dotenvy::from_path(crate_env);
}
