use std::env;
use std::str::FromStr;
use std::time::Duration;

/// What to do with a comment whose content fails validation.
///
/// `Silent` drops the comment and answers exactly like a successful post,
/// `Report` surfaces the field errors to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentRejectPolicy {
    #[default]
    Silent,
    Report,
}

impl FromStr for CommentRejectPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "silent" => Ok(Self::Silent),
            "report" => Ok(Self::Report),
            other => Err(ConfigError::Invalid {
                var: "COMMENT_REJECT_POLICY",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub session_expiration_secs: u64,
    pub bcrypt_cost: u32,
    pub cookie_secure: bool,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub server_host: String,
    pub server_port: u16,
    pub board_page_size: i64,
    pub comment_reject_policy: CommentRejectPolicy,
}

fn optional<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Build the config from any variable source; `from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |var: &'static str| -> Result<String, ConfigError> {
            lookup(var).ok_or(ConfigError::Missing(var))
        };

        // SESSION_EXPIRATION is given in hours, "336h" and "336" are both accepted
        let session_hours = match lookup("SESSION_EXPIRATION") {
            Some(raw) => raw
                .trim()
                .trim_end_matches('h')
                .parse::<u64>()
                .map_err(|_| ConfigError::Invalid {
                    var: "SESSION_EXPIRATION",
                    value: raw.clone(),
                })?,
            None => 24 * 14,
        };

        let board_page_size: i64 = optional(&lookup, "BOARD_PAGE_SIZE", 10)?;
        if board_page_size < 1 {
            return Err(ConfigError::Invalid {
                var: "BOARD_PAGE_SIZE",
                value: board_page_size.to_string(),
            });
        }

        Ok(Config {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            redis_url: optional(&lookup, "REDIS_URL", "redis://127.0.0.1:6379".to_string())?,
            server_host: optional(&lookup, "SERVER_HOST", "0.0.0.0".to_string())?,
            server_port: optional(&lookup, "SERVER_PORT", 3000)?,
            session_expiration_secs: session_hours * 3600,
            bcrypt_cost: optional(&lookup, "BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            cookie_secure: optional(&lookup, "COOKIE_SECURE", false)?,
            rate_limit_window_secs: optional(&lookup, "RATE_LIMIT_WINDOW", 60)?,
            rate_limit_requests: optional(&lookup, "RATE_LIMIT_REQUESTS", 100)?,
            board_page_size,
            comment_reject_policy: optional(
                &lookup,
                "COMMENT_REJECT_POLICY",
                CommentRejectPolicy::Silent,
            )?,
        })
    }

    pub fn session_expiration(&self) -> Duration {
        Duration::from_secs(self.session_expiration_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn rate_limit_enabled(&self) -> bool {
        self.rate_limit_requests > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_policy_parses_case_insensitively() {
        assert_eq!(
            "Silent".parse::<CommentRejectPolicy>().unwrap(),
            CommentRejectPolicy::Silent
        );
        assert_eq!(
            " report ".parse::<CommentRejectPolicy>().unwrap(),
            CommentRejectPolicy::Report
        );
    }

    #[test]
    fn unknown_comment_policy_is_rejected() {
        let err = "loud".parse::<CommentRejectPolicy>().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                var: "COMMENT_REJECT_POLICY",
                ..
            }
        ));
    }

    fn lookup_from<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |var| {
            vars.iter()
                .find(|(name, _)| *name == var)
                .map(|(_, value)| value.to_string())
        }
    }

    const BASE: [(&str, &str); 2] = [
        ("DATABASE_URL", "postgres://localhost/worship"),
        ("JWT_SECRET", "secret"),
    ];

    #[test]
    fn defaults_apply_when_only_required_vars_are_set() {
        let config = Config::from_lookup(lookup_from(&BASE)).unwrap();
        assert_eq!(config.session_expiration_secs, 336 * 3600);
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.rate_limit_requests, 100);
        assert!(config.rate_limit_enabled());
        assert_eq!(config.board_page_size, 10);
        assert_eq!(config.comment_reject_policy, CommentRejectPolicy::Silent);
        assert!(!config.cookie_secure);
    }

    #[test]
    fn missing_required_vars_are_named() {
        let err = Config::from_lookup(lookup_from(&[("JWT_SECRET", "secret")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));

        let err = Config::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://x")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("JWT_SECRET")));
    }

    #[test]
    fn session_expiration_takes_hours_with_optional_suffix() {
        for raw in ["48h", "48", " 48h "] {
            let vars = [BASE[0], BASE[1], ("SESSION_EXPIRATION", raw)];
            let config = Config::from_lookup(lookup_from(&vars)).unwrap();
            assert_eq!(config.session_expiration_secs, 48 * 3600, "{raw:?}");
        }

        let vars = [BASE[0], BASE[1], ("SESSION_EXPIRATION", "two days")];
        let err = Config::from_lookup(lookup_from(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "SESSION_EXPIRATION", .. }));
    }

    #[test]
    fn zero_requests_disables_rate_limiting() {
        let vars = [BASE[0], BASE[1], ("RATE_LIMIT_REQUESTS", "0")];
        let config = Config::from_lookup(lookup_from(&vars)).unwrap();
        assert!(!config.rate_limit_enabled());
    }

    #[test]
    fn page_size_must_be_positive() {
        let vars = [BASE[0], BASE[1], ("BOARD_PAGE_SIZE", "0")];
        let err = Config::from_lookup(lookup_from(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "BOARD_PAGE_SIZE", .. }));
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let vars = [BASE[0], BASE[1], ("SERVER_PORT", "eighty")];
        let err = Config::from_lookup(lookup_from(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "SERVER_PORT", .. }));
    }

    #[test]
    fn default_policy_is_silent() {
        assert_eq!(CommentRejectPolicy::default(), CommentRejectPolicy::Silent);
    }
}
