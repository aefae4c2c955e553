use std::env;

use chrono_tz::Tz;

use crate::money::Money;

pub const DEFAULT_BOTTLE_PRICE_UNITS: i64 = 100;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_name: String,
    pub environment: String,
    pub api_prefix: String,
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub trusted_hosts: Vec<String>,
    pub dev_auth_overrides_enabled: bool,
    pub rate_limit_enabled: bool,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst_size: u32,
    pub admin_email: Option<String>,
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub supabase_service_role_key: Option<String>,
    pub supabase_jwt_secret: Option<String>,
    pub supabase_db_url: Option<String>,
    pub db_pool_max_connections: u32,
    pub db_pool_min_connections: u32,
    pub db_pool_acquire_timeout_seconds: u64,
    pub db_pool_idle_timeout_seconds: u64,
    pub push_function_name: String,
    pub push_timeout_seconds: u64,
    pub openai_api_key: Option<String>,
    pub openai_primary_model: String,
    pub openai_fallback_models: Vec<String>,
    pub assist_timeout_seconds: u64,
    pub business_name: String,
    pub business_timezone: Tz,
    pub currency_code: String,
    pub default_bottle_price: Money,
    pub customer_link_cache_ttl_seconds: u64,
    pub customer_link_cache_max_entries: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            app_name: env_or("APP_NAME", "AquaRoute API"),
            environment: env_or("ENVIRONMENT", "development"),
            api_prefix: normalize_prefix(&env_or("API_PREFIX", "/v1")),
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse_or("PORT", 8000),
            cors_origins: parse_csv(&env_or("CORS_ORIGINS", "http://localhost:3000")),
            trusted_hosts: parse_csv(&env_or("TRUSTED_HOSTS", "localhost,127.0.0.1")),
            dev_auth_overrides_enabled: env_parse_bool_or("DEV_AUTH_OVERRIDES_ENABLED", false),
            rate_limit_enabled: env_parse_bool_or("RATE_LIMIT_ENABLED", true),
            rate_limit_per_second: env_parse_or("RATE_LIMIT_PER_SECOND", 10),
            rate_limit_burst_size: env_parse_or("RATE_LIMIT_BURST_SIZE", 100),
            admin_email: env_opt("ADMIN_EMAIL").map(|value| value.to_ascii_lowercase()),
            supabase_url: env_opt("SUPABASE_URL").map(|value| trim_trailing_slash(&value)),
            supabase_anon_key: env_opt("SUPABASE_ANON_KEY"),
            supabase_service_role_key: env_opt("SUPABASE_SERVICE_ROLE_KEY"),
            supabase_jwt_secret: env_opt("SUPABASE_JWT_SECRET"),
            supabase_db_url: env_opt("SUPABASE_DB_URL").or_else(|| env_opt("DATABASE_URL")),
            db_pool_max_connections: env_parse_or("DB_POOL_MAX_CONNECTIONS", 5),
            db_pool_min_connections: env_parse_or("DB_POOL_MIN_CONNECTIONS", 1),
            db_pool_acquire_timeout_seconds: env_parse_or("DB_POOL_ACQUIRE_TIMEOUT_SECONDS", 5),
            db_pool_idle_timeout_seconds: env_parse_or("DB_POOL_IDLE_TIMEOUT_SECONDS", 600),
            push_function_name: env_or("PUSH_FUNCTION_NAME", "send-push"),
            push_timeout_seconds: env_parse_or("PUSH_TIMEOUT_SECONDS", 10),
            openai_api_key: env_opt("OPENAI_API_KEY"),
            openai_primary_model: env_or("OPENAI_PRIMARY_MODEL", "gpt-4.1-mini"),
            openai_fallback_models: parse_csv(&env_or("OPENAI_FALLBACK_MODELS", "gpt-4o-mini")),
            assist_timeout_seconds: env_parse_or("ASSIST_TIMEOUT_SECONDS", 20),
            business_name: env_or("BUSINESS_NAME", "AquaRoute"),
            business_timezone: parse_timezone(env_opt("BUSINESS_TIMEZONE").as_deref()),
            currency_code: env_or("CURRENCY_CODE", "PKR"),
            default_bottle_price: Money::from_units(env_parse_or(
                "DEFAULT_BOTTLE_PRICE",
                DEFAULT_BOTTLE_PRICE_UNITS,
            )),
            customer_link_cache_ttl_seconds: env_parse_or("CUSTOMER_LINK_CACHE_TTL_SECONDS", 30),
            customer_link_cache_max_entries: env_parse_or(
                "CUSTOMER_LINK_CACHE_MAX_ENTRIES",
                10000,
            ),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.trim().eq_ignore_ascii_case("production")
    }

    pub fn auth_dev_overrides_enabled(&self) -> bool {
        if self.is_production() {
            return false;
        }
        self.dev_auth_overrides_enabled
    }

    pub fn openai_model_chain(&self) -> Vec<String> {
        let mut models = Vec::new();

        let primary = self.openai_primary_model.trim();
        if !primary.is_empty() {
            models.push(primary.to_string());
        }

        for model in &self.openai_fallback_models {
            let candidate = model.trim();
            if candidate.is_empty() {
                continue;
            }
            if !models.iter().any(|existing| existing == candidate) {
                models.push(candidate.to_string());
            }
        }

        models
    }

    pub fn push_function_url(&self) -> Option<String> {
        self.supabase_url.as_ref().map(|base| {
            format!(
                "{base}/functions/v1/{}",
                self.push_function_name.trim_matches('/')
            )
        })
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_parse_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    env_opt(key)
        .and_then(|raw| raw.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_parse_bool_or(key: &str, default: bool) -> bool {
    parse_bool(env_opt(key).as_deref()).unwrap_or(default)
}

fn parse_bool(raw: Option<&str>) -> Option<bool> {
    match raw.map(str::to_ascii_lowercase).as_deref() {
        Some("1" | "true" | "yes" | "on") => Some(true),
        Some("0" | "false" | "no" | "off") => Some(false),
        _ => None,
    }
}

fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn parse_timezone(raw: Option<&str>) -> Tz {
    raw.and_then(|name| name.parse::<Tz>().ok())
        .unwrap_or(chrono_tz::Asia::Karachi)
}

fn trim_trailing_slash(raw: &str) -> String {
    raw.trim_end_matches('/').to_string()
}

fn normalize_prefix(raw: &str) -> String {
    let mut prefix = raw.trim().to_string();
    if prefix.is_empty() {
        return "/v1".to_string();
    }
    if !prefix.starts_with('/') {
        prefix.insert(0, '/');
    }
    while prefix.ends_with('/') && prefix.len() > 1 {
        prefix.pop();
    }
    prefix
}

#[cfg(test)]
mod tests {
    use super::{normalize_prefix, parse_bool, parse_csv, parse_timezone, trim_trailing_slash};

    #[test]
    fn normalizes_prefix() {
        assert_eq!(normalize_prefix("v1"), "/v1");
        assert_eq!(normalize_prefix("/v1/"), "/v1");
        assert_eq!(normalize_prefix(""), "/v1");
    }

    #[test]
    fn parses_bool_flags() {
        assert_eq!(parse_bool(Some("YES")), Some(true));
        assert_eq!(parse_bool(Some("off")), Some(false));
        assert_eq!(parse_bool(Some("maybe")), None);
        assert_eq!(parse_bool(None), None);
    }

    #[test]
    fn csv_drops_blank_entries() {
        assert_eq!(
            parse_csv(" gpt-a , ,gpt-b,"),
            vec!["gpt-a".to_string(), "gpt-b".to_string()]
        );
    }

    #[test]
    fn unknown_timezone_falls_back_to_karachi() {
        assert_eq!(parse_timezone(Some("Mars/Olympus")), chrono_tz::Asia::Karachi);
        assert_eq!(parse_timezone(Some("Asia/Dubai")), chrono_tz::Asia::Dubai);
    }

    #[test]
    fn supabase_url_loses_trailing_slash() {
        assert_eq!(
            trim_trailing_slash("https://abc.supabase.co/"),
            "https://abc.supabase.co"
        );
    }
}
