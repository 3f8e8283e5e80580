//! Settings read from the environment the workload stack injects.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("environment variable {var} has invalid value '{value}': expected {expected}")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub port: u16,
    pub environment: String,
    pub hostname: String,
    pub log_level: String,
    pub database_host: String,
    pub cache_ttl: u32,
    pub feature_new_ui: bool,
    pub service_name: String,
    pub namespace: String,
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build settings from any variable source. Unset variables take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let or = |var: &str, default: &str| lookup(var).unwrap_or_else(|| default.to_string());

        Ok(Self {
            port: parse(&lookup, "PORT", 8001, "a port number")?,
            environment: or("ENVIRONMENT", "development"),
            hostname: lookup("HOSTNAME")
                .or_else(|| {
                    std::fs::read_to_string("/etc/hostname")
                        .ok()
                        .map(|h| h.trim().to_string())
                })
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| "localhost".to_string()),
            log_level: or("LOG_LEVEL", "INFO"),
            database_host: or("DATABASE_HOST", "localhost"),
            cache_ttl: parse(&lookup, "CACHE_TTL", 300, "a number of seconds")?,
            feature_new_ui: match lookup("FEATURE_NEW_UI") {
                None => false,
                Some(v) => match v.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" | "yes" => true,
                    "false" | "0" | "no" | "" => false,
                    _ => {
                        return Err(SettingsError::Invalid {
                            var: "FEATURE_NEW_UI",
                            value: v,
                            expected: "true or false",
                        });
                    }
                },
            },
            service_name: or("SERVICE_NAME", "day"),
            namespace: or("NAMESPACE", "default"),
        })
    }

    /// Tracing filter directive derived from `LOG_LEVEL` (`INFO` → `info`).
    pub fn log_directive(&self) -> String {
        match self.log_level.to_ascii_lowercase().as_str() {
            "warning" => "warn".to_string(),
            "critical" | "fatal" => "error".to_string(),
            level => level.to_string(),
        }
    }
}

fn parse<F, T>(lookup: &F, var: &'static str, default: T, expected: &'static str) -> Result<T, SettingsError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| SettingsError::Invalid {
            var,
            value,
            expected,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, SettingsError> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults() {
        let s = settings(&[("HOSTNAME", "day-7c9f")]).unwrap();
        assert_eq!(s.port, 8001);
        assert_eq!(s.environment, "development");
        assert_eq!(s.hostname, "day-7c9f");
        assert_eq!(s.cache_ttl, 300);
        assert!(!s.feature_new_ui);
        assert_eq!(s.log_directive(), "info");
    }

    #[test]
    fn config_map_contract() {
        let s = settings(&[
            ("LOG_LEVEL", "WARNING"),
            ("DATABASE_HOST", "postgres.production.svc.cluster.local"),
            ("CACHE_TTL", "600"),
            ("FEATURE_NEW_UI", "True"),
            ("SERVICE_NAME", "day"),
            ("NAMESPACE", "production-rc"),
        ])
        .unwrap();
        assert_eq!(s.database_host, "postgres.production.svc.cluster.local");
        assert_eq!(s.cache_ttl, 600);
        assert!(s.feature_new_ui);
        assert_eq!(s.namespace, "production-rc");
        assert_eq!(s.log_directive(), "warn");
    }

    #[test]
    fn invalid_values() {
        assert!(matches!(
            settings(&[("PORT", "eighty")]),
            Err(SettingsError::Invalid { var: "PORT", .. })
        ));
        assert!(matches!(
            settings(&[("FEATURE_NEW_UI", "maybe")]),
            Err(SettingsError::Invalid { var: "FEATURE_NEW_UI", .. })
        ));
    }
}
