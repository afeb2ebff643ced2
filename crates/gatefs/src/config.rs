//! Client configuration.

use std::time::Duration;

use serde::Deserialize;

/// Default environment variable consulted for the current location name
/// when neither configuration key is set.
pub const CURRENT_LOCATION_NAME_ENV_VAR_DEFAULT: &str = "CURRENT_LOCATION_NAME";

/// Options recognized by the virtual filesystem client.
///
/// Everything has a workable default; per-backend statics are only
/// required when the metadata service vends no credential for that
/// backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GvfsOptions {
    /// Maximum entries in the backend-handle cache.
    pub cache_max_entries: usize,
    /// Wall-clock time-to-live for backend-handle cache entries, in
    /// seconds.
    pub cache_ttl_secs: u64,
    /// Maximum entries in the catalog cache (LRU, no TTL).
    pub catalog_cache_max_entries: usize,
    /// Fraction (< 1.0) of a credential's remaining lifetime after which
    /// the cached handle is proactively invalidated.
    pub credential_expiry_ratio: f64,
    /// Selects among multiple named storage locations of a fileset.
    pub current_location_name: Option<String>,
    /// Name of the environment variable consulted when
    /// `current_location_name` is unset.
    pub current_location_name_env_var: Option<String>,
    pub s3: S3Options,
    pub oss: OssOptions,
    pub azure: AzureOptions,
    pub gcs: GcsOptions,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct S3Options {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OssOptions {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AzureOptions {
    pub account_name: Option<String>,
    pub account_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GcsOptions {
    /// Path to a service-account key file.
    pub service_account_key_file: Option<String>,
}

impl Default for GvfsOptions {
    fn default() -> Self {
        GvfsOptions {
            cache_max_entries: 20,
            cache_ttl_secs: 3600,
            catalog_cache_max_entries: 100,
            credential_expiry_ratio: 0.5,
            current_location_name: None,
            current_location_name_env_var: None,
            s3: S3Options::default(),
            oss: OssOptions::default(),
            azure: AzureOptions::default(),
            gcs: GcsOptions::default(),
        }
    }
}

impl GvfsOptions {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Resolves the current location name: configuration first, then the
    /// environment variable whose name is itself configurable.
    pub fn resolve_current_location_name(&self) -> Option<String> {
        if let Some(name) = &self.current_location_name {
            return Some(name.clone());
        }
        let var = self
            .current_location_name_env_var
            .as_deref()
            .unwrap_or(CURRENT_LOCATION_NAME_ENV_VAR_DEFAULT);
        std::env::var(var).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = GvfsOptions::default();
        assert_eq!(opts.cache_max_entries, 20);
        assert_eq!(opts.cache_ttl(), Duration::from_secs(3600));
        assert_eq!(opts.catalog_cache_max_entries, 100);
        assert!((opts.credential_expiry_ratio - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn deserialize_kebab_case_keys() {
        let opts: GvfsOptions = serde_json::from_str(
            r#"{
                "cache-max-entries": 5,
                "credential-expiry-ratio": 0.8,
                "s3": {"access-key-id": "ak", "secret-access-key": "sk", "endpoint": "http://minio:9000"}
            }"#,
        )
        .unwrap();
        assert_eq!(opts.cache_max_entries, 5);
        assert!((opts.credential_expiry_ratio - 0.8).abs() < f64::EPSILON);
        assert_eq!(opts.s3.access_key_id.as_deref(), Some("ak"));
        assert_eq!(opts.s3.endpoint.as_deref(), Some("http://minio:9000"));
    }

    #[test]
    fn config_wins_over_environment() {
        let opts = GvfsOptions {
            current_location_name: Some("primary".into()),
            ..GvfsOptions::default()
        };
        assert_eq!(opts.resolve_current_location_name().as_deref(), Some("primary"));
    }

    #[test]
    fn environment_variable_name_is_configurable() {
        let opts = GvfsOptions {
            current_location_name_env_var: Some("GATEFS_TEST_LOCATION_XYZ".into()),
            ..GvfsOptions::default()
        };
        // SAFETY: test-local variable name, no concurrent reader cares.
        unsafe { std::env::set_var("GATEFS_TEST_LOCATION_XYZ", "backup") };
        assert_eq!(opts.resolve_current_location_name().as_deref(), Some("backup"));
        unsafe { std::env::remove_var("GATEFS_TEST_LOCATION_XYZ") };
    }
}
