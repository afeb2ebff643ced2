//! Credential variants and per-backend selection policy.

use serde::{Deserialize, Serialize};

use crate::storage::StorageType;

/// A credential vended by the metadata service for one fileset, or
/// derived from static configuration. Token-style variants carry an
/// absolute expiry in epoch milliseconds; static-secret variants do not
/// expire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Credential {
    S3Token {
        access_key_id: String,
        secret_access_key: String,
        session_token: String,
        expires_at_ms: i64,
    },
    S3SecretKey {
        access_key_id: String,
        secret_access_key: String,
    },
    GcsToken {
        token: String,
        expires_at_ms: i64,
    },
    /// Static service-account key file, configuration-supplied fallback.
    GcsServiceAccountFile {
        path: String,
    },
    OssToken {
        access_key_id: String,
        secret_access_key: String,
        security_token: String,
        expires_at_ms: i64,
    },
    OssSecretKey {
        access_key_id: String,
        secret_access_key: String,
    },
    AdlsSasToken {
        account_name: String,
        sas_token: String,
        expires_at_ms: i64,
    },
    AzureAccountKey {
        account_name: String,
        account_key: String,
    },
}

impl Credential {
    /// Expiry in epoch milliseconds; `None` for credentials that never
    /// expire. Non-positive reported expiries count as never.
    pub fn expires_at_ms(&self) -> Option<i64> {
        match self {
            Credential::S3Token { expires_at_ms, .. }
            | Credential::GcsToken { expires_at_ms, .. }
            | Credential::OssToken { expires_at_ms, .. }
            | Credential::AdlsSasToken { expires_at_ms, .. } => {
                (*expires_at_ms > 0).then_some(*expires_at_ms)
            }
            Credential::S3SecretKey { .. }
            | Credential::GcsServiceAccountFile { .. }
            | Credential::OssSecretKey { .. }
            | Credential::AzureAccountKey { .. } => None,
        }
    }

    /// Picks the best credential for a backend from a candidate set:
    /// token-style first, static-secret-style second, `None` otherwise.
    /// GCS has no secret-style fallback. HDFS and local backends have no
    /// credential concept and always get `None`.
    pub fn select_best(credentials: &[Credential], storage_type: StorageType) -> Option<&Credential> {
        let (token, secret): (
            fn(&Credential) -> bool,
            fn(&Credential) -> bool,
        ) = match storage_type {
            StorageType::S3a => (
                |c| matches!(c, Credential::S3Token { .. }),
                |c| matches!(c, Credential::S3SecretKey { .. }),
            ),
            StorageType::Oss => (
                |c| matches!(c, Credential::OssToken { .. }),
                |c| matches!(c, Credential::OssSecretKey { .. }),
            ),
            StorageType::Gcs => (
                |c| matches!(c, Credential::GcsToken { .. }),
                |_| false,
            ),
            StorageType::Abs => (
                |c| matches!(c, Credential::AdlsSasToken { .. }),
                |c| matches!(c, Credential::AzureAccountKey { .. }),
            ),
            StorageType::Hdfs | StorageType::Local => return None,
        };

        credentials
            .iter()
            .find(|c| token(c))
            .or_else(|| credentials.iter().find(|c| secret(c)))
    }
}
