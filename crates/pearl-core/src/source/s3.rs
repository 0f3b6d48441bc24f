//! Images fetched from an S3 bucket with SigV4-signed GET requests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use super::{check_status, read_body, transport_error, ImageSource, SourceImage, SourceOptions};
use crate::config::SourceConfig;
use crate::error::{ConfigError, SourceError};

pub const KIND: &str = "s3";

/// Payload hash sent for GET requests; the body is not signed.
const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

type HmacSha256 = Hmac<Sha256>;

pub(super) fn construct(config: &SourceConfig) -> Result<Arc<dyn ImageSource>, ConfigError> {
    Ok(Arc::new(S3Source::from_config(config)?))
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok()
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Reads objects from `https://{bucket}.s3.{region}.amazonaws.com/{key}`.
///
/// The object key is the request path without its leading `/`.
pub struct S3Source {
    name: String,
    bucket: String,
    host: String,
    signer: Option<Signer>,
    max_bytes: u64,
    client: reqwest::Client,
}

impl S3Source {
    /// Without credentials, requests go out unsigned (public buckets).
    pub fn from_config(config: &SourceConfig) -> Result<Self, ConfigError> {
        if config.s3_bucket.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "sources.{}.s3_bucket is required for s3 sources",
                config.name
            )));
        }
        let region = if config.s3_region.is_empty() {
            "us-east-1".to_string()
        } else {
            config.s3_region.clone()
        };

        let access_key = resolve_env_var(&config.s3_access_key);
        let secret_key = resolve_env_var(&config.s3_secret_key);
        let signer = match (access_key, secret_key) {
            (Some(access_key), Some(secret_key)) => Some(Signer {
                access_key,
                secret_key,
                region: region.clone(),
                service: "s3".to_string(),
            }),
            (None, None) => {
                tracing::warn!(
                    "Source '{}' has no S3 credentials, requests are unsigned",
                    config.name
                );
                None
            }
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "sources.{}: set both s3_access_key and s3_secret_key, or neither",
                    config.name
                )))
            }
        };

        Ok(Self {
            name: config.name.clone(),
            host: format!("{}.s3.{}.amazonaws.com", config.s3_bucket, region),
            bucket: config.s3_bucket.clone(),
            signer,
            max_bytes: config.max_source_bytes,
            client: reqwest::Client::new(),
        })
    }

    /// Canonical URI for a request path: `/` plus the encoded key.
    pub fn canonical_uri(path: &str) -> String {
        let key = path.trim_start_matches('/');
        let encoded: Vec<String> = key.split('/').map(uri_encode).collect();
        format!("/{}", encoded.join("/"))
    }
}

#[async_trait]
impl ImageSource for S3Source {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_image(&self, options: &SourceOptions) -> Result<SourceImage, SourceError> {
        let uri = Self::canonical_uri(&options.path);
        let url = format!("https://{}{}", self.host, uri);
        tracing::debug!("Fetching s3://{}{}", self.bucket, uri);

        let mut request = self.client.get(&url);
        if let Some(signer) = &self.signer {
            let now = Utc::now();
            let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
            let headers = [
                ("host", self.host.as_str()),
                ("x-amz-content-sha256", UNSIGNED_PAYLOAD),
                ("x-amz-date", amz_date.as_str()),
            ];
            let authorization = signer
                .authorization("GET", &uri, &headers, UNSIGNED_PAYLOAD, now)
                .map_err(|message| SourceError::Transport {
                    path: options.path.clone(),
                    message,
                })?;
            request = request
                .header("x-amz-content-sha256", UNSIGNED_PAYLOAD)
                .header("x-amz-date", amz_date.as_str())
                .header(reqwest::header::AUTHORIZATION, authorization);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(&options.path, e))?;
        check_status(response.status(), &options.path)?;
        read_body(response, &options.path, self.max_bytes).await
    }
}

/// AWS Signature Version 4 request signer.
#[derive(Debug, Clone)]
pub struct Signer {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub service: String,
}

impl Signer {
    /// The `Authorization` header value.
    ///
    /// `headers` are the signed headers as lowercase `(name, value)` pairs,
    /// sorted by name. The request has no query string.
    pub fn authorization(
        &self,
        method: &str,
        canonical_uri: &str,
        headers: &[(&str, &str)],
        payload_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<String, String> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let scope = format!("{}/{}/{}/aws4_request", date, self.region, self.service);

        let canonical_headers: String = headers
            .iter()
            .map(|(name, value)| format!("{}:{}\n", name, value.trim()))
            .collect();
        let signed_headers = headers
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(";");

        let canonical_request = format!(
            "{method}\n{canonical_uri}\n\n{canonical_headers}\n{signed_headers}\n{payload_hash}"
        );
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            scope,
            hex(&Sha256::digest(canonical_request.as_bytes()))
        );

        let signing_key = self.signing_key(&date)?;
        let signature = hex(&hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

        Ok(format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            self.access_key, scope, signed_headers, signature
        ))
    }

    fn signing_key(&self, date: &str) -> Result<Vec<u8>, String> {
        let k_date = hmac_sha256(format!("AWS4{}", self.secret_key).as_bytes(), date.as_bytes())?;
        let k_region = hmac_sha256(&k_date, self.region.as_bytes())?;
        let k_service = hmac_sha256(&k_region, self.service.as_bytes())?;
        hmac_sha256(&k_service, b"aws4_request")
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, String> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| e.to_string())?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// SigV4 URI encoding: everything but `A-Z a-z 0-9 - . _ ~` is
/// percent-encoded with uppercase hex.
fn uri_encode(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
