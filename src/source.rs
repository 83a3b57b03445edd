//! Raw CSV retrieval.
//!
//! The raw export is read either from a local file or from an S3 object.
//! A local path wins when both are configured.

use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::config::Config;

/// Raw source retrieval errors.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("No raw source configured: set source.local_path or source.bucket and source.raw_key")]
    NotConfigured,

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Object s3://{bucket}/{key} not found")]
    NotFound { bucket: String, key: String },

    #[error("S3 download failed: {0}")]
    Download(String),

    #[error("S3 support not compiled in; build with the `s3` feature")]
    S3Disabled,
}

/// Fetch the raw CSV bytes named by `config.source`.
pub async fn fetch_raw(config: &Config) -> Result<Vec<u8>, SourceError> {
    if let Some(ref path) = config.source.local_path {
        let bytes = tokio::fs::read(path).await.map_err(|source| SourceError::Io {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), bytes = bytes.len(), "Read raw source file");
        return Ok(bytes);
    }

    match (&config.source.bucket, &config.source.raw_key) {
        (Some(bucket), Some(key)) => fetch_object(config, bucket, key).await,
        _ => Err(SourceError::NotConfigured),
    }
}

#[cfg(feature = "s3")]
async fn fetch_object(config: &Config, bucket: &str, key: &str) -> Result<Vec<u8>, SourceError> {
    use aws_sdk_s3::error::ProvideErrorMetadata;

    let sdk_config = crate::aws::load_sdk_config(&config.aws).await;
    let mut s3_config = aws_sdk_s3::config::Builder::from(&sdk_config);
    if config.aws.endpoint_url.is_some() {
        // LocalStack and MinIO only serve path-style requests
        s3_config = s3_config.force_path_style(true);
    }
    let client = aws_sdk_s3::Client::from_conf(s3_config.build());

    let response = client
        .get_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .map_err(|e| match e.code() {
            Some("NoSuchKey") | Some("NoSuchBucket") => SourceError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            _ => SourceError::Download(
                aws_sdk_s3::error::DisplayErrorContext(&e).to_string(),
            ),
        })?;

    let bytes = response
        .body
        .collect()
        .await
        .map_err(|e| SourceError::Download(format!("body read failed: {}", e)))?
        .into_bytes()
        .to_vec();

    info!(bucket, key, bytes = bytes.len(), "Downloaded raw source object");
    Ok(bytes)
}

#[cfg(not(feature = "s3"))]
async fn fetch_object(_config: &Config, _bucket: &str, _key: &str) -> Result<Vec<u8>, SourceError> {
    Err(SourceError::S3Disabled)
}
