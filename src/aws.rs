//! Shared AWS SDK configuration.

use std::time::Duration;

use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, SdkConfig};
use tracing::debug;

use crate::config::AwsConfig;

/// Load the SDK configuration shared by the DynamoDB and S3 clients.
///
/// The SDK's own retry layer is disabled: transient failures are retried by
/// [`crate::utils::retry`] so one policy governs every attempt. Each request
/// attempt is bounded by `request_timeout_ms`; an expired attempt surfaces
/// as a timeout error and is classified transient.
pub async fn load_sdk_config(aws: &AwsConfig) -> SdkConfig {
    let mut builder = aws_config::defaults(BehaviorVersion::latest())
        .retry_config(RetryConfig::disabled())
        .timeout_config(
            TimeoutConfig::builder()
                .operation_attempt_timeout(Duration::from_millis(aws.request_timeout_ms))
                .build(),
        );

    if let Some(ref region) = aws.region {
        builder = builder.region(aws_config::Region::new(region.clone()));
    }

    if let Some(ref endpoint) = aws.endpoint_url {
        builder = builder.endpoint_url(endpoint);
    }

    debug!(
        region = ?aws.region,
        endpoint = ?aws.endpoint_url,
        timeout_ms = aws.request_timeout_ms,
        "Loading AWS SDK config"
    );

    builder.load().await
}
