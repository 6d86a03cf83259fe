use crate::config::{BucketConfig, Config, ResolvedEndpoint};
use crate::error::{MigrateError, Result};
use crate::migrate::{MigrationDriver, MigrationSettings};
use crate::s3::{RequestSigner, S3Client, S3Error};
use crate::storage::S3Source;
use std::time::Duration;
use tracing::info;

/// Both storage clients of a run, built once from the configuration
///
/// Clients are cheap to clone; clones share their connection pool.
#[derive(Debug, Clone)]
pub struct Core {
    pub source: S3Source,
    pub dest: S3Client,
    pub settings: MigrationSettings,
}

fn build_client(
    bucket: &BucketConfig,
    endpoint: &ResolvedEndpoint,
    request_timeout: Duration,
    insecure_tls: bool,
) -> std::result::Result<S3Client, S3Error> {
    let signer = RequestSigner::new(
        bucket.accesskeyid.clone(),
        bucket.accesskeysecret.clone(),
        Some(endpoint.region.clone()),
    )
    .with_session_token(bucket.token.clone());

    let client = S3Client::new(&endpoint.url, bucket.bucketname.clone(), signer, insecure_tls)?
        .with_timeout(request_timeout)
        .with_addressing(bucket.addressing());
    Ok(client)
}

impl Core {
    pub fn new(config: &Config) -> Result<Self> {
        let transfer = &config.transfer;

        let source_endpoint = config.oss.source_endpoint();
        let source_client = build_client(
            &config.oss,
            &source_endpoint,
            transfer.request_timeout(),
            transfer.insecure_tls,
        )
        .map_err(|source| MigrateError::AuthInit { side: "oss", source })?;
        info!(
            endpoint = %source_endpoint.url,
            bucket = %config.oss.bucketname,
            listing = ?config.oss.listing,
            "init oss bucket success"
        );

        let dest_endpoint = config.s3.destination_endpoint();
        let dest = build_client(
            &config.s3,
            &dest_endpoint,
            transfer.request_timeout(),
            transfer.insecure_tls,
        )
        .map_err(|source| MigrateError::AuthInit { side: "s3", source })?
        .with_upload_headers(config.upload.headers());
        info!(
            endpoint = %dest_endpoint.url,
            region = %dest_endpoint.region,
            bucket = %config.s3.bucketname,
            "init s3 bucket success"
        );

        Ok(Self {
            source: S3Source::new(source_client, config.oss.listing),
            dest,
            settings: transfer.migration_settings(),
        })
    }

    /// Hand the clients to a migration driver
    pub fn into_driver(self) -> MigrationDriver<S3Source, S3Client> {
        MigrationDriver::new(self.source, self.dest, self.settings)
    }
}
