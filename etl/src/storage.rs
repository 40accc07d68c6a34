use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use common::Result;
use common::config::AwsConfig;
use datafusion::execution::context::SessionContext;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

#[derive(Clone)]
pub struct S3Config {
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub allow_http: bool,
}

impl From<&AwsConfig> for S3Config {
    fn from(aws: &AwsConfig) -> Self {
        Self {
            endpoint: aws.endpoint.clone(),
            region: aws.region.clone(),
            access_key: aws.aws_access_key_id.clone(),
            secret_key: aws.aws_secret_access_key.clone(),
            allow_http: aws.allow_http,
        }
    }
}

/// Builds and caches the S3 clients for every bucket the job touches.
#[derive(Clone)]
pub struct S3Manager {
    pub config: S3Config,
    client: Arc<S3Client>,
    object_store_cache: Arc<DashMap<String, Arc<AmazonS3>>>,
}

impl S3Manager {
    pub fn new(config: S3Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "static",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let client = Arc::new(S3Client::from_conf(builder.build()));

        Self {
            config,
            client,
            object_store_cache: Arc::new(DashMap::new()),
        }
    }

    pub fn get_object_store(&self, bucket: &str) -> Result<Arc<AmazonS3>> {
        if let Some(store) = self.object_store_cache.get(bucket) {
            return Ok(store.clone());
        }

        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(bucket)
            .with_region(&self.config.region)
            .with_access_key_id(&self.config.access_key)
            .with_secret_access_key(&self.config.secret_key)
            .with_allow_http(self.config.allow_http);

        if let Some(endpoint) = &self.config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }

        let store = Arc::new(builder.build()?);
        self.object_store_cache
            .insert(bucket.to_string(), store.clone());
        Ok(store)
    }

    pub fn register_object_store(&self, ctx: &SessionContext, bucket: &str) -> Result<()> {
        let store = self.get_object_store(bucket)?;
        let url = Url::parse(&format!("s3://{}", bucket))?;
        ctx.runtime_env().register_object_store(&url, store);
        debug!(bucket, "Registered S3 object store");
        Ok(())
    }

    /// Verifies that a bucket exists and is accessible with the configured credentials.
    pub async fn verify_bucket_exists(&self, bucket: &str) -> Result<()> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => {
                info!(bucket, "Bucket is reachable");
                Ok(())
            }
            Err(e) => Err(common::Error::Storage(format!(
                "Cannot access bucket '{}': {}",
                bucket, e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::execution::object_store::ObjectStoreUrl;

    fn manager() -> S3Manager {
        S3Manager::new(S3Config {
            endpoint: Some("http://localhost:9000".to_string()),
            region: "us-west-2".to_string(),
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            allow_http: true,
        })
    }

    #[test]
    fn test_object_store_is_cached_per_bucket() {
        let manager = manager();

        let first = manager.get_object_store("raw-data").unwrap();
        let again = manager.get_object_store("raw-data").unwrap();
        let other = manager.get_object_store("warehouse").unwrap();

        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[test]
    fn test_clones_share_the_store_cache() {
        let manager = manager();
        let shared = manager.clone();

        let handles: Vec<_> = ["raw-data", "warehouse"]
            .into_iter()
            .map(|bucket| {
                let shared = shared.clone();
                std::thread::spawn(move || shared.get_object_store(bucket).unwrap())
            })
            .collect();
        let built: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(Arc::ptr_eq(&built[0], &manager.get_object_store("raw-data").unwrap()));
        assert!(Arc::ptr_eq(&built[1], &manager.get_object_store("warehouse").unwrap()));
    }

    #[test]
    fn test_registered_store_resolves_by_url() {
        let manager = manager();
        let ctx = SessionContext::new();

        manager.register_object_store(&ctx, "raw-data").unwrap();

        let url = ObjectStoreUrl::parse("s3://raw-data").unwrap();
        assert!(ctx.runtime_env().object_store(&url).is_ok());
    }
}
