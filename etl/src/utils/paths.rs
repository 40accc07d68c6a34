use common::{Error, Result};
use url::Url;

/// Bucket name of an `s3://` URL, `None` for local paths and other schemes.
pub fn s3_bucket(path: &str) -> Result<Option<String>> {
    if !path.starts_with("s3://") {
        return Ok(None);
    }

    let url = Url::parse(path)?;
    match url.host_str() {
        Some(bucket) if !bucket.is_empty() => Ok(Some(bucket.to_string())),
        _ => Err(Error::InvalidUri(format!("S3 path '{}' has no bucket", path))),
    }
}

/// Destination directory of one output table under the configured root.
pub fn table_destination(output_root: &str, table_name: &str) -> String {
    format!("{}/{}/", output_root.trim_end_matches('/'), table_name)
}
