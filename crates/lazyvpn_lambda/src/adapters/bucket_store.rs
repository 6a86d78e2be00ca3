pub trait BucketStore {
    fn bucket_exists(&self, bucket: &str) -> Result<bool, String>;
    /// Creates `bucket` in `region`. A bucket already owned by the caller
    /// counts as success.
    fn create_bucket(&self, bucket: &str, region: &str) -> Result<(), String>;
}
