//! Supabase Storage: public `images` and `videos` buckets.

use async_trait::async_trait;
use bytes::Bytes;
use domains::{BackendResult, Bucket, MediaStorage};
use reqwest::Method;

use super::SupabaseStore;

#[async_trait]
impl MediaStorage for SupabaseStore {
    async fn upload(&self, bucket: Bucket, path: &str, content_type: &str, data: Bytes) -> BackendResult<()> {
        let request = self
            .client
            .service(Method::POST, &format!("/storage/v1/object/{}/{}", bucket.as_str(), path))
            .header("content-type", content_type)
            .header("x-upsert", "false")
            .body(data);
        self.client.send_empty(request).await
    }

    fn public_url(&self, bucket: Bucket, path: &str) -> String {
        public_object_url(self.client.base_url(), bucket, path)
    }
}

pub fn public_object_url(base_url: &str, bucket: Bucket, path: &str) -> String {
    format!("{base_url}/storage/v1/object/public/{}/{path}", bucket.as_str())
}
