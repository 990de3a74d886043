use crate::store::{ObjectError, ObjectStore};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use url::Url;

/// Object store over an authenticated bucket HTTP API. Uploads upsert, so
/// re-uploading to the same path replaces the object while its public URL
/// stays stable.
pub struct HttpObjectStore {
    http: reqwest::Client,
    base_url: Url,
    bucket: String,
    api_key: String,
}

impl HttpObjectStore {
    #[must_use]
    pub fn new(mut base_url: Url, bucket: impl Into<String>, api_key: impl Into<String>) -> Self {
        // Joining below is relative to the base path, which must end in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Self {
            http: reqwest::Client::new(),
            base_url,
            bucket: bucket.into(),
            api_key: api_key.into(),
        }
    }

    fn object_url(&self, path: &str) -> Result<Url, ObjectError> {
        let url = self
            .base_url
            .join(&format!("object/{}/{}", self.bucket, path))?;
        Ok(url)
    }

    fn public_url(&self, path: &str) -> Result<Url, ObjectError> {
        let url = self
            .base_url
            .join(&format!("object/public/{}/{}", self.bucket, path))?;
        Ok(url)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ObjectError> {
        let target = self.object_url(path)?;

        self.http
            .post(target)
            .bearer_auth(&self.api_key)
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?
            .error_for_status()?;

        Ok(self.public_url(path)?.into())
    }
}

#[cfg(test)]
mod tests {
    use crate::object::HttpObjectStore;
    use url::Url;

    fn store(base: &str) -> HttpObjectStore {
        HttpObjectStore::new(Url::parse(base).unwrap(), "images", "secret")
    }

    #[test]
    fn object_and_public_urls() {
        let store = store("https://storage.example/v1/");

        assert_eq!(
            store.object_url("avatars/u1/avatar.jpg").unwrap().as_str(),
            "https://storage.example/v1/object/images/avatars/u1/avatar.jpg"
        );
        assert_eq!(
            store.public_url("avatars/u1/avatar.jpg").unwrap().as_str(),
            "https://storage.example/v1/object/public/images/avatars/u1/avatar.jpg"
        );
    }

    #[test]
    fn base_url_without_trailing_slash() {
        let store = store("https://storage.example/v1");

        assert_eq!(
            store.object_url("a.png").unwrap().as_str(),
            "https://storage.example/v1/object/images/a.png"
        );
    }
}
