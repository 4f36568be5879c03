//! Domain operations over the generic request path.
//!
//! Thin parameter-shaping wrappers: each builds a path, method and body and
//! preserves the client's success/error envelope. Read endpoints cache
//! their responses through the store so the rendering layer can show
//! something while offline.

use serde_json::{json, Value};

use super::client::{ApiClient, ApiError};
use super::transport::{RequestOptions, Transport};

impl<T: Transport> ApiClient<T> {
  /// Personalized homepage rails, cached under `cache_homepage`.
  pub async fn get_homepage_content(&self) -> Result<Value, ApiError> {
    self
      .cached_get("homepage", "recommendations/homepage")
      .await
  }

  /// Full-text content search. Results are not cached; queries are too
  /// varied to be worth the storage.
  pub async fn search_content(&self, query: &str) -> Result<Value, ApiError> {
    let mut target = self.resolve("content/search")?;
    target.query_pairs_mut().append_pair("q", query);
    self.dispatch(target, RequestOptions::get()).await
  }

  /// Details for a single title, cached under `cache_content_<id>`.
  pub async fn get_content_details(&self, content_id: &str) -> Result<Value, ApiError> {
    self
      .cached_get(
        &format!("content_{content_id}"),
        &format!("content/{content_id}"),
      )
      .await
  }

  /// Record a view/like/rating interaction. Offline interactions are
  /// queued and replayed in order on reconnect.
  pub async fn record_interaction(
    &self,
    content_id: &str,
    interaction_type: &str,
    rating: Option<f64>,
  ) -> Result<Value, ApiError> {
    let body = json!({
      "content_id": content_id,
      "interaction_type": interaction_type,
      "rating": rating,
    });
    self.request("interactions", RequestOptions::post(body)).await
  }

  /// Authenticate and persist the returned bearer token.
  pub async fn login(&self, email: &str, password: &str) -> Result<Value, ApiError> {
    let body = json!({ "email": email, "password": password });
    let data = self.request("auth/login", RequestOptions::post(body)).await?;

    if let Some(token) = data.get("token").and_then(Value::as_str) {
      self.store().set_auth_token(token);
    }
    Ok(data)
  }

  /// Drop the stored credential. Purely local; the server keeps no
  /// session state for bearer tokens.
  pub fn logout(&self) {
    self.store().clear_auth_token();
  }

  async fn cached_get(&self, cache_key: &str, path: &str) -> Result<Value, ApiError> {
    if let Some(cached) = self.store().get_cached(cache_key) {
      return Ok(cached);
    }

    let data = self.request(path, RequestOptions::get()).await?;
    self
      .store()
      .set_cached(cache_key, data.clone(), Some(self.cache_ttl()));
    Ok(data)
  }
}
