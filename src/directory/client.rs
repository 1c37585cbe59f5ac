//! HTTP transport for the people/group directory API.

use crate::config::Config;
use crate::directory::error::DirectoryError;
use crate::directory::types::{RawDirectoryRecord, ResultKind};
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::future::Future;
use tracing::debug;
use url::Url;

/// Remote directory the search cache sits in front of.
pub trait Directory: Send + Sync {
  /// Free-text search, optionally restricted to some result kinds
  fn search(
    &self,
    text: &str,
    limit: usize,
    types: &[ResultKind],
  ) -> impl Future<Output = Result<Vec<RawDirectoryRecord>, DirectoryError>> + Send;

  /// Fetch one record by id
  fn get_by_id(
    &self,
    id: &str,
  ) -> impl Future<Output = Result<RawDirectoryRecord, DirectoryError>> + Send;
}

/// Search responses come either wrapped or as a bare array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SearchResponse {
  Wrapped { results: Vec<RawDirectoryRecord> },
  Bare(Vec<RawDirectoryRecord>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecordResponse {
  Wrapped { data: RawDirectoryRecord },
  Bare(RawDirectoryRecord),
}

/// Directory API client over HTTP
#[derive(Clone)]
pub struct HttpDirectory {
  client: reqwest::Client,
  base_url: Url,
  token: Option<String>,
}

impl HttpDirectory {
  pub fn new(config: &Config) -> Result<Self> {
    let base_url = Url::parse(&config.directory.url)
      .map_err(|e| eyre!("Invalid directory url {}: {}", config.directory.url, e))?;

    // Anonymous access is allowed for public directories
    let token = Config::get_api_token().ok();

    let client = reqwest::Client::builder()
      .timeout(std::time::Duration::from_secs(config.directory.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      base_url,
      token,
    })
  }

  fn endpoint(&self, segments: &[&str]) -> Result<Url, DirectoryError> {
    let mut url = self.base_url.clone();
    url
      .path_segments_mut()
      .map_err(|_| DirectoryError::Other(format!("{} cannot be a base url", self.base_url)))?
      .pop_if_empty()
      .extend(segments);
    Ok(url)
  }

  async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, DirectoryError> {
    debug!(%url, "directory request");

    let mut request = self.client.get(url);
    if let Some(token) = &self.token {
      request = request.bearer_auth(token);
    }

    let response = request.send().await.map_err(request_error)?;

    let status = response.status();
    if !status.is_success() {
      let message = response
        .text()
        .await
        .unwrap_or_default()
        .chars()
        .take(200)
        .collect::<String>();
      return Err(DirectoryError::Status {
        status: status.as_u16(),
        message: if message.is_empty() {
          status.to_string()
        } else {
          message
        },
      });
    }

    response.json::<T>().await.map_err(request_error)
  }
}

fn request_error(e: reqwest::Error) -> DirectoryError {
  if e.is_decode() {
    DirectoryError::Other(format!("invalid directory response: {}", e))
  } else if let Some(status) = e.status() {
    DirectoryError::Status {
      status: status.as_u16(),
      message: e.to_string(),
    }
  } else {
    DirectoryError::Transport(e.to_string())
  }
}

impl Directory for HttpDirectory {
  async fn search(
    &self,
    text: &str,
    limit: usize,
    types: &[ResultKind],
  ) -> Result<Vec<RawDirectoryRecord>, DirectoryError> {
    let mut url = self.endpoint(&["search"])?;
    {
      let mut query = url.query_pairs_mut();
      query.append_pair("q", text);
      query.append_pair("limit", &limit.to_string());
      if !types.is_empty() {
        let types: Vec<&str> = types.iter().map(ResultKind::as_str).collect();
        query.append_pair("types", &types.join(","));
      }
    }

    let response: SearchResponse = self.get_json(url).await?;
    Ok(match response {
      SearchResponse::Wrapped { results } => results,
      SearchResponse::Bare(results) => results,
    })
  }

  async fn get_by_id(&self, id: &str) -> Result<RawDirectoryRecord, DirectoryError> {
    let url = self.endpoint(&["records", id])?;

    let response: RecordResponse = self.get_json(url).await?;
    Ok(match response {
      RecordResponse::Wrapped { data } => data,
      RecordResponse::Bare(record) => record,
    })
  }
}
