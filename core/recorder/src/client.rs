//! Endpoint client for the game client's local HTTP API.
//!
//! Every failure mode (connection refused, timeout, non-200, bad body)
//! collapses to `None`. Callers treat that exactly like a null field.

use std::future::Future;
use std::time::Duration;

use match_recorder_protocol::{Endpoint, GameResult, PositionalRectangles};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{RecorderError, Result};

pub trait GameApi: Send + Sync {
    fn fetch(&self, endpoint: Endpoint) -> impl Future<Output = Option<Value>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpGameApi {
    client: Client,
    base_url: String,
}

impl HttpGameApi {
    pub fn new(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RecorderError::HttpClient)?;
        Ok(Self {
            client,
            base_url: format!("http://{}:{}/", host, port),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }

    async fn get_json(&self, url: &str) -> std::result::Result<Value, String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| format!("request failed: {}", err))?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(format!("HTTP {}", status.as_u16()));
        }

        resp.json::<Value>()
            .await
            .map_err(|err| format!("invalid JSON body: {}", err))
    }
}

impl GameApi for HttpGameApi {
    async fn fetch(&self, endpoint: Endpoint) -> Option<Value> {
        let url = self.url_for(endpoint);
        match self.get_json(&url).await {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(endpoint = %endpoint, url = %url, error = %err, "Endpoint returned no data");
                None
            }
        }
    }
}

pub async fn fetch_game_result<A: GameApi>(api: &A) -> Option<GameResult> {
    fetch_typed(api, Endpoint::GameResult).await
}

pub async fn fetch_positions<A: GameApi>(api: &A) -> Option<PositionalRectangles> {
    fetch_typed(api, Endpoint::PositionalRectangles).await
}

pub async fn fetch_deck<A: GameApi>(api: &A) -> Option<Value> {
    api.fetch(Endpoint::StaticDecklist)
        .await
        .filter(|value| !value.is_null())
}

async fn fetch_typed<A: GameApi, T: DeserializeOwned>(api: &A, endpoint: Endpoint) -> Option<T> {
    let value = api.fetch(endpoint).await?;
    match serde_json::from_value(value) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            debug!(endpoint = %endpoint, error = %err, "Endpoint body did not match schema");
            None
        }
    }
}
