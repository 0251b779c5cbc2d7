use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use super::api::USER_HEADER;
use super::models::{Board, Card, ErrorBody, PositionsResponse};
use crate::errors::ReconciliationError;
use crate::reorder::{PositionUpdate, ReconciliationClient, ReconciliationRequest};

/// HTTP client for the board API.
///
/// Never retries. Every failure surfaces as a `ReconciliationError`.
#[derive(Debug, Clone)]
pub struct HttpBoardClient {
    http: reqwest::Client,
    base_url: String,
    user: Option<String>,
    timeout: Duration,
}

impl HttpBoardClient {
    pub fn new(
        base_url: impl Into<String>,
        user: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ReconciliationError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ReconciliationError::Transport)?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Bind this client to one board for use by a move controller.
    pub fn for_board(&self, board_id: i64) -> BoardReconciler {
        BoardReconciler {
            client: self.clone(),
            board_id,
        }
    }

    pub async fn list_boards(&self) -> Result<Vec<Board>, ReconciliationError> {
        self.send_json(self.request(Method::GET, "/api/boards")).await
    }

    pub async fn create_board(&self, name: &str) -> Result<Board, ReconciliationError> {
        let request = self
            .request(Method::POST, "/api/boards")
            .json(&serde_json::json!({ "name": name }));
        self.send_json(request).await
    }

    pub async fn list_cards(&self, board_id: i64) -> Result<Vec<Card>, ReconciliationError> {
        let path = format!("/api/boards/{}/cards", board_id);
        self.send_json(self.request(Method::GET, &path)).await
    }

    pub async fn create_card(
        &self,
        board_id: i64,
        title: &str,
        description: Option<&str>,
    ) -> Result<Card, ReconciliationError> {
        let path = format!("/api/boards/{}/cards", board_id);
        let request = self
            .request(Method::POST, &path)
            .json(&serde_json::json!({ "title": title, "description": description }));
        self.send_json(request).await
    }

    pub async fn delete_card(&self, card_id: i64) -> Result<(), ReconciliationError> {
        let path = format!("/api/cards/{}", card_id);
        self.send(self.request(Method::DELETE, &path)).await?;
        Ok(())
    }

    /// Send one batch of position changes. Returns the board's full ordering.
    pub async fn patch_positions(
        &self,
        board_id: i64,
        request: &ReconciliationRequest<i64>,
    ) -> Result<Vec<PositionUpdate<i64>>, ReconciliationError> {
        let path = format!("/api/boards/{}/positions", board_id);
        let response: PositionsResponse = self
            .send_json(self.request(Method::PATCH, &path).json(request))
            .await?;
        Ok(response.positions)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .http
            .request(method, format!("{}{}", self.base_url, path));
        match &self.user {
            Some(user) => builder.header(USER_HEADER, user),
            None => builder,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ReconciliationError> {
        let response = request
            .send()
            .await
            .map_err(|e| ReconciliationError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.message)
            .ok()
            .filter(|m| !m.is_empty())
            .or_else(|| Some(body.trim().to_string()).filter(|b| !b.is_empty()))
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
        tracing::debug!(status = status.as_u16(), %message, "board authority rejected request");
        Err(ReconciliationError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<R: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<R, ReconciliationError> {
        let response = self.send(request).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ReconciliationError::from_reqwest(e, self.timeout))?;
        serde_json::from_slice(&bytes).map_err(|e| ReconciliationError::Decode(e.to_string()))
    }
}

/// `ReconciliationClient` for the cards of one board.
#[derive(Debug, Clone)]
pub struct BoardReconciler {
    client: HttpBoardClient,
    board_id: i64,
}

#[async_trait]
impl ReconciliationClient<Card> for BoardReconciler {
    async fn persist(
        &self,
        request: &ReconciliationRequest<i64>,
    ) -> Result<Vec<PositionUpdate<i64>>, ReconciliationError> {
        self.client.patch_positions(self.board_id, request).await
    }

    async fn fetch(&self) -> Result<Vec<Card>, ReconciliationError> {
        self.client.list_cards(self.board_id).await
    }
}
