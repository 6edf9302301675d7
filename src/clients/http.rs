//! reqwest-backed implementations of the service seams.
//!
//! Every call carries a timeout. Error responses in the suite's
//! `{"error": {"code", "message"}}` shape are decoded back into the matching
//! [`AppError`] variant, so a participant's `InsufficientFunds` reaches the
//! coordinator as `InsufficientFunds`, not as a generic transport failure.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

use super::{AuditSink, ParticipantClient, RegistryClient};
use crate::{
    error::{AppError, ErrorBody},
    models::{
        account::{AbortRequest, CheckFundsResponse, DebitResponse, FundsRequest},
        registry::{
            InstanceListResponse, InstanceResponse, LoadReport, RegisterRequest, StatusResponse,
        },
        transaction::AuditRecord,
    },
};

/// Per-request timeout for calls between services.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

fn build_client(timeout: Duration) -> Result<reqwest::Client, AppError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Turn a response into `T` or into the error the remote service reported.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&body) {
        Ok(parsed) => Err(AppError::from_code(&parsed.error.code, parsed.error.message)),
        Err(_) => Err(AppError::Upstream(format!(
            "unexpected status {}: {}",
            status, body
        ))),
    }
}

async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
    http: &reqwest::Client,
    url: String,
    body: &B,
) -> Result<T, AppError> {
    let response = http.post(url).json(body).send().await?;
    decode(response).await
}

/// Client for a pool registry at `base_url`.
#[derive(Debug, Clone)]
pub struct HttpRegistryClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpRegistryClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, AppError> {
        Ok(Self {
            base_url: base_url.into(),
            http: build_client(DEFAULT_CALL_TIMEOUT)?,
        })
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn register(&self, address: &str) -> Result<(), AppError> {
        let _: StatusResponse = post_json(
            &self.http,
            endpoint(&self.base_url, "/registry/register"),
            &RegisterRequest {
                address: address.to_string(),
            },
        )
        .await?;
        Ok(())
    }

    async fn report_load(&self, address: &str, sample: f64) -> Result<(), AppError> {
        let _: StatusResponse = post_json(
            &self.http,
            endpoint(&self.base_url, "/registry/load"),
            &LoadReport {
                address: address.to_string(),
                sample,
            },
        )
        .await?;
        Ok(())
    }

    async fn select(&self) -> Result<String, AppError> {
        let response = self
            .http
            .get(endpoint(&self.base_url, "/registry/select"))
            .send()
            .await?;
        let instance: InstanceResponse = decode(response).await?;
        Ok(instance.address)
    }

    async fn list(&self) -> Result<Vec<String>, AppError> {
        let response = self
            .http
            .get(endpoint(&self.base_url, "/registry/instances"))
            .send()
            .await?;
        let list: InstanceListResponse = decode(response).await?;
        Ok(list.addresses)
    }
}

/// Client for any participant; the address is chosen per call.
#[derive(Debug, Clone)]
pub struct HttpParticipantClient {
    http: reqwest::Client,
}

impl HttpParticipantClient {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(DEFAULT_CALL_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            http: build_client(timeout)?,
        })
    }
}

fn funds(account_number: &str, amount_cents: i64) -> FundsRequest {
    FundsRequest {
        account_number: account_number.to_string(),
        amount_cents,
    }
}

#[async_trait]
impl ParticipantClient for HttpParticipantClient {
    async fn check_funds(
        &self,
        address: &str,
        account_number: &str,
        amount_cents: i64,
    ) -> Result<CheckFundsResponse, AppError> {
        post_json(
            &self.http,
            endpoint(address, "/ledger/check-funds"),
            &funds(account_number, amount_cents),
        )
        .await
    }

    async fn debit(
        &self,
        address: &str,
        account_number: &str,
        amount_cents: i64,
    ) -> Result<bool, AppError> {
        let response: DebitResponse = post_json(
            &self.http,
            endpoint(address, "/ledger/debit"),
            &funds(account_number, amount_cents),
        )
        .await?;
        Ok(response.success)
    }

    async fn acknowledge_abort(
        &self,
        address: &str,
        transaction_id: &str,
    ) -> Result<(), AppError> {
        let _: StatusResponse = post_json(
            &self.http,
            endpoint(address, "/ledger/abort"),
            &AbortRequest {
                transaction_id: transaction_id.to_string(),
            },
        )
        .await?;
        Ok(())
    }
}

/// Client for the audit-log service at `base_url`.
#[derive(Debug, Clone)]
pub struct HttpAuditSink {
    base_url: String,
    http: reqwest::Client,
}

impl HttpAuditSink {
    pub fn new(base_url: impl Into<String>) -> Result<Self, AppError> {
        Ok(Self {
            base_url: base_url.into(),
            http: build_client(DEFAULT_CALL_TIMEOUT)?,
        })
    }
}

#[async_trait]
impl AuditSink for HttpAuditSink {
    async fn record(&self, record: AuditRecord) -> Result<(), AppError> {
        let _: StatusResponse =
            post_json(&self.http, endpoint(&self.base_url, "/audit"), &record).await?;
        Ok(())
    }
}
