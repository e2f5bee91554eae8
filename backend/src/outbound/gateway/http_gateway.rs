//! Reqwest-backed dispatch gateway adapter.
//!
//! Talks to a PostgREST-style table API under `rest/v1/` and to a privileged
//! edge function under `functions/v1/`. The adapter owns transport details
//! only: headers, filters, HTTP error mapping and row decoding.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use super::dto::{
    AdminResponseDto, AssignmentPatchDto, ProfileRowDto, ServiceOrderInsertDto,
    ServiceOrderRowDto, StatusPatchDto,
};
use crate::domain::ports::{AdminAction, AdminActionReceipt, DispatchGateway, GatewayError};
use crate::domain::{ServiceOrder, ServiceOrderDraft, ServiceOrderId, ServiceOrderStatus, User, UserId};

const SERVICE_ORDERS_TABLE: &str = "rest/v1/service_orders";
const PROFILES_TABLE: &str = "rest/v1/profiles";
const FUNCTIONS_PREFIX: &str = "functions/v1/";
const PREFER_REPRESENTATION: &str = "return=representation";
const PREFER_MINIMAL: &str = "return=minimal";

/// Connection settings for [`RestDispatchGateway`].
pub struct RestGatewayConfig {
    /// Project root, for example `https://project.example.co/`.
    pub base_url: Url,
    /// Public API key sent as the `apikey` header.
    pub api_key: Zeroizing<String>,
    /// Session access token; the API key is used as bearer when absent.
    pub access_token: Option<Zeroizing<String>>,
    /// Name of the admin-action edge function.
    pub admin_function: String,
    pub timeout: Duration,
}

/// Gateway adapter performing HTTP requests against one project.
pub struct RestDispatchGateway {
    client: Client,
    base_url: Url,
    api_key: Zeroizing<String>,
    bearer: Zeroizing<String>,
    admin_function: String,
}

impl RestDispatchGateway {
    /// Build an adapter using a reqwest client with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(config: RestGatewayConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        let bearer = config
            .access_token
            .unwrap_or_else(|| config.api_key.clone());
        Ok(Self {
            client,
            base_url: with_trailing_slash(config.base_url),
            api_key: config.api_key,
            bearer,
            admin_function: config.admin_function,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        self.base_url
            .join(path)
            .map_err(|error| GatewayError::connection(format!("invalid endpoint '{path}': {error}")))
    }

    fn table_url(&self, table: &str, filters: &[(&str, String)]) -> Result<Url, GatewayError> {
        let mut url = self.endpoint(table)?;
        if !filters.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in filters {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", self.api_key.as_str())
            .bearer_auth(self.bearer.as_str())
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send(&self, request: RequestBuilder) -> Result<Vec<u8>, GatewayError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }
        Ok(body.to_vec())
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn eq_filter(value: impl AsRef<str>) -> String {
    format!("eq.{}", value.as_ref())
}

#[async_trait]
impl DispatchGateway for RestDispatchGateway {
    async fn list_service_orders(&self) -> Result<Vec<ServiceOrder>, GatewayError> {
        let url = self.table_url(
            SERVICE_ORDERS_TABLE,
            &[
                ("select", "*".to_owned()),
                ("order", "created_at.desc".to_owned()),
            ],
        )?;
        let body = self.send(self.client.get(url)).await?;
        parse_service_orders(&body)
    }

    async fn insert_service_order(
        &self,
        draft: &ServiceOrderDraft,
        status: ServiceOrderStatus,
    ) -> Result<ServiceOrder, GatewayError> {
        let url = self.table_url(SERVICE_ORDERS_TABLE, &[])?;
        let request = self
            .client
            .post(url)
            .header("Prefer", PREFER_REPRESENTATION)
            .json(&ServiceOrderInsertDto::new(draft, status));
        let body = self.send(request).await?;
        let rows: Vec<ServiceOrderRowDto> = decode(&body)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::decode("insert returned no rows"))?;
        row.into_domain().map_err(GatewayError::decode)
    }

    async fn update_service_order_status(
        &self,
        id: &ServiceOrderId,
        status: ServiceOrderStatus,
    ) -> Result<(), GatewayError> {
        let url = self.table_url(SERVICE_ORDERS_TABLE, &[("id", eq_filter(id))])?;
        let request = self
            .client
            .patch(url)
            .header("Prefer", PREFER_MINIMAL)
            .json(&StatusPatchDto {
                status: status.as_str(),
            });
        self.send(request).await.map(drop)
    }

    async fn update_service_order_assignment(
        &self,
        id: &ServiceOrderId,
        technician_id: Option<UserId>,
    ) -> Result<(), GatewayError> {
        let url = self.table_url(SERVICE_ORDERS_TABLE, &[("id", eq_filter(id))])?;
        let request = self
            .client
            .patch(url)
            .header("Prefer", PREFER_MINIMAL)
            .json(&AssignmentPatchDto {
                assigned_technician_id: technician_id.as_ref().map(AsRef::as_ref),
            });
        self.send(request).await.map(drop)
    }

    async fn delete_service_order(&self, id: &ServiceOrderId) -> Result<(), GatewayError> {
        let url = self.table_url(SERVICE_ORDERS_TABLE, &[("id", eq_filter(id))])?;
        self.send(self.client.delete(url)).await.map(drop)
    }

    async fn clear_technician_assignments(
        &self,
        technician_id: &UserId,
    ) -> Result<usize, GatewayError> {
        let url = self.table_url(
            SERVICE_ORDERS_TABLE,
            &[
                ("assigned_technician_id", eq_filter(technician_id)),
                ("select", "id".to_owned()),
            ],
        )?;
        let request = self
            .client
            .patch(url)
            .header("Prefer", PREFER_REPRESENTATION)
            .json(&AssignmentPatchDto {
                assigned_technician_id: None,
            });
        let body = self.send(request).await?;
        let rows: Vec<serde_json::Value> = decode(&body)?;
        Ok(rows.len())
    }

    async fn list_profiles(&self) -> Result<Vec<User>, GatewayError> {
        let url = self.table_url(PROFILES_TABLE, &[("select", "*".to_owned())])?;
        let body = self.send(self.client.get(url)).await?;
        parse_profiles(&body)
    }

    async fn invoke_admin_action(
        &self,
        action: &AdminAction,
    ) -> Result<AdminActionReceipt, GatewayError> {
        let url = self.endpoint(&format!("{FUNCTIONS_PREFIX}{}", self.admin_function))?;
        debug!(action = action.name(), "invoking admin action");
        let response = self
            .authorized(self.client.post(url).json(action))
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        parse_admin_response(status, body.as_ref())
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, GatewayError> {
    serde_json::from_slice(body)
        .map_err(|error| GatewayError::decode(format!("invalid JSON payload: {error}")))
}

/// Decode order rows, skipping rows that fail validation.
fn parse_service_orders(body: &[u8]) -> Result<Vec<ServiceOrder>, GatewayError> {
    let rows: Vec<serde_json::Value> = decode(body)?;
    Ok(rows
        .into_iter()
        .filter_map(|row| match serde_json::from_value::<ServiceOrderRowDto>(row) {
            Ok(dto) => {
                let id = dto.id.clone();
                dto.into_domain()
                    .map_err(|error| warn!(order_id = %id, %error, "skipping invalid order row"))
                    .ok()
            }
            Err(error) => {
                warn!(%error, "skipping undecodable order row");
                None
            }
        })
        .collect())
}

/// Decode profile rows, skipping profiles that are not dispatch users.
fn parse_profiles(body: &[u8]) -> Result<Vec<User>, GatewayError> {
    let rows: Vec<serde_json::Value> = decode(body)?;
    Ok(rows
        .into_iter()
        .filter_map(|row| match serde_json::from_value::<ProfileRowDto>(row) {
            Ok(dto) => {
                let id = dto.id.clone();
                dto.into_domain()
                    .map_err(|error| warn!(user_id = %id, %error, "skipping profile row"))
                    .ok()
            }
            Err(error) => {
                warn!(%error, "skipping undecodable profile row");
                None
            }
        })
        .collect())
}

/// An `error` field is a refusal regardless of status; its text is kept verbatim.
fn parse_admin_response(status: StatusCode, body: &[u8]) -> Result<AdminActionReceipt, GatewayError> {
    let parsed = if body.iter().all(u8::is_ascii_whitespace) {
        Some(AdminResponseDto::default())
    } else {
        serde_json::from_slice::<AdminResponseDto>(body).ok()
    };
    match parsed {
        Some(AdminResponseDto {
            error: Some(message),
            ..
        }) => Err(GatewayError::rejected(message)),
        Some(dto) if status.is_success() => {
            let message = dto.message.clone();
            Ok(AdminActionReceipt {
                user_id: dto.into_user_id(),
                message,
            })
        }
        Some(_) | None if !status.is_success() => Err(map_status_error(status, body)),
        _ => Err(GatewayError::decode(format!(
            "invalid admin response: {}",
            body_preview(body)
        ))),
    }
}

fn map_transport_error(error: reqwest::Error) -> GatewayError {
    if error.is_timeout() {
        GatewayError::timeout(error.to_string())
    } else if error.is_decode() || error.is_body() {
        GatewayError::decode(error.to_string())
    } else {
        GatewayError::connection(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> GatewayError {
    let body_preview = body_preview(body);
    let message = if body_preview.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {}", status.as_u16(), body_preview)
    };

    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => GatewayError::timeout(message),
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE => {
            GatewayError::connection(message)
        }
        _ => GatewayError::query(message),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}
