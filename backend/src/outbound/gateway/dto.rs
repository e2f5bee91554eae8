//! Wire representations for the REST table API and admin-action endpoint.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use crate::domain::{
    Location, Role, ServiceOrder, ServiceOrderDraft, ServiceOrderId, ServiceOrderStatus, User,
    UserId, normalize_technician_id,
};

/// Identifiers arrive as strings from UUID columns and as numbers from
/// serial columns.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawIdentifier {
    Text(String),
    Number(i64),
}

impl RawIdentifier {
    fn into_string(self) -> String {
        match self {
            Self::Text(value) => value,
            Self::Number(value) => value.to_string(),
        }
    }
}

fn deserialize_identifier<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawIdentifier::deserialize(deserializer).map(RawIdentifier::into_string)
}

fn deserialize_optional_identifier<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<RawIdentifier>::deserialize(deserializer)
        .map(|value| value.map(RawIdentifier::into_string))
}

/// Accept RFC 3339 timestamps and zone-less timestamps, read as UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(de::Error::custom)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|error| format!("invalid timestamp '{raw}': {error}"))
}

/// One `service_orders` row.
#[derive(Debug, Deserialize)]
pub(super) struct ServiceOrderRowDto {
    #[serde(deserialize_with = "deserialize_identifier")]
    pub(super) id: String,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    date: DateTime<Utc>,
    location_lat: f64,
    location_lng: f64,
    location_address: String,
    #[serde(default, deserialize_with = "deserialize_optional_identifier")]
    assigned_technician_id: Option<String>,
    status: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    created_at: DateTime<Utc>,
}

impl ServiceOrderRowDto {
    pub(super) fn into_domain(self) -> Result<ServiceOrder, String> {
        let id = ServiceOrderId::new(&self.id).map_err(|error| error.to_string())?;
        let status = self
            .status
            .parse::<ServiceOrderStatus>()
            .map_err(|error| error.to_string())?;
        let location = Location::try_new(self.location_lat, self.location_lng, &self.location_address)
            .map_err(|error| error.to_string())?;
        let technician = normalize_technician_id(self.assigned_technician_id.as_deref().unwrap_or(""))
            .map_err(|error| error.to_string())?;
        let draft = ServiceOrderDraft::try_new(
            &self.title,
            self.description.unwrap_or_default(),
            self.date,
            location,
            technician,
        )
        .map_err(|error| error.to_string())?;
        Ok(ServiceOrder::new(id, draft, status, self.created_at))
    }
}

/// Insert body for a new order; the gateway assigns `id` and `created_at`.
#[derive(Debug, Serialize)]
pub(super) struct ServiceOrderInsertDto<'a> {
    title: &'a str,
    description: &'a str,
    date: DateTime<Utc>,
    location_lat: f64,
    location_lng: f64,
    location_address: &'a str,
    assigned_technician_id: Option<&'a str>,
    status: &'static str,
}

impl<'a> ServiceOrderInsertDto<'a> {
    pub(super) fn new(draft: &'a ServiceOrderDraft, status: ServiceOrderStatus) -> Self {
        Self {
            title: draft.title(),
            description: draft.description(),
            date: draft.date(),
            location_lat: draft.location().lat(),
            location_lng: draft.location().lng(),
            location_address: draft.location().address(),
            assigned_technician_id: draft.assigned_technician_id().map(AsRef::as_ref),
            status: status.as_str(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct StatusPatchDto {
    pub(super) status: &'static str,
}

/// `None` serializes as `null` so the column is cleared.
#[derive(Debug, Serialize)]
pub(super) struct AssignmentPatchDto<'a> {
    pub(super) assigned_technician_id: Option<&'a str>,
}

/// One `profiles` row.
#[derive(Debug, Deserialize)]
pub(super) struct ProfileRowDto {
    #[serde(deserialize_with = "deserialize_identifier")]
    pub(super) id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

impl ProfileRowDto {
    /// Profiles without a role are not dispatch users and are rejected.
    pub(super) fn into_domain(self) -> Result<User, String> {
        let role = self
            .role
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| "profile has no role".to_owned())?
            .parse::<Role>()
            .map_err(|error| error.to_string())?;
        let email = self.email.unwrap_or_default();
        let name = [self.name.as_deref(), self.full_name.as_deref()]
            .into_iter()
            .flatten()
            .find(|candidate| !candidate.trim().is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_owned());
        User::try_from_strings(&self.id, &name, &email, role).map_err(|error| error.to_string())
    }
}

/// Admin-action response body. Failures carry `error`; successes may carry
/// the affected account under `user` or `userId`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct AdminResponseDto {
    pub(super) error: Option<String>,
    pub(super) message: Option<String>,
    user: Option<AdminUserDto>,
    #[serde(rename = "userId", deserialize_with = "deserialize_optional_identifier")]
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AdminUserDto {
    #[serde(deserialize_with = "deserialize_identifier")]
    id: String,
}

impl AdminResponseDto {
    pub(super) fn into_user_id(self) -> Option<UserId> {
        self.user
            .map(|user| user.id)
            .or(self.user_id)
            .and_then(|raw| UserId::new(raw).ok())
    }
}
