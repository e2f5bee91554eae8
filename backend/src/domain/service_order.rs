//! Service order data model.
//!
//! A service order is a unit of field work: a location, a schedule, a status,
//! and an optional technician assignment. Orders are created from a
//! [`ServiceOrderDraft`]; the gateway supplies the identifier and creation
//! timestamp.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::{UserId, UserValidationError};

/// Validation errors raised while building orders, drafts, and locations.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceOrderValidationError {
    EmptyId,
    InvalidId,
    EmptyTitle,
    EmptyAddress,
    LatitudeOutOfRange { value: f64 },
    LongitudeOutOfRange { value: f64 },
    InvalidTechnicianId(UserValidationError),
    UnknownStatus { value: String },
}

impl fmt::Display for ServiceOrderValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyId => write!(f, "service order id must not be empty"),
            Self::InvalidId => {
                write!(f, "service order id must not contain surrounding whitespace")
            }
            Self::EmptyTitle => write!(f, "title must not be empty"),
            Self::EmptyAddress => write!(f, "address must not be empty"),
            Self::LatitudeOutOfRange { value } => {
                write!(f, "latitude must be within [-90, 90], got {value}")
            }
            Self::LongitudeOutOfRange { value } => {
                write!(f, "longitude must be within [-180, 180], got {value}")
            }
            Self::InvalidTechnicianId(inner) => write!(f, "technician id is invalid: {inner}"),
            Self::UnknownStatus { value } => write!(f, "unknown service order status '{value}'"),
        }
    }
}

impl std::error::Error for ServiceOrderValidationError {}

/// Opaque stable service order identifier issued by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceOrderId(String);

impl ServiceOrderId {
    /// Validate and construct a [`ServiceOrderId`].
    pub fn new(id: impl AsRef<str>) -> Result<Self, ServiceOrderValidationError> {
        Self::from_owned(id.as_ref().to_owned())
    }

    /// Generate a new random [`ServiceOrderId`].
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    fn from_owned(id: String) -> Result<Self, ServiceOrderValidationError> {
        if id.is_empty() {
            return Err(ServiceOrderValidationError::EmptyId);
        }
        if id.trim() != id {
            return Err(ServiceOrderValidationError::InvalidId);
        }
        Ok(Self(id))
    }
}

impl AsRef<str> for ServiceOrderId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ServiceOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<ServiceOrderId> for String {
    fn from(value: ServiceOrderId) -> Self {
        value.0
    }
}

impl TryFrom<String> for ServiceOrderId {
    type Error = ServiceOrderValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_owned(value)
    }
}

/// Lifecycle status of a service order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceOrderStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

/// Outcome of a permitted status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Target equals the current status; nothing to send.
    Unchanged,
    /// Target differs and the move is permitted.
    Changed,
}

/// A status change rejected by the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransitionError {
    pub from: ServiceOrderStatus,
    pub to: ServiceOrderStatus,
}

impl fmt::Display for StatusTransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot move a service order from {} to {}",
            self.from, self.to
        )
    }
}

impl std::error::Error for StatusTransitionError {}

impl ServiceOrderStatus {
    /// Every status in board display order.
    pub const ALL: [Self; 4] = [
        Self::Pending,
        Self::InProgress,
        Self::Completed,
        Self::Cancelled,
    ];

    /// Wire representation used by the gateway.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the transition table permits moving to `next`.
    pub fn can_transition_to(self, next: Self) -> bool {
        use ServiceOrderStatus::{Cancelled, Completed, InProgress, Pending};
        matches!(
            (self, next),
            (Pending, InProgress | Cancelled)
                | (InProgress, Pending | Completed | Cancelled)
                | (Completed, InProgress)
                | (Cancelled, Pending)
        )
    }

    /// Check a move to `next` against the transition table.
    ///
    /// # Examples
    /// ```
    /// use dispatch::domain::{ServiceOrderStatus, Transition};
    ///
    /// let pending = ServiceOrderStatus::Pending;
    /// assert_eq!(
    ///     pending.transition_to(ServiceOrderStatus::InProgress),
    ///     Ok(Transition::Changed)
    /// );
    /// assert_eq!(pending.transition_to(pending), Ok(Transition::Unchanged));
    /// assert!(pending.transition_to(ServiceOrderStatus::Completed).is_err());
    /// ```
    pub fn transition_to(self, next: Self) -> Result<Transition, StatusTransitionError> {
        if self == next {
            return Ok(Transition::Unchanged);
        }
        if self.can_transition_to(next) {
            Ok(Transition::Changed)
        } else {
            Err(StatusTransitionError {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for ServiceOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceOrderStatus {
    type Err = ServiceOrderValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == value.trim())
            .ok_or_else(|| ServiceOrderValidationError::UnknownStatus {
                value: value.to_owned(),
            })
    }
}

/// Geographic position and street address of the work site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LocationDto", into = "LocationDto")]
pub struct Location {
    lat: f64,
    lng: f64,
    address: String,
}

impl Location {
    /// Validate coordinates and address.
    pub fn try_new(
        lat: f64,
        lng: f64,
        address: impl AsRef<str>,
    ) -> Result<Self, ServiceOrderValidationError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(ServiceOrderValidationError::LatitudeOutOfRange { value: lat });
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(ServiceOrderValidationError::LongitudeOutOfRange { value: lng });
        }
        let address = address.as_ref().trim();
        if address.is_empty() {
            return Err(ServiceOrderValidationError::EmptyAddress);
        }
        Ok(Self {
            lat,
            lng,
            address: address.to_owned(),
        })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }

    pub fn address(&self) -> &str {
        self.address.as_str()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LocationDto {
    lat: f64,
    lng: f64,
    address: String,
}

impl From<Location> for LocationDto {
    fn from(value: Location) -> Self {
        Self {
            lat: value.lat,
            lng: value.lng,
            address: value.address,
        }
    }
}

impl TryFrom<LocationDto> for Location {
    type Error = ServiceOrderValidationError;

    fn try_from(value: LocationDto) -> Result<Self, Self::Error> {
        Location::try_new(value.lat, value.lng, value.address)
    }
}

/// Normalize a raw technician reference from a form or command.
///
/// Empty and whitespace-only input means "unassigned".
///
/// # Examples
/// ```
/// use dispatch::domain::normalize_technician_id;
///
/// assert_eq!(normalize_technician_id("").unwrap(), None);
/// assert_eq!(normalize_technician_id("  ").unwrap(), None);
/// assert!(normalize_technician_id("2").unwrap().is_some());
/// ```
pub fn normalize_technician_id(
    raw: &str,
) -> Result<Option<UserId>, ServiceOrderValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    UserId::new(trimmed)
        .map(Some)
        .map_err(ServiceOrderValidationError::InvalidTechnicianId)
}

/// Order fields supplied when scheduling new work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ServiceOrderDraftDto", into = "ServiceOrderDraftDto")]
pub struct ServiceOrderDraft {
    title: String,
    description: String,
    date: DateTime<Utc>,
    location: Location,
    assigned_technician_id: Option<UserId>,
}

impl ServiceOrderDraft {
    /// Validate and construct a draft.
    pub fn try_new(
        title: impl AsRef<str>,
        description: impl Into<String>,
        date: DateTime<Utc>,
        location: Location,
        assigned_technician_id: Option<UserId>,
    ) -> Result<Self, ServiceOrderValidationError> {
        let title = title.as_ref().trim();
        if title.is_empty() {
            return Err(ServiceOrderValidationError::EmptyTitle);
        }
        Ok(Self {
            title: title.to_owned(),
            description: description.into(),
            date,
            location,
            assigned_technician_id,
        })
    }

    pub fn title(&self) -> &str {
        self.title.as_str()
    }

    pub fn description(&self) -> &str {
        self.description.as_str()
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn assigned_technician_id(&self) -> Option<&UserId> {
        self.assigned_technician_id.as_ref()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceOrderDraftDto {
    title: String,
    #[serde(default)]
    description: String,
    date: DateTime<Utc>,
    location: Location,
    #[serde(default)]
    assigned_technician_id: Option<String>,
}

impl From<ServiceOrderDraft> for ServiceOrderDraftDto {
    fn from(value: ServiceOrderDraft) -> Self {
        Self {
            title: value.title,
            description: value.description,
            date: value.date,
            location: value.location,
            assigned_technician_id: value.assigned_technician_id.map(String::from),
        }
    }
}

impl TryFrom<ServiceOrderDraftDto> for ServiceOrderDraft {
    type Error = ServiceOrderValidationError;

    fn try_from(value: ServiceOrderDraftDto) -> Result<Self, Self::Error> {
        let technician = match value.assigned_technician_id.as_deref() {
            Some(raw) => normalize_technician_id(raw)?,
            None => None,
        };
        ServiceOrderDraft::try_new(
            value.title,
            value.description,
            value.date,
            value.location,
            technician,
        )
    }
}

/// Canonical service order as stored by the gateway.
///
/// ## Invariants
/// - `title` is non-empty once trimmed.
/// - `location` holds in-range coordinates and a non-empty address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ServiceOrderDto", into = "ServiceOrderDto")]
pub struct ServiceOrder {
    id: ServiceOrderId,
    title: String,
    description: String,
    date: DateTime<Utc>,
    location: Location,
    status: ServiceOrderStatus,
    assigned_technician_id: Option<UserId>,
    created_at: DateTime<Utc>,
}

impl ServiceOrder {
    /// Assemble a stored order from a validated draft.
    pub fn new(
        id: ServiceOrderId,
        draft: ServiceOrderDraft,
        status: ServiceOrderStatus,
        created_at: DateTime<Utc>,
    ) -> Self {
        let ServiceOrderDraft {
            title,
            description,
            date,
            location,
            assigned_technician_id,
        } = draft;
        Self {
            id,
            title,
            description,
            date,
            location,
            status,
            assigned_technician_id,
            created_at,
        }
    }

    pub fn id(&self) -> &ServiceOrderId {
        &self.id
    }

    pub fn title(&self) -> &str {
        self.title.as_str()
    }

    pub fn description(&self) -> &str {
        self.description.as_str()
    }

    /// Scheduled start of the work.
    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn status(&self) -> ServiceOrderStatus {
        self.status
    }

    pub fn assigned_technician_id(&self) -> Option<&UserId> {
        self.assigned_technician_id.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether the order is assigned to `technician_id`.
    pub fn is_assigned_to(&self, technician_id: &UserId) -> bool {
        self.assigned_technician_id.as_ref() == Some(technician_id)
    }

    pub(crate) fn set_status(&mut self, status: ServiceOrderStatus) {
        self.status = status;
    }

    pub(crate) fn set_assigned_technician_id(&mut self, technician_id: Option<UserId>) {
        self.assigned_technician_id = technician_id;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceOrderDto {
    id: String,
    title: String,
    #[serde(default)]
    description: String,
    date: DateTime<Utc>,
    location: Location,
    status: ServiceOrderStatus,
    assigned_technician_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ServiceOrder> for ServiceOrderDto {
    fn from(value: ServiceOrder) -> Self {
        Self {
            id: value.id.into(),
            title: value.title,
            description: value.description,
            date: value.date,
            location: value.location,
            status: value.status,
            assigned_technician_id: value.assigned_technician_id.map(String::from),
            created_at: value.created_at,
        }
    }
}

impl TryFrom<ServiceOrderDto> for ServiceOrder {
    type Error = ServiceOrderValidationError;

    fn try_from(value: ServiceOrderDto) -> Result<Self, Self::Error> {
        let id = ServiceOrderId::new(value.id)?;
        let technician = match value.assigned_technician_id.as_deref() {
            Some(raw) => normalize_technician_id(raw)?,
            None => None,
        };
        let draft = ServiceOrderDraft::try_new(
            value.title,
            value.description,
            value.date,
            value.location,
            technician,
        )?;
        Ok(ServiceOrder::new(id, draft, value.status, value.created_at))
    }
}

#[cfg(test)]
mod tests;
