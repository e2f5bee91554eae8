//! Driven port for blocking user notifications.
//!
//! Remote-call failures must reach the person at the dashboard. The
//! presentation layer implements this port with whatever modal or toast it
//! uses; the store only hands over a [`Notice`].

use std::fmt;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::domain::ErrorCode;

/// Store operation a notice refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreOperation {
    FetchServiceOrders,
    FetchTechnicians,
    AddServiceOrder,
    UpdateServiceOrderStatus,
    AssignServiceOrder,
    RemoveServiceOrder,
    AddTechnician,
    RemoveTechnician,
}

impl StoreOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FetchServiceOrders => "fetch_service_orders",
            Self::FetchTechnicians => "fetch_technicians",
            Self::AddServiceOrder => "add_service_order",
            Self::UpdateServiceOrderStatus => "update_service_order_status",
            Self::AssignServiceOrder => "assign_service_order",
            Self::RemoveServiceOrder => "remove_service_order",
            Self::AddTechnician => "add_technician",
            Self::RemoveTechnician => "remove_technician",
        }
    }
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure the user has to acknowledge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub operation: StoreOperation,
    pub code: ErrorCode,
    pub message: String,
}

/// Port for surfacing failures to the user.
#[cfg_attr(test, mockall::automock)]
pub trait UserNotifier: Send + Sync {
    fn notify(&self, notice: &Notice);
}

/// Notifier that drops every notice.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureUserNotifier;

impl UserNotifier for FixtureUserNotifier {
    fn notify(&self, _notice: &Notice) {}
}

/// Notifier that keeps every notice for later inspection.
#[derive(Debug, Default)]
pub struct RecordingUserNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingUserNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notices received so far, oldest first.
    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl UserNotifier for RecordingUserNotifier {
    fn notify(&self, notice: &Notice) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice.clone());
    }
}
