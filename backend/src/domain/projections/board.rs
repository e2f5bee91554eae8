//! Order board rows.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{ProjectionContext, visible_orders};
use crate::domain::{
    Capability, ServiceOrderId, ServiceOrderStatus, StoreSnapshot, User, UserId, Viewer,
};

/// Entry in a row's assignment picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicianOption {
    pub id: UserId,
    pub name: String,
}

impl From<&User> for TechnicianOption {
    fn from(user: &User) -> Self {
        Self {
            id: user.id().clone(),
            name: user.name().to_string(),
        }
    }
}

/// One service order on the board.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBoardRow {
    pub id: ServiceOrderId,
    pub status: ServiceOrderStatus,
    pub status_label: &'static str,
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub formatted_date: String,
    pub address: String,
    pub assigned_technician_id: Option<UserId>,
    /// Roster name of the assignee, or the localized "unassigned" label.
    pub assigned_technician_name: String,
    pub can_remove: bool,
    pub can_assign: bool,
    pub can_change_status: bool,
    /// Statuses the row may move to next.
    pub next_statuses: Vec<ServiceOrderStatus>,
    pub assignable_technicians: Vec<TechnicianOption>,
}

/// Board rows for `viewer`, in collection order.
///
/// Admins see every order; technicians see only orders assigned to them.
pub fn order_board(
    snapshot: &StoreSnapshot,
    viewer: &Viewer,
    context: &ProjectionContext,
) -> Vec<OrderBoardRow> {
    let locale = context.locale();
    let technicians: Vec<TechnicianOption> =
        snapshot.technicians().map(TechnicianOption::from).collect();
    let can_remove = viewer.can(Capability::RemoveOrders);
    let can_assign = viewer.can(Capability::AssignOrders);

    visible_orders(snapshot, viewer)
        .map(|order| {
            let assignee = order
                .assigned_technician_id()
                .and_then(|id| snapshot.find_user(id));
            let can_change_status = viewer.may_change_status(order);
            let next_statuses = if can_change_status {
                ServiceOrderStatus::ALL
                    .into_iter()
                    .filter(|next| order.status().can_transition_to(*next))
                    .collect()
            } else {
                Vec::new()
            };
            OrderBoardRow {
                id: order.id().clone(),
                status: order.status(),
                status_label: locale.status_label(order.status()),
                title: order.title().to_owned(),
                description: order.description().to_owned(),
                date: order.date(),
                formatted_date: context.format_schedule(order.date()),
                address: order.location().address().to_owned(),
                assigned_technician_id: order.assigned_technician_id().cloned(),
                assigned_technician_name: assignee.map_or_else(
                    || locale.unassigned_label().to_owned(),
                    |user| user.name().to_string(),
                ),
                can_remove,
                can_assign,
                can_change_status,
                next_statuses,
                assignable_technicians: technicians.clone(),
            }
        })
        .collect()
}
