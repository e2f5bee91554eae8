//! Technician roster cards; an admin-only surface.

use serde::Serialize;

use super::ProjectionContext;
use crate::domain::{Capability, EmailAddress, Error, StoreSnapshot, UserId, Viewer};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterCard {
    pub id: UserId,
    pub name: String,
    pub email: EmailAddress,
    pub initial: char,
    pub role_label: &'static str,
    pub badge: &'static str,
    /// Orders currently assigned to the technician.
    pub assigned_orders: usize,
}

/// Cards for every technician, or a permission denial for non-admins.
pub fn roster_cards(
    snapshot: &StoreSnapshot,
    viewer: &Viewer,
    context: &ProjectionContext,
) -> Result<Vec<RosterCard>, Error> {
    viewer.require(Capability::ManageRoster)?;
    let locale = context.locale();
    Ok(snapshot
        .technicians()
        .map(|user| RosterCard {
            id: user.id().clone(),
            name: user.name().to_string(),
            email: user.email().clone(),
            initial: user
                .name()
                .as_ref()
                .chars()
                .next()
                .and_then(|c| c.to_uppercase().next())
                .unwrap_or('?'),
            role_label: locale.role_label(user.role()),
            badge: locale.active_label(),
            assigned_orders: snapshot
                .service_orders
                .iter()
                .filter(|order| order.is_assigned_to(user.id()))
                .count(),
        })
        .collect())
}
