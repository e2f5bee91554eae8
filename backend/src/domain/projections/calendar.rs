//! Calendar events.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use super::{ProjectionContext, visible_orders};
use crate::domain::{ServiceOrderId, ServiceOrderStatus, StoreSnapshot, Viewer};

/// Fixed length of every calendar event, in hours.
pub const EVENT_DURATION_HOURS: i64 = 2;

/// Fixed length of every calendar event.
pub fn event_duration() -> TimeDelta {
    TimeDelta::hours(EVENT_DURATION_HOURS)
}

/// Event color keyed by order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventColor {
    Amber,
    Blue,
    Green,
    Red,
}

impl EventColor {
    pub fn for_status(status: ServiceOrderStatus) -> Self {
        match status {
            ServiceOrderStatus::Pending => Self::Amber,
            ServiceOrderStatus::InProgress => Self::Blue,
            ServiceOrderStatus::Completed => Self::Green,
            ServiceOrderStatus::Cancelled => Self::Red,
        }
    }

    pub fn hex(self) -> &'static str {
        match self {
            Self::Amber => "#d97706",
            Self::Blue => "#1d4ed8",
            Self::Green => "#047857",
            Self::Red => "#b91c1c",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub order_id: ServiceOrderId,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: ServiceOrderStatus,
    pub status_label: &'static str,
    pub color: EventColor,
    pub color_hex: &'static str,
}

/// One event per order visible to `viewer`.
///
/// Orders whose end would overflow the calendar range are skipped.
pub fn calendar_events(
    snapshot: &StoreSnapshot,
    viewer: &Viewer,
    context: &ProjectionContext,
) -> Vec<CalendarEvent> {
    visible_orders(snapshot, viewer)
        .filter_map(|order| {
            let start = order.date();
            let end = start.checked_add_signed(event_duration())?;
            let color = EventColor::for_status(order.status());
            Some(CalendarEvent {
                order_id: order.id().clone(),
                title: order.title().to_owned(),
                start,
                end,
                status: order.status(),
                status_label: context.locale().status_label(order.status()),
                color,
                color_hex: color.hex(),
            })
        })
        .collect()
}
