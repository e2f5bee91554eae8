//! Read-only view models for the dispatch surfaces.
//!
//! Every projection is a pure function of a [`StoreSnapshot`], the
//! [`Viewer`], and a [`ProjectionContext`]. None of them perform I/O, so the
//! presentation layer can recompute them on every store revision.
//!
//! [`StoreSnapshot`]: crate::domain::StoreSnapshot
//! [`Viewer`]: crate::domain::Viewer

mod board;
mod calendar;
mod map;
mod profile;
mod roster;

pub use board::{OrderBoardRow, TechnicianOption, order_board};
pub use calendar::{
    CalendarEvent, EVENT_DURATION_HOURS, EventColor, calendar_events, event_duration,
};
pub use map::{MapMarker, MapViewport, MarkerPopup, map_markers};
pub use profile::{SessionProfile, session_profile};
pub use roster::{RosterCard, roster_cards};

use chrono::{DateTime, FixedOffset, Offset, Utc};

use super::{Locale, ServiceOrder, StoreSnapshot, Viewer};

/// Locale and display offset shared by projections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectionContext {
    locale: Locale,
    offset: FixedOffset,
}

impl Default for ProjectionContext {
    fn default() -> Self {
        Self::new(Locale::default(), Utc.fix())
    }
}

impl ProjectionContext {
    pub fn new(locale: Locale, offset: FixedOffset) -> Self {
        Self { locale, offset }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// `at` rendered in the context's offset and locale.
    pub fn format_schedule(&self, at: DateTime<Utc>) -> String {
        self.locale.format_schedule(&at.with_timezone(&self.offset))
    }
}

/// Orders shown to `viewer` on order-centric surfaces.
fn visible_orders<'a>(
    snapshot: &'a StoreSnapshot,
    viewer: &'a Viewer,
) -> impl Iterator<Item = &'a ServiceOrder> + 'a {
    snapshot
        .service_orders
        .iter()
        .filter(move |order| viewer.sees(order))
}
