//! Map markers and the default viewport.

use serde::Serialize;

use super::{ProjectionContext, visible_orders};
use crate::domain::{ServiceOrderId, ServiceOrderStatus, StoreSnapshot, Viewer};

/// Initial map position shown before any marker is focused.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapViewport {
    pub center_lat: f64,
    pub center_lng: f64,
    pub zoom: u8,
}

impl Default for MapViewport {
    fn default() -> Self {
        Self {
            center_lat: -14.8661,
            center_lng: -40.8394,
            zoom: 13,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerPopup {
    pub title: String,
    pub address: String,
    pub status_label: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapMarker {
    pub order_id: ServiceOrderId,
    pub lat: f64,
    pub lng: f64,
    pub status: ServiceOrderStatus,
    pub popup: MarkerPopup,
}

/// One marker per order visible to `viewer`.
pub fn map_markers(
    snapshot: &StoreSnapshot,
    viewer: &Viewer,
    context: &ProjectionContext,
) -> Vec<MapMarker> {
    visible_orders(snapshot, viewer)
        .map(|order| {
            let location = order.location();
            MapMarker {
                order_id: order.id().clone(),
                lat: location.lat(),
                lng: location.lng(),
                status: order.status(),
                popup: MarkerPopup {
                    title: order.title().to_owned(),
                    address: location.address().to_owned(),
                    status_label: context.locale().status_label(order.status()),
                },
            }
        })
        .collect()
}
