//! Header profile for the signed-in viewer.

use serde::Serialize;

use super::ProjectionContext;
use crate::domain::{NavigationSection, Role, Viewer};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProfile {
    pub display_name: String,
    pub initial: char,
    pub role: Role,
    pub role_label: &'static str,
    pub navigation: Vec<NavigationSection>,
}

/// Profile summary derived from the session email.
pub fn session_profile(viewer: &Viewer, context: &ProjectionContext) -> SessionProfile {
    let local_part = viewer.identity().email().local_part();
    let display_name = if local_part.is_empty() {
        "User".to_owned()
    } else {
        local_part.to_owned()
    };
    let initial = display_name
        .chars()
        .next()
        .and_then(|c| c.to_uppercase().next())
        .unwrap_or('U');
    SessionProfile {
        display_name,
        initial,
        role: viewer.role(),
        role_label: context.locale().role_label(viewer.role()),
        navigation: viewer.capabilities().navigation().to_vec(),
    }
}
