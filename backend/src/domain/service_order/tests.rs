//! Tests for service orders, drafts, and the status transition table.

use super::*;
use chrono::TimeZone;
use rstest::{fixture, rstest};
use serde_json::json;

use ServiceOrderStatus::{Cancelled, Completed, InProgress, Pending};

#[fixture]
fn paulista() -> Location {
    Location::try_new(-23.5505, -46.6333, "Av. Paulista, 1000").expect("valid location")
}

#[fixture]
fn scheduled() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 13, 0, 0)
        .single()
        .expect("valid timestamp")
}

#[fixture]
fn draft(paulista: Location, scheduled: DateTime<Utc>) -> ServiceOrderDraft {
    ServiceOrderDraft::try_new(
        "Repair AC Unit",
        "Unit on floor 3 is leaking",
        scheduled,
        paulista,
        None,
    )
    .expect("valid draft")
}

#[rstest]
#[case(Pending, InProgress, true)]
#[case(Pending, Completed, false)]
#[case(Pending, Cancelled, true)]
#[case(InProgress, Pending, true)]
#[case(InProgress, Completed, true)]
#[case(InProgress, Cancelled, true)]
#[case(Completed, Pending, false)]
#[case(Completed, InProgress, true)]
#[case(Completed, Cancelled, false)]
#[case(Cancelled, Pending, true)]
#[case(Cancelled, InProgress, false)]
#[case(Cancelled, Completed, false)]
fn transition_table(
    #[case] from: ServiceOrderStatus,
    #[case] to: ServiceOrderStatus,
    #[case] allowed: bool,
) {
    assert_eq!(from.can_transition_to(to), allowed);
    let outcome = from.transition_to(to);
    if allowed {
        assert_eq!(outcome, Ok(Transition::Changed));
    } else {
        assert_eq!(outcome, Err(StatusTransitionError { from, to }));
    }
}

#[rstest]
fn same_status_is_unchanged() {
    for status in ServiceOrderStatus::ALL {
        assert_eq!(status.transition_to(status), Ok(Transition::Unchanged));
        assert!(!status.can_transition_to(status));
    }
}

#[rstest]
fn transition_error_names_both_states() {
    let err = Completed.transition_to(Pending).expect_err("illegal move");
    assert_eq!(
        err.to_string(),
        "cannot move a service order from completed to pending"
    );
}

#[rstest]
#[case("pending", Pending)]
#[case("in-progress", InProgress)]
#[case("completed", Completed)]
#[case("cancelled", Cancelled)]
fn status_parses_wire_values(#[case] raw: &str, #[case] expected: ServiceOrderStatus) {
    assert_eq!(raw.parse::<ServiceOrderStatus>(), Ok(expected));
    assert_eq!(expected.as_str(), raw);
    assert_eq!(
        serde_json::to_value(expected).expect("status serialises"),
        json!(raw)
    );
}

#[rstest]
fn status_rejects_unknown_values() {
    assert!(matches!(
        "in_progress".parse::<ServiceOrderStatus>(),
        Err(ServiceOrderValidationError::UnknownStatus { .. })
    ));
}

#[rstest]
#[case(91.0, 0.0)]
#[case(-90.5, 0.0)]
#[case(f64::NAN, 0.0)]
fn location_rejects_bad_latitude(#[case] lat: f64, #[case] lng: f64) {
    assert!(matches!(
        Location::try_new(lat, lng, "Somewhere"),
        Err(ServiceOrderValidationError::LatitudeOutOfRange { .. })
    ));
}

#[rstest]
#[case(0.0, 180.5)]
#[case(0.0, f64::INFINITY)]
fn location_rejects_bad_longitude(#[case] lat: f64, #[case] lng: f64) {
    assert!(matches!(
        Location::try_new(lat, lng, "Somewhere"),
        Err(ServiceOrderValidationError::LongitudeOutOfRange { .. })
    ));
}

#[rstest]
fn location_requires_address() {
    assert_eq!(
        Location::try_new(0.0, 0.0, "  "),
        Err(ServiceOrderValidationError::EmptyAddress)
    );
}

#[rstest]
fn draft_requires_title(paulista: Location, scheduled: DateTime<Utc>) {
    let result = ServiceOrderDraft::try_new("   ", "", scheduled, paulista, None);
    assert_eq!(result, Err(ServiceOrderValidationError::EmptyTitle));
}

#[rstest]
#[case("", None)]
#[case("   ", None)]
#[case("2", Some("2"))]
#[case(" 2 ", Some("2"))]
fn technician_reference_is_normalized(#[case] raw: &str, #[case] expected: Option<&str>) {
    let normalized = normalize_technician_id(raw).expect("normalizes");
    assert_eq!(normalized.as_ref().map(AsRef::as_ref), expected);
}

#[rstest]
fn draft_deserialisation_normalizes_empty_technician() {
    let decoded: ServiceOrderDraft = serde_json::from_value(json!({
        "title": "Install Router",
        "description": "",
        "date": "2024-03-02T10:00:00Z",
        "location": {"lat": -23.5615, "lng": -46.655, "address": "Rua Augusta, 500"},
        "assignedTechnicianId": "",
    }))
    .expect("draft deserialises");
    assert_eq!(decoded.assigned_technician_id(), None);
    assert_eq!(decoded.title(), "Install Router");
}

#[rstest]
fn order_is_built_from_draft(draft: ServiceOrderDraft, scheduled: DateTime<Utc>) {
    let id = ServiceOrderId::new("order-1").expect("valid id");
    let order = ServiceOrder::new(id.clone(), draft, Pending, scheduled);

    assert_eq!(order.id(), &id);
    assert_eq!(order.title(), "Repair AC Unit");
    assert_eq!(order.status(), Pending);
    assert_eq!(order.assigned_technician_id(), None);
    assert_eq!(order.location().address(), "Av. Paulista, 1000");
    assert_eq!(order.created_at(), scheduled);
}

#[rstest]
fn order_serialises_in_camel_case(draft: ServiceOrderDraft, scheduled: DateTime<Utc>) {
    let id = ServiceOrderId::new("order-1").expect("valid id");
    let technician = UserId::new("2").expect("valid id");
    let mut order = ServiceOrder::new(id, draft, InProgress, scheduled);
    order.set_assigned_technician_id(Some(technician.clone()));

    let value = serde_json::to_value(&order).expect("order serialises");
    assert_eq!(value["status"], json!("in-progress"));
    assert_eq!(value["assignedTechnicianId"], json!("2"));
    assert_eq!(value["location"]["address"], json!("Av. Paulista, 1000"));

    let decoded: ServiceOrder = serde_json::from_value(value).expect("order deserialises");
    assert!(decoded.is_assigned_to(&technician));
}
