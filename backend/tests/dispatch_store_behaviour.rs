//! Behavioural tests for the dispatch store against the in-memory gateway.

use std::sync::Arc;

use dispatch::domain::ports::{GatewayError, RecordingUserNotifier, StoreOperation};
use dispatch::domain::projections::{
    ProjectionContext, calendar_events, event_duration, map_markers, order_board,
};
use dispatch::domain::{
    DispatchStore, ErrorCode, GatedDispatch, NewTechnician, Role, RoleResolver, ServiceOrderId,
    ServiceOrderStatus, UserId, Viewer, resolve_role,
};
use dispatch::outbound::memory::{
    DUPLICATE_EMAIL_MESSAGE, GatewayCall, InMemoryDispatchGateway,
};
use dispatch::test_support::{
    MutableClock, fixed_now, identity, sample_draft, sample_order, sample_users,
};
use rstest::{fixture, rstest};

struct Harness {
    gateway: Arc<InMemoryDispatchGateway>,
    notifier: Arc<RecordingUserNotifier>,
    store: Arc<DispatchStore>,
}

impl Harness {
    fn viewer(&self, id: &str, email: &str) -> Viewer {
        Viewer::new(identity(id, email), &RoleResolver::default())
    }

    fn gated(&self, id: &str, email: &str) -> GatedDispatch {
        GatedDispatch::new(
            Arc::clone(&self.store),
            self.viewer(id, email),
            ProjectionContext::default(),
        )
    }
}

#[fixture]
fn harness() -> Harness {
    let clock = Arc::new(MutableClock::new(fixed_now()));
    let gateway = Arc::new(InMemoryDispatchGateway::new(clock));
    gateway.seed_profiles(sample_users());
    gateway.seed_orders([
        sample_order("os-1", "Repair AC", ServiceOrderStatus::Pending, None),
        sample_order("os-2", "Install Router", ServiceOrderStatus::Pending, Some("2")),
    ]);
    let notifier = Arc::new(RecordingUserNotifier::new());
    let store = Arc::new(DispatchStore::new(gateway.clone(), notifier.clone()));
    Harness {
        gateway,
        notifier,
        store,
    }
}

fn order_id(raw: &str) -> ServiceOrderId {
    ServiceOrderId::new(raw).expect("valid id")
}

fn user_id(raw: &str) -> UserId {
    UserId::new(raw).expect("valid id")
}

#[rstest]
#[tokio::test]
async fn added_order_appears_once_as_pending(harness: Harness) {
    harness.store.resync().await.expect("resync");
    let draft = sample_draft("Replace Fuse", Some("3"));

    let created = harness
        .store
        .add_service_order(draft.clone())
        .await
        .expect("order added");
    harness
        .store
        .fetch_service_orders()
        .await
        .expect("refetch");

    let snapshot = harness.store.snapshot();
    let matches: Vec<_> = snapshot
        .service_orders
        .iter()
        .filter(|order| order.title() == draft.title())
        .collect();
    assert_eq!(matches.len(), 1);
    let order = matches[0];
    assert_eq!(order.id(), created.id());
    assert_eq!(order.status(), ServiceOrderStatus::Pending);
    assert_eq!(order.description(), draft.description());
    assert_eq!(order.date(), draft.date());
    assert_eq!(order.location(), draft.location());
    assert_eq!(order.assigned_technician_id(), draft.assigned_technician_id());
}

#[rstest]
#[case::empty("")]
#[case::blank("   ")]
#[tokio::test]
async fn blank_assignment_clears_the_technician(harness: Harness, #[case] raw: &str) {
    harness.store.resync().await.expect("resync");

    let order = harness
        .store
        .assign_service_order(&order_id("os-2"), raw)
        .await
        .expect("unassigned");

    assert_eq!(order.assigned_technician_id(), None);
    let stored = harness
        .gateway
        .orders()
        .into_iter()
        .find(|candidate| candidate.id() == order.id())
        .expect("order stored");
    assert_eq!(stored.assigned_technician_id(), None);
}

#[rstest]
#[case::admin_substring("admin@tech.com", Role::Admin)]
#[case::support_address("suporte@maprinter.com.br", Role::Admin)]
#[case::technician("john@tech.com", Role::Technician)]
fn roles_resolve_from_email(#[case] email: &str, #[case] expected: Role) {
    assert_eq!(resolve_role(&identity("9", email)), expected);
}

#[rstest]
#[tokio::test]
async fn every_calendar_event_lasts_two_hours(harness: Harness) {
    harness.store.resync().await.expect("resync");
    let admin = harness.viewer("1", "admin@tech.com");

    let events = calendar_events(
        &harness.store.snapshot(),
        &admin,
        &ProjectionContext::default(),
    );

    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|event| event.end - event.start == event_duration()));
}

#[rstest]
#[tokio::test]
async fn technicians_only_see_their_own_orders(harness: Harness) {
    harness.store.resync().await.expect("resync");
    let context = ProjectionContext::default();
    let snapshot = harness.store.snapshot();

    for (id, email) in [("2", "john@tech.com"), ("3", "jane@tech.com")] {
        let viewer = harness.viewer(id, email);
        let own = user_id(id);
        let board = order_board(&snapshot, &viewer, &context);
        let calendar = calendar_events(&snapshot, &viewer, &context);
        let markers = map_markers(&snapshot, &viewer, &context);

        let visible = board
            .iter()
            .map(|row| &row.id)
            .chain(calendar.iter().map(|event| &event.order_id))
            .chain(markers.iter().map(|marker| &marker.order_id));
        for order in visible {
            let stored = snapshot.find_service_order(order).expect("order exists");
            assert!(stored.is_assigned_to(&own), "{email} saw {order}");
        }
    }
}

#[rstest]
#[tokio::test]
async fn removed_technician_leaves_no_assignments(harness: Harness) {
    harness.store.resync().await.expect("resync");
    let john = user_id("2");

    let removal = harness
        .store
        .remove_technician(&john)
        .await
        .expect("technician removed");

    assert_eq!(removal.orders_unassigned, 1);
    let snapshot = harness.store.snapshot();
    assert!(
        snapshot
            .service_orders
            .iter()
            .all(|order| !order.is_assigned_to(&john))
    );
    assert!(snapshot.find_user(&john).is_none());
    assert!(
        harness
            .gateway
            .orders()
            .iter()
            .all(|order| !order.is_assigned_to(&john))
    );
}

#[rstest]
#[tokio::test]
async fn failed_remote_cascade_is_reported_after_local_cleanup(harness: Harness) {
    harness.store.resync().await.expect("resync");
    harness.gateway.fail_next(
        GatewayCall::ClearTechnicianAssignments,
        GatewayError::connection("reset by peer"),
    );
    let john = user_id("2");

    let error = harness
        .store
        .remove_technician(&john)
        .await
        .expect_err("remote cascade failed");

    assert_eq!(error.code(), ErrorCode::ServiceUnavailable);
    let details = error.details().expect("cascade details");
    assert_eq!(details["ordersStillAssignedRemotely"], 1);
    assert!(
        harness
            .store
            .snapshot()
            .service_orders
            .iter()
            .all(|order| !order.is_assigned_to(&john))
    );
    let notices = harness.notifier.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].operation, StoreOperation::RemoveTechnician);
}

#[rstest]
#[tokio::test]
async fn status_change_is_visible_only_to_the_assignee(harness: Harness) {
    let admin = harness.gated("1", "admin@tech.com");
    admin.resync().await.expect("resync");
    admin
        .assign_service_order(&order_id("os-1"), "2")
        .await
        .expect("assigned to john");

    let john = harness.gated("2", "john@tech.com");
    john.update_service_order_status(&order_id("os-1"), ServiceOrderStatus::InProgress)
        .await
        .expect("john starts the job");

    let johns_row = john
        .order_board()
        .into_iter()
        .find(|row| row.title == "Repair AC")
        .expect("john sees the order");
    assert_eq!(johns_row.status, ServiceOrderStatus::InProgress);
    assert_eq!(johns_row.status_label, "Em Andamento");
    let jane = harness.gated("3", "jane@tech.com");
    assert!(jane.order_board().iter().all(|row| row.title != "Repair AC"));
    assert!(jane.calendar_events().is_empty());
}

#[rstest]
#[tokio::test]
async fn unassigned_status_change_stays_out_of_technician_views(harness: Harness) {
    let admin = harness.gated("1", "admin@tech.com");
    admin.resync().await.expect("resync");

    admin
        .update_service_order_status(&order_id("os-1"), ServiceOrderStatus::InProgress)
        .await
        .expect("admin starts the job");

    let admin_row = admin
        .order_board()
        .into_iter()
        .find(|row| row.title == "Repair AC")
        .expect("admin sees every order");
    assert_eq!(admin_row.status, ServiceOrderStatus::InProgress);
    for (id, email) in [("2", "john@tech.com"), ("3", "jane@tech.com")] {
        let technician = harness.gated(id, email);
        assert!(technician.order_board().iter().all(|row| row.title != "Repair AC"));
    }
}

#[rstest]
#[tokio::test]
async fn illegal_transition_is_a_conflict_without_gateway_call(harness: Harness) {
    harness.store.resync().await.expect("resync");

    let error = harness
        .store
        .update_service_order_status(&order_id("os-1"), ServiceOrderStatus::Completed)
        .await
        .expect_err("pending cannot complete directly");

    assert_eq!(error.code(), ErrorCode::Conflict);
    assert_eq!(
        harness.gateway.calls(GatewayCall::UpdateServiceOrderStatus),
        0
    );
}

#[rstest]
#[tokio::test]
async fn fetch_failure_keeps_the_last_good_collection(harness: Harness) {
    harness.store.resync().await.expect("resync");
    harness
        .gateway
        .fail_next(GatewayCall::ListServiceOrders, GatewayError::timeout("10s"));

    let error = harness
        .store
        .fetch_service_orders()
        .await
        .expect_err("fetch fails");

    assert_eq!(error.code(), ErrorCode::ServiceUnavailable);
    let snapshot = harness.store.snapshot();
    assert_eq!(snapshot.service_orders.len(), 2);
    assert!(!snapshot.loading);
    assert_eq!(snapshot.last_error.as_ref(), Some(&error));
}

#[rstest]
#[tokio::test]
async fn technician_commands_are_denied_before_the_gateway(harness: Harness) {
    let john = harness.gated("2", "john@tech.com");
    john.resync().await.expect("resync");

    let error = john
        .remove_service_order(&order_id("os-2"))
        .await
        .expect_err("technicians may not remove");

    assert_eq!(error.code(), ErrorCode::Forbidden);
    assert_eq!(harness.gateway.calls(GatewayCall::DeleteServiceOrder), 0);
    assert_eq!(harness.store.snapshot().service_orders.len(), 2);
}

#[rstest]
#[tokio::test]
async fn duplicate_technician_message_reaches_the_user(harness: Harness) {
    harness.store.resync().await.expect("resync");
    let duplicate =
        NewTechnician::try_from_parts("John Again", "john@tech.com", "secret1").expect("valid");

    let error = harness
        .store
        .add_technician(duplicate)
        .await
        .expect_err("duplicate email");

    assert_eq!(error.code(), ErrorCode::InvalidRequest);
    assert_eq!(error.message(), DUPLICATE_EMAIL_MESSAGE);
    assert_eq!(harness.notifier.notices()[0].message, DUPLICATE_EMAIL_MESSAGE);
}

#[rstest]
#[tokio::test]
async fn added_technician_joins_the_roster(harness: Harness) {
    let admin = harness.gated("1", "admin@tech.com");
    admin.resync().await.expect("resync");
    let maria =
        NewTechnician::try_from_parts("Maria Tech", "Maria@Tech.com", "secret1").expect("valid");

    let user = admin
        .add_technician(maria)
        .await
        .expect("provisioned")
        .expect("listed after refresh");

    assert_eq!(user.email().as_ref(), "maria@tech.com");
    assert_eq!(user.role(), Role::Technician);
    let names: Vec<_> = admin
        .roster_cards()
        .expect("admin roster")
        .into_iter()
        .map(|card| card.name)
        .collect();
    assert_eq!(names, ["John Tech", "Jane Tech", "Maria Tech"]);
}
