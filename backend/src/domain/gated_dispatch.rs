//! Role-gated command and query facade over the dispatch store.
//!
//! Each command checks the viewer's capabilities before the store is asked
//! to do anything, so a denied command never reaches the gateway. The gate
//! mirrors what the dashboard offers; the gateway's own policies stay
//! authoritative.

use std::sync::Arc;

use tracing::warn;

use super::projections::{
    CalendarEvent, MapMarker, MapViewport, OrderBoardRow, ProjectionContext, RosterCard,
    SessionProfile, calendar_events, map_markers, order_board, roster_cards, session_profile,
};
use super::{
    Capability, DispatchStore, Error, NewTechnician, ResyncReport, ServiceOrder,
    ServiceOrderDraft, ServiceOrderId, ServiceOrderStatus, TechnicianRemoval, User, UserId,
    Viewer,
};

/// Dispatch operations as seen by one signed-in viewer.
pub struct GatedDispatch {
    store: Arc<DispatchStore>,
    viewer: Viewer,
    context: ProjectionContext,
}

impl GatedDispatch {
    pub fn new(store: Arc<DispatchStore>, viewer: Viewer, context: ProjectionContext) -> Self {
        Self {
            store,
            viewer,
            context,
        }
    }

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    pub fn store(&self) -> &Arc<DispatchStore> {
        &self.store
    }

    fn check(&self, capability: Capability) -> Result<(), Error> {
        self.viewer.require(capability).map_err(|denied| {
            warn!(
                user_id = %self.viewer.id(),
                role = %self.viewer.role(),
                capability = capability.as_str(),
                "permission denied"
            );
            denied
        })
    }

    pub async fn resync(&self) -> Result<ResyncReport, Error> {
        self.store.resync().await
    }

    pub async fn add_service_order(&self, draft: ServiceOrderDraft) -> Result<ServiceOrder, Error> {
        self.check(Capability::CreateOrders)?;
        self.store.add_service_order(draft).await
    }

    /// Change an order's status; technicians may only touch their own orders.
    pub async fn update_service_order_status(
        &self,
        id: &ServiceOrderId,
        status: ServiceOrderStatus,
    ) -> Result<ServiceOrder, Error> {
        self.check(Capability::ChangeStatus)?;
        let not_assigned = self
            .store
            .snapshot()
            .find_service_order(id)
            .is_some_and(|order| !self.viewer.may_change_status(order));
        if not_assigned {
            warn!(user_id = %self.viewer.id(), order_id = %id, "status change denied");
            return Err(Error::forbidden(format!(
                "service order {id} is not assigned to you"
            )));
        }
        self.store.update_service_order_status(id, status).await
    }

    pub async fn assign_service_order(
        &self,
        order_id: &ServiceOrderId,
        technician_id: &str,
    ) -> Result<ServiceOrder, Error> {
        self.check(Capability::AssignOrders)?;
        self.store.assign_service_order(order_id, technician_id).await
    }

    pub async fn remove_service_order(&self, id: &ServiceOrderId) -> Result<ServiceOrderId, Error> {
        self.check(Capability::RemoveOrders)?;
        self.store.remove_service_order(id).await
    }

    pub async fn add_technician(&self, technician: NewTechnician) -> Result<Option<User>, Error> {
        self.check(Capability::ManageRoster)?;
        self.store.add_technician(technician).await
    }

    pub async fn remove_technician(&self, id: &UserId) -> Result<TechnicianRemoval, Error> {
        self.check(Capability::ManageRoster)?;
        self.store.remove_technician(id).await
    }

    pub fn order_board(&self) -> Vec<OrderBoardRow> {
        order_board(&self.store.snapshot(), &self.viewer, &self.context)
    }

    pub fn calendar_events(&self) -> Vec<CalendarEvent> {
        calendar_events(&self.store.snapshot(), &self.viewer, &self.context)
    }

    pub fn map_markers(&self) -> Vec<MapMarker> {
        map_markers(&self.store.snapshot(), &self.viewer, &self.context)
    }

    pub fn map_viewport(&self) -> MapViewport {
        MapViewport::default()
    }

    pub fn roster_cards(&self) -> Result<Vec<RosterCard>, Error> {
        roster_cards(&self.store.snapshot(), &self.viewer, &self.context)
    }

    pub fn session_profile(&self) -> SessionProfile {
        session_profile(&self.viewer, &self.context)
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::ErrorCode;
    use crate::domain::RoleResolver;
    use crate::domain::ports::{FixtureUserNotifier, MockDispatchGateway};
    use crate::test_support::{identity, sample_draft, sample_order, sample_users};
    use rstest::rstest;

    fn technician_viewer() -> Viewer {
        Viewer::new(identity("2", "john@tech.com"), &RoleResolver::default())
    }

    async fn gated(gateway: MockDispatchGateway, viewer: Viewer) -> GatedDispatch {
        let store = Arc::new(DispatchStore::new(
            Arc::new(gateway),
            Arc::new(FixtureUserNotifier),
        ));
        let dispatch = GatedDispatch::new(store, viewer, ProjectionContext::default());
        dispatch.resync().await.expect("resync succeeds");
        dispatch
    }

    fn seeded() -> MockDispatchGateway {
        let mut gateway = MockDispatchGateway::new();
        gateway.expect_list_profiles().returning(|| Ok(sample_users()));
        gateway.expect_list_service_orders().returning(|| {
            Ok(vec![
                sample_order("os-1", "Repair AC Unit", ServiceOrderStatus::Pending, None),
                sample_order("os-2", "Install Router", ServiceOrderStatus::Pending, Some("2")),
            ])
        });
        gateway
    }

    fn order_id(raw: &str) -> ServiceOrderId {
        ServiceOrderId::new(raw).expect("valid id")
    }

    #[rstest]
    #[tokio::test]
    async fn technician_denials_skip_the_gateway() {
        let mut gateway = seeded();
        gateway.expect_delete_service_order().times(0);
        gateway.expect_update_service_order_assignment().times(0);
        gateway.expect_insert_service_order().times(0);
        gateway.expect_invoke_admin_action().times(0);
        let dispatch = gated(gateway, technician_viewer()).await;

        let removal = dispatch.remove_service_order(&order_id("os-2")).await;
        let assignment = dispatch.assign_service_order(&order_id("os-1"), "2").await;
        let creation = dispatch
            .add_service_order(sample_draft("Replace Fuse", None))
            .await;
        let roster = dispatch
            .remove_technician(&UserId::new("3").expect("valid id"))
            .await;

        for result in [
            removal.map(|_| ()),
            assignment.map(|_| ()),
            creation.map(|_| ()),
            roster.map(|_| ()),
        ] {
            let error = result.expect_err("technicians are denied");
            assert_eq!(error.code(), ErrorCode::Forbidden);
        }
    }

    #[rstest]
    #[tokio::test]
    async fn technician_cannot_change_status_of_unassigned_order() {
        let mut gateway = seeded();
        gateway.expect_update_service_order_status().times(0);
        let dispatch = gated(gateway, technician_viewer()).await;

        let error = dispatch
            .update_service_order_status(&order_id("os-1"), ServiceOrderStatus::InProgress)
            .await
            .expect_err("order is not assigned to john");

        assert_eq!(error.code(), ErrorCode::Forbidden);
    }

    #[rstest]
    #[tokio::test]
    async fn technician_changes_status_of_own_order() {
        let mut gateway = seeded();
        gateway
            .expect_update_service_order_status()
            .times(1)
            .returning(|_, _| Ok(()));
        let dispatch = gated(gateway, technician_viewer()).await;

        let order = dispatch
            .update_service_order_status(&order_id("os-2"), ServiceOrderStatus::InProgress)
            .await
            .expect("own order may change");

        assert_eq!(order.status(), ServiceOrderStatus::InProgress);
        let rows = dispatch.order_board();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status_label, "Em Andamento");
    }

    #[rstest]
    #[tokio::test]
    async fn admin_reaches_the_store() {
        let mut gateway = seeded();
        gateway
            .expect_delete_service_order()
            .times(1)
            .returning(|_| Ok(()));
        let admin = Viewer::new(identity("1", "admin@tech.com"), &RoleResolver::default());
        let dispatch = gated(gateway, admin).await;

        dispatch
            .remove_service_order(&order_id("os-1"))
            .await
            .expect("admins may remove");

        assert_eq!(dispatch.order_board().len(), 1);
        assert_eq!(dispatch.roster_cards().expect("admin roster").len(), 2);
    }
}
