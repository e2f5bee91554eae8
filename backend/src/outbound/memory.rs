//! In-process dispatch gateway.
//!
//! Backs demo runs and integration tests. Behaves like the remote table API:
//! unknown ids on update and delete are silent no-ops, listings are newest
//! first, and admin actions refuse duplicate accounts with the same message
//! the hosted endpoint uses. Failures can be scripted per call.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use tracing::debug;

use crate::domain::ports::{AdminAction, AdminActionReceipt, DispatchGateway, GatewayError};
use crate::domain::{
    Location, Role, ServiceOrder, ServiceOrderDraft, ServiceOrderId, ServiceOrderStatus,
    ServiceOrderValidationError, User, UserId,
};

pub const DUPLICATE_EMAIL_MESSAGE: &str =
    "A user with this email address has already been registered";
pub const USER_NOT_FOUND_MESSAGE: &str = "User not found";

/// Gateway operations that can be scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayCall {
    ListServiceOrders,
    InsertServiceOrder,
    UpdateServiceOrderStatus,
    UpdateServiceOrderAssignment,
    DeleteServiceOrder,
    ClearTechnicianAssignments,
    ListProfiles,
    InvokeAdminAction,
}

#[derive(Default)]
struct MemoryState {
    orders: Vec<ServiceOrder>,
    profiles: Vec<User>,
    failures: HashMap<GatewayCall, VecDeque<GatewayError>>,
    calls: HashMap<GatewayCall, usize>,
}

impl MemoryState {
    fn enter(&mut self, call: GatewayCall) -> Result<(), GatewayError> {
        *self.calls.entry(call).or_default() += 1;
        match self.failures.get_mut(&call).and_then(VecDeque::pop_front) {
            Some(error) => {
                debug!(?call, %error, "scripted gateway failure");
                Err(error)
            }
            None => Ok(()),
        }
    }

    fn order_mut(&mut self, id: &ServiceOrderId) -> Option<&mut ServiceOrder> {
        self.orders.iter_mut().find(|order| order.id() == id)
    }
}

/// Gateway holding orders and profiles in memory.
pub struct InMemoryDispatchGateway {
    clock: Arc<dyn Clock>,
    state: Mutex<MemoryState>,
}

impl InMemoryDispatchGateway {
    /// Empty gateway stamping new rows with `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Gateway seeded with one admin, two technicians and two orders.
    pub fn with_demo_data(clock: Arc<dyn Clock>) -> Result<Self, GatewayError> {
        let gateway = Self::new(clock);
        let now = gateway.clock.utc();
        let users = [
            ("1", "Admin User", "admin@tech.com", Role::Admin),
            ("2", "John Tech", "john@tech.com", Role::Technician),
            ("3", "Jane Tech", "jane@tech.com", Role::Technician),
        ]
        .into_iter()
        .map(|(id, name, email, role)| User::try_from_strings(id, name, email, role))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|error| GatewayError::decode(format!("demo profile: {error}")))?;

        let demo = |error: ServiceOrderValidationError| {
            GatewayError::decode(format!("demo order: {error}"))
        };
        let orders = vec![
            demo_order(
                "os-1",
                "Repair AC Unit",
                "AC unit not cooling in server room.",
                Location::try_new(-23.5505, -46.6333, "Av. Paulista, 1000").map_err(demo)?,
                None,
                (now, now),
            )
            .map_err(demo)?,
            demo_order(
                "os-2",
                "Install Router",
                "New office setup requires high-end router.",
                Location::try_new(-23.5615, -46.6550, "Rua Augusta, 500").map_err(demo)?,
                Some("2"),
                (now + TimeDelta::days(1), now),
            )
            .map_err(demo)?,
        ];
        gateway.seed_profiles(users);
        gateway.seed_orders(orders);
        Ok(gateway)
    }

    fn lock_state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append profiles as if they had been provisioned remotely.
    pub fn seed_profiles(&self, profiles: impl IntoIterator<Item = User>) {
        self.lock_state().profiles.extend(profiles);
    }

    /// Append stored orders.
    pub fn seed_orders(&self, orders: impl IntoIterator<Item = ServiceOrder>) {
        self.lock_state().orders.extend(orders);
    }

    /// Make the next `call` fail with `error`. Queued failures fire in order.
    pub fn fail_next(&self, call: GatewayCall, error: GatewayError) {
        self.lock_state()
            .failures
            .entry(call)
            .or_default()
            .push_back(error);
    }

    /// How many times `call` has been attempted, failures included.
    pub fn calls(&self, call: GatewayCall) -> usize {
        self.lock_state().calls.get(&call).copied().unwrap_or(0)
    }

    /// Stored orders in listing order.
    pub fn orders(&self) -> Vec<ServiceOrder> {
        sorted_newest_first(&self.lock_state().orders)
    }

    pub fn profiles(&self) -> Vec<User> {
        self.lock_state().profiles.clone()
    }
}

fn demo_order(
    id: &str,
    title: &str,
    description: &str,
    location: Location,
    technician: Option<&str>,
    (date, created_at): (DateTime<Utc>, DateTime<Utc>),
) -> Result<ServiceOrder, ServiceOrderValidationError> {
    let technician = technician
        .map(UserId::new)
        .transpose()
        .map_err(ServiceOrderValidationError::InvalidTechnicianId)?;
    let draft = ServiceOrderDraft::try_new(title, description, date, location, technician)?;
    Ok(ServiceOrder::new(
        ServiceOrderId::new(id)?,
        draft,
        ServiceOrderStatus::Pending,
        created_at,
    ))
}

fn sorted_newest_first(orders: &[ServiceOrder]) -> Vec<ServiceOrder> {
    let mut sorted = orders.to_vec();
    sorted.sort_by(|left, right| right.created_at().cmp(&left.created_at()));
    sorted
}

#[async_trait]
impl DispatchGateway for InMemoryDispatchGateway {
    async fn list_service_orders(&self) -> Result<Vec<ServiceOrder>, GatewayError> {
        let mut state = self.lock_state();
        state.enter(GatewayCall::ListServiceOrders)?;
        Ok(sorted_newest_first(&state.orders))
    }

    async fn insert_service_order(
        &self,
        draft: &ServiceOrderDraft,
        status: ServiceOrderStatus,
    ) -> Result<ServiceOrder, GatewayError> {
        let mut state = self.lock_state();
        state.enter(GatewayCall::InsertServiceOrder)?;
        let order = ServiceOrder::new(
            ServiceOrderId::random(),
            draft.clone(),
            status,
            self.clock.utc(),
        );
        state.orders.insert(0, order.clone());
        Ok(order)
    }

    async fn update_service_order_status(
        &self,
        id: &ServiceOrderId,
        status: ServiceOrderStatus,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock_state();
        state.enter(GatewayCall::UpdateServiceOrderStatus)?;
        if let Some(order) = state.order_mut(id) {
            order.set_status(status);
        }
        Ok(())
    }

    async fn update_service_order_assignment(
        &self,
        id: &ServiceOrderId,
        technician_id: Option<UserId>,
    ) -> Result<(), GatewayError> {
        let mut state = self.lock_state();
        state.enter(GatewayCall::UpdateServiceOrderAssignment)?;
        if let Some(order) = state.order_mut(id) {
            order.set_assigned_technician_id(technician_id);
        }
        Ok(())
    }

    async fn delete_service_order(&self, id: &ServiceOrderId) -> Result<(), GatewayError> {
        let mut state = self.lock_state();
        state.enter(GatewayCall::DeleteServiceOrder)?;
        state.orders.retain(|order| order.id() != id);
        Ok(())
    }

    async fn clear_technician_assignments(
        &self,
        technician_id: &UserId,
    ) -> Result<usize, GatewayError> {
        let mut state = self.lock_state();
        state.enter(GatewayCall::ClearTechnicianAssignments)?;
        let mut cleared = 0;
        for order in state
            .orders
            .iter_mut()
            .filter(|order| order.is_assigned_to(technician_id))
        {
            order.set_assigned_technician_id(None);
            cleared += 1;
        }
        Ok(cleared)
    }

    async fn list_profiles(&self) -> Result<Vec<User>, GatewayError> {
        let mut state = self.lock_state();
        state.enter(GatewayCall::ListProfiles)?;
        Ok(state.profiles.clone())
    }

    async fn invoke_admin_action(
        &self,
        action: &AdminAction,
    ) -> Result<AdminActionReceipt, GatewayError> {
        let mut state = self.lock_state();
        state.enter(GatewayCall::InvokeAdminAction)?;
        match action {
            AdminAction::CreateUser { email, name, .. } => {
                if state.profiles.iter().any(|user| user.email() == email) {
                    return Err(GatewayError::rejected(DUPLICATE_EMAIL_MESSAGE));
                }
                let user = User::new(UserId::random(), name.clone(), email.clone(), Role::Technician);
                let user_id = user.id().clone();
                state.profiles.push(user);
                Ok(AdminActionReceipt {
                    user_id: Some(user_id),
                    message: Some("User created".to_owned()),
                })
            }
            AdminAction::DeleteUser { id } => {
                let before = state.profiles.len();
                state.profiles.retain(|user| user.id() != id);
                if state.profiles.len() == before {
                    return Err(GatewayError::rejected(USER_NOT_FOUND_MESSAGE));
                }
                Ok(AdminActionReceipt {
                    user_id: Some(id.clone()),
                    message: Some("User deleted".to_owned()),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::NewTechnician;
    use crate::test_support::{MutableClock, fixed_now, sample_draft, sample_users};
    use rstest::{fixture, rstest};

    #[fixture]
    fn clock() -> Arc<MutableClock> {
        Arc::new(MutableClock::new(fixed_now()))
    }

    fn order_id(raw: &str) -> ServiceOrderId {
        ServiceOrderId::new(raw).expect("valid id")
    }

    #[rstest]
    #[tokio::test]
    async fn demo_data_lists_two_pending_orders(clock: Arc<MutableClock>) {
        let gateway = InMemoryDispatchGateway::with_demo_data(clock).expect("demo data");

        let orders = gateway.list_service_orders().await.expect("listing");
        let profiles = gateway.list_profiles().await.expect("profiles");

        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].title(), "Repair AC Unit");
        assert_eq!(orders[0].assigned_technician_id(), None);
        assert_eq!(
            orders[1].assigned_technician_id(),
            Some(&UserId::new("2").expect("valid id"))
        );
        assert_eq!(orders[1].date() - orders[0].date(), TimeDelta::days(1));
        assert_eq!(profiles.len(), 3);
    }

    #[rstest]
    #[tokio::test]
    async fn inserted_orders_list_newest_first(clock: Arc<MutableClock>) {
        let gateway = InMemoryDispatchGateway::new(clock.clone());

        let first = gateway
            .insert_service_order(&sample_draft("First", None), ServiceOrderStatus::Pending)
            .await
            .expect("insert");
        clock.advance_minutes(5);
        let second = gateway
            .insert_service_order(&sample_draft("Second", None), ServiceOrderStatus::Pending)
            .await
            .expect("insert");

        let orders = gateway.list_service_orders().await.expect("listing");
        assert_eq!(orders[0].id(), second.id());
        assert_eq!(orders[1].id(), first.id());
        assert_eq!(second.created_at(), fixed_now() + TimeDelta::minutes(5));
    }

    #[rstest]
    #[tokio::test]
    async fn unknown_ids_are_silent(clock: Arc<MutableClock>) {
        let gateway = InMemoryDispatchGateway::new(clock);

        gateway
            .update_service_order_status(&order_id("ghost"), ServiceOrderStatus::Completed)
            .await
            .expect("no-op");
        gateway
            .delete_service_order(&order_id("ghost"))
            .await
            .expect("no-op");
    }

    #[rstest]
    #[tokio::test]
    async fn scripted_failures_fire_once(clock: Arc<MutableClock>) {
        let gateway = InMemoryDispatchGateway::new(clock);
        gateway.fail_next(GatewayCall::ListProfiles, GatewayError::timeout("slow"));

        let failed = gateway.list_profiles().await;
        let recovered = gateway.list_profiles().await;

        assert_eq!(failed, Err(GatewayError::timeout("slow")));
        assert!(recovered.is_ok());
        assert_eq!(gateway.calls(GatewayCall::ListProfiles), 2);
    }

    #[rstest]
    #[tokio::test]
    async fn admin_actions_manage_profiles(clock: Arc<MutableClock>) {
        let gateway = InMemoryDispatchGateway::new(clock);
        gateway.seed_profiles(sample_users());
        let duplicate =
            NewTechnician::try_from_parts("John Again", "john@tech.com", "secret1").expect("valid");
        let fresh =
            NewTechnician::try_from_parts("Maria Tech", "maria@tech.com", "secret1").expect("valid");

        let refused = gateway
            .invoke_admin_action(&AdminAction::create_user(&duplicate))
            .await
            .expect_err("duplicate email");
        let receipt = gateway
            .invoke_admin_action(&AdminAction::create_user(&fresh))
            .await
            .expect("created");
        let created = receipt.user_id.expect("receipt carries id");
        gateway
            .invoke_admin_action(&AdminAction::delete_user(created.clone()))
            .await
            .expect("deleted");
        let missing = gateway
            .invoke_admin_action(&AdminAction::delete_user(created))
            .await
            .expect_err("already gone");

        assert_eq!(refused.to_string(), DUPLICATE_EMAIL_MESSAGE);
        assert_eq!(missing.to_string(), USER_NOT_FOUND_MESSAGE);
        assert_eq!(gateway.profiles().len(), 3);
    }

    #[rstest]
    #[tokio::test]
    async fn clearing_assignments_counts_rows(clock: Arc<MutableClock>) {
        let gateway = InMemoryDispatchGateway::with_demo_data(clock).expect("demo data");
        let john = UserId::new("2").expect("valid id");

        let cleared = gateway
            .clear_technician_assignments(&john)
            .await
            .expect("cleared");

        assert_eq!(cleared, 1);
        assert!(gateway.orders().iter().all(|order| !order.is_assigned_to(&john)));
    }
}
