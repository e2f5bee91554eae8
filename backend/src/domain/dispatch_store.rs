//! Canonical dispatch state and its synchronization with the gateway.
//!
//! The store owns the only copy of the user roster and the service order
//! collection. Reads come from [`DispatchStore::snapshot`]; every mutation
//! goes to the gateway first and touches local state only after the write is
//! acknowledged.
//!
//! Two guards keep concurrent traffic coherent:
//! - each fetch carries a generation token and is applied only when it is
//!   newer than the last applied token for its collection;
//! - writes to the same service order are serialized through a per-order
//!   async mutex, while writes to different orders run concurrently.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde_json::json;
use tokio::sync::{Mutex, OwnedMutexGuard, watch};
use tracing::{debug, error, info, warn};

use super::ports::{AdminAction, DispatchGateway, Notice, StoreOperation, UserNotifier};
use super::{
    Error, NewTechnician, ServiceOrder, ServiceOrderDraft, ServiceOrderId, ServiceOrderStatus,
    Transition, User, UserId, normalize_technician_id,
};

/// Read-only view of the canonical collections.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    /// Every user profile, in gateway order.
    pub users: Vec<User>,
    /// Every service order, newest `created_at` first.
    pub service_orders: Vec<ServiceOrder>,
    /// True while at least one fetch is in flight.
    pub loading: bool,
    /// Most recent remote-call failure, cleared by the next applied fetch.
    pub last_error: Option<Error>,
    /// Bumped on every canonical change.
    pub revision: u64,
}

impl StoreSnapshot {
    /// Snapshot holding the given collections; mainly for projections.
    pub fn from_collections(users: Vec<User>, service_orders: Vec<ServiceOrder>) -> Self {
        Self {
            users,
            service_orders,
            ..Self::default()
        }
    }

    /// Users eligible for assignment.
    pub fn technicians(&self) -> impl Iterator<Item = &User> {
        self.users.iter().filter(|user| user.is_technician())
    }

    /// User with `id`, admins included.
    pub fn find_user(&self, id: &UserId) -> Option<&User> {
        self.users.iter().find(|user| user.id() == id)
    }

    /// Service order with `id`.
    pub fn find_service_order(&self, id: &ServiceOrderId) -> Option<&ServiceOrder> {
        self.service_orders.iter().find(|order| order.id() == id)
    }
}

/// Snapshot plus synchronization bookkeeping, published on every change.
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    snapshot: StoreSnapshot,
    in_flight: usize,
    orders_applied: u64,
    users_applied: u64,
}

impl StoreState {
    /// Canonical collections as of this state.
    pub fn snapshot(&self) -> &StoreSnapshot {
        &self.snapshot
    }

    fn touch(&mut self) {
        self.snapshot.revision += 1;
    }
}

/// Result of a fetch that reached the gateway successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The response replaced the canonical collection.
    Applied { count: usize },
    /// A newer response had already been applied.
    Discarded { generation: u64 },
}

/// Outcome of [`DispatchStore::resync`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResyncReport {
    pub service_orders: FetchOutcome,
    pub technicians: FetchOutcome,
}

/// Receipt returned by [`DispatchStore::remove_technician`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicianRemoval {
    pub technician_id: UserId,
    /// Orders whose assignment was cleared locally.
    pub orders_unassigned: usize,
}

fn dedupe_orders(orders: Vec<ServiceOrder>) -> Vec<ServiceOrder> {
    let mut seen = HashSet::new();
    orders
        .into_iter()
        .filter(|order| seen.insert(order.id().clone()))
        .collect()
}

fn dedupe_users(users: Vec<User>) -> Vec<User> {
    let mut seen = HashSet::new();
    users
        .into_iter()
        .filter(|user| seen.insert(user.id().clone()))
        .collect()
}

/// Domain store backed by a [`DispatchGateway`].
///
/// # Examples
/// ```
/// use std::sync::Arc;
///
/// use dispatch::domain::DispatchStore;
/// use dispatch::domain::ports::{FixtureDispatchGateway, FixtureUserNotifier};
///
/// let store = DispatchStore::new(
///     Arc::new(FixtureDispatchGateway),
///     Arc::new(FixtureUserNotifier),
/// );
/// assert!(store.snapshot().service_orders.is_empty());
/// ```
pub struct DispatchStore {
    gateway: Arc<dyn DispatchGateway>,
    notifier: Arc<dyn UserNotifier>,
    state: watch::Sender<StoreState>,
    orders_issued: AtomicU64,
    users_issued: AtomicU64,
    order_locks: Mutex<HashMap<ServiceOrderId, Arc<Mutex<()>>>>,
}

impl DispatchStore {
    pub fn new(gateway: Arc<dyn DispatchGateway>, notifier: Arc<dyn UserNotifier>) -> Self {
        let (state, _) = watch::channel(StoreState::default());
        Self {
            gateway,
            notifier,
            state,
            orders_issued: AtomicU64::new(0),
            users_issued: AtomicU64::new(0),
            order_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Clone of the current canonical state.
    pub fn snapshot(&self) -> StoreSnapshot {
        self.state.borrow().snapshot.clone()
    }

    /// Receiver notified whenever the state changes.
    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.state.subscribe()
    }

    /// Replace the service order collection with the gateway's copy.
    ///
    /// On failure the previous collection is kept.
    pub async fn fetch_service_orders(&self) -> Result<FetchOutcome, Error> {
        let generation = self.orders_issued.fetch_add(1, Ordering::SeqCst) + 1;
        self.begin_fetch();
        debug!(generation, "fetching service orders");

        let orders = match self.gateway.list_service_orders().await {
            Ok(orders) => dedupe_orders(orders),
            Err(gateway_error) => {
                self.end_fetch();
                return Err(self.report(
                    StoreOperation::FetchServiceOrders,
                    Error::from(gateway_error),
                ));
            }
        };

        let count = orders.len();
        let mut applied = false;
        self.state.send_modify(|state| {
            state.in_flight = state.in_flight.saturating_sub(1);
            state.snapshot.loading = state.in_flight > 0;
            if generation > state.orders_applied {
                state.orders_applied = generation;
                state.snapshot.service_orders = orders;
                state.snapshot.last_error = None;
                state.touch();
                applied = true;
            }
        });

        if applied {
            debug!(generation, count, "applied service orders");
            Ok(FetchOutcome::Applied { count })
        } else {
            debug!(generation, "discarded stale service orders response");
            Ok(FetchOutcome::Discarded { generation })
        }
    }

    /// Replace the user roster with the gateway's profiles.
    ///
    /// On failure the previous roster is kept.
    pub async fn fetch_technicians(&self) -> Result<FetchOutcome, Error> {
        let generation = self.users_issued.fetch_add(1, Ordering::SeqCst) + 1;
        self.begin_fetch();
        debug!(generation, "fetching profiles");

        let users = match self.gateway.list_profiles().await {
            Ok(users) => dedupe_users(users),
            Err(gateway_error) => {
                self.end_fetch();
                return Err(self.report(
                    StoreOperation::FetchTechnicians,
                    Error::from(gateway_error),
                ));
            }
        };

        let count = users.len();
        let mut applied = false;
        self.state.send_modify(|state| {
            state.in_flight = state.in_flight.saturating_sub(1);
            state.snapshot.loading = state.in_flight > 0;
            if generation > state.users_applied {
                state.users_applied = generation;
                state.snapshot.users = users;
                state.snapshot.last_error = None;
                state.touch();
                applied = true;
            }
        });

        if applied {
            debug!(generation, count, "applied profiles");
            Ok(FetchOutcome::Applied { count })
        } else {
            debug!(generation, "discarded stale profiles response");
            Ok(FetchOutcome::Discarded { generation })
        }
    }

    /// Refetch both collections concurrently.
    ///
    /// Both fetches always run to completion; the first failure is returned.
    pub async fn resync(&self) -> Result<ResyncReport, Error> {
        info!("resyncing dispatch state");
        let (service_orders, technicians) =
            tokio::join!(self.fetch_service_orders(), self.fetch_technicians());
        Ok(ResyncReport {
            service_orders: service_orders?,
            technicians: technicians?,
        })
    }

    /// Schedule new work with status `pending`.
    ///
    /// The collection is refreshed from the gateway afterwards. When that
    /// refresh is discarded, fails, or misses the new row, the acknowledged
    /// insert is added locally so the order is never lost.
    pub async fn add_service_order(&self, draft: ServiceOrderDraft) -> Result<ServiceOrder, Error> {
        self.ensure_technician(draft.assigned_technician_id())?;

        let created = self
            .gateway
            .insert_service_order(&draft, ServiceOrderStatus::Pending)
            .await
            .map_err(|gateway_error| {
                self.report(StoreOperation::AddServiceOrder, Error::from(gateway_error))
            })?;
        info!(order_id = %created.id(), "service order created");

        // A failed refetch is reported on its own; the insert still succeeded.
        match self.fetch_service_orders().await {
            Ok(FetchOutcome::Applied { .. }) => {}
            Ok(FetchOutcome::Discarded { generation }) => {
                debug!(order_id = %created.id(), generation, "refetch after insert discarded");
            }
            Err(refetch_error) => {
                debug!(order_id = %created.id(), error = %refetch_error, "refetch after insert failed");
            }
        }

        Ok(self.insert_if_absent(created))
    }

    /// Move an order to `status` according to the transition table.
    ///
    /// Requesting the current status is a no-op that skips the gateway.
    pub async fn update_service_order_status(
        &self,
        id: &ServiceOrderId,
        status: ServiceOrderStatus,
    ) -> Result<ServiceOrder, Error> {
        let _guard = self.lock_order(id).await;
        let current = self.require_order(id)?;

        match current.status().transition_to(status) {
            Ok(Transition::Unchanged) => {
                debug!(order_id = %id, %status, "status unchanged");
                return Ok(current);
            }
            Ok(Transition::Changed) => {}
            Err(rejected) => {
                return Err(Error::conflict(rejected.to_string()).with_details(json!({
                    "orderId": id.as_ref(),
                    "from": rejected.from.as_str(),
                    "to": rejected.to.as_str(),
                })));
            }
        }

        self.gateway
            .update_service_order_status(id, status)
            .await
            .map_err(|gateway_error| {
                self.report(
                    StoreOperation::UpdateServiceOrderStatus,
                    Error::from(gateway_error),
                )
            })?;

        let patched = self.patch_order(id, |order| order.set_status(status));
        info!(order_id = %id, %status, "service order status updated");
        Ok(patched.unwrap_or_else(|| {
            let mut fallback = current;
            fallback.set_status(status);
            fallback
        }))
    }

    /// Assign an order from a raw form value; blank input unassigns.
    pub async fn assign_service_order(
        &self,
        order_id: &ServiceOrderId,
        technician_id: &str,
    ) -> Result<ServiceOrder, Error> {
        let technician_id = normalize_technician_id(technician_id)
            .map_err(|invalid| Error::invalid_request(invalid.to_string()))?;
        self.assign_service_order_to(order_id, technician_id).await
    }

    /// Assign an order to `technician_id`, or unassign it with `None`.
    pub async fn assign_service_order_to(
        &self,
        order_id: &ServiceOrderId,
        technician_id: Option<UserId>,
    ) -> Result<ServiceOrder, Error> {
        let _guard = self.lock_order(order_id).await;
        let current = self.require_order(order_id)?;
        self.ensure_technician(technician_id.as_ref())?;

        self.gateway
            .update_service_order_assignment(order_id, technician_id.clone())
            .await
            .map_err(|gateway_error| {
                self.report(StoreOperation::AssignServiceOrder, Error::from(gateway_error))
            })?;

        let assigned = technician_id.clone();
        let patched = self.patch_order(order_id, move |order| {
            order.set_assigned_technician_id(assigned);
        });
        match technician_id.as_ref() {
            Some(technician) => {
                info!(order_id = %order_id, technician_id = %technician, "service order assigned");
            }
            None => info!(order_id = %order_id, "service order unassigned"),
        }
        Ok(patched.unwrap_or_else(|| {
            let mut fallback = current;
            fallback.set_assigned_technician_id(technician_id);
            fallback
        }))
    }

    /// Delete an order remotely, then locally.
    pub async fn remove_service_order(&self, id: &ServiceOrderId) -> Result<ServiceOrderId, Error> {
        let guard = self.lock_order(id).await;

        self.gateway
            .delete_service_order(id)
            .await
            .map_err(|gateway_error| {
                self.report(StoreOperation::RemoveServiceOrder, Error::from(gateway_error))
            })?;

        self.state.send_modify(|state| {
            let before = state.snapshot.service_orders.len();
            state.snapshot.service_orders.retain(|order| order.id() != id);
            if state.snapshot.service_orders.len() != before {
                state.touch();
            }
            state.orders_applied = self.orders_issued.load(Ordering::SeqCst);
        });
        drop(guard);
        self.order_locks.lock().await.remove(id);

        info!(order_id = %id, "service order removed");
        Ok(id.clone())
    }

    /// Provision a technician account and refresh the roster.
    ///
    /// Returns the new user when the refreshed roster contains it.
    pub async fn add_technician(&self, technician: NewTechnician) -> Result<Option<User>, Error> {
        let action = AdminAction::create_user(&technician);
        let receipt = self
            .gateway
            .invoke_admin_action(&action)
            .await
            .map_err(|gateway_error| {
                self.report(StoreOperation::AddTechnician, Error::from(gateway_error))
            })?;
        info!(
            email = %technician.email(),
            user_id = ?receipt.user_id,
            "technician provisioned"
        );

        self.refresh_technicians("add technician").await;

        let snapshot = self.snapshot();
        let provisioned = receipt
            .user_id
            .as_ref()
            .and_then(|id| snapshot.find_user(id))
            .or_else(|| {
                snapshot
                    .users
                    .iter()
                    .find(|user| user.email() == technician.email())
            })
            .cloned();
        if provisioned.is_none() {
            warn!(email = %technician.email(), "provisioned technician missing from roster");
        }
        Ok(provisioned)
    }

    /// Delete a technician account and clear every assignment to it.
    ///
    /// The remote cascade runs first; the local cascade always follows once
    /// the account is gone, and outranks any listing issued before it. If the
    /// remote cascade fails the error carries how many orders may still
    /// reference the technician on the gateway.
    pub async fn remove_technician(&self, id: &UserId) -> Result<TechnicianRemoval, Error> {
        let is_admin = self
            .snapshot()
            .find_user(id)
            .is_some_and(|user| !user.is_technician());
        if is_admin {
            return Err(Error::invalid_request(format!(
                "user {id} is not a technician"
            )));
        }

        self.gateway
            .invoke_admin_action(&AdminAction::delete_user(id.clone()))
            .await
            .map_err(|gateway_error| {
                self.report(StoreOperation::RemoveTechnician, Error::from(gateway_error))
            })?;

        let cascade = self.gateway.clear_technician_assignments(id).await;
        let orders_unassigned = self.clear_technician_locally(id);
        info!(technician_id = %id, orders_unassigned, "technician removed");

        self.refresh_technicians("remove technician").await;

        match cascade {
            Ok(cleared) => {
                debug!(technician_id = %id, cleared, "remote assignments cleared");
                Ok(TechnicianRemoval {
                    technician_id: id.clone(),
                    orders_unassigned,
                })
            }
            Err(gateway_error) => {
                let failure = Error::from(gateway_error).with_details(json!({
                    "technicianId": id.as_ref(),
                    "ordersStillAssignedRemotely": orders_unassigned,
                }));
                Err(self.report(StoreOperation::RemoveTechnician, failure))
            }
        }
    }

    /// Drop `id` from the roster and unassign its orders.
    ///
    /// Raises both applied marks so listings already in flight cannot bring
    /// the assignments back.
    fn clear_technician_locally(&self, id: &UserId) -> usize {
        let mut orders_unassigned = 0;
        self.state.send_modify(|state| {
            for order in state
                .snapshot
                .service_orders
                .iter_mut()
                .filter(|order| order.is_assigned_to(id))
            {
                order.set_assigned_technician_id(None);
                orders_unassigned += 1;
            }
            state.snapshot.users.retain(|user| user.id() != id);
            state.orders_applied = self.orders_issued.load(Ordering::SeqCst);
            state.users_applied = self.users_issued.load(Ordering::SeqCst);
            state.touch();
        });
        orders_unassigned
    }

    /// Follow-up roster fetch after an admin action. Failures are already
    /// reported by the fetch itself.
    async fn refresh_technicians(&self, after: &'static str) {
        match self.fetch_technicians().await {
            Ok(FetchOutcome::Applied { count }) => debug!(after, count, "roster refreshed"),
            Ok(FetchOutcome::Discarded { generation }) => {
                debug!(after, generation, "roster refresh discarded");
            }
            Err(refresh_error) => debug!(after, error = %refresh_error, "roster refresh failed"),
        }
    }

    fn begin_fetch(&self) {
        self.state.send_modify(|state| {
            state.in_flight += 1;
            state.snapshot.loading = true;
        });
    }

    fn end_fetch(&self) {
        self.state.send_modify(|state| {
            state.in_flight = state.in_flight.saturating_sub(1);
            state.snapshot.loading = state.in_flight > 0;
        });
    }

    /// Log, record, and surface a remote-call failure.
    fn report(&self, operation: StoreOperation, failure: Error) -> Error {
        error!(%operation, code = ?failure.code(), error = %failure, "dispatch operation failed");
        self.state.send_modify(|state| {
            state.snapshot.last_error = Some(failure.clone());
            state.touch();
        });
        self.notifier.notify(&Notice {
            operation,
            code: failure.code(),
            message: failure.message().to_owned(),
        });
        failure
    }

    async fn lock_order(&self, id: &ServiceOrderId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.order_locks.lock().await;
            Arc::clone(locks.entry(id.clone()).or_default())
        };
        lock.lock_owned().await
    }

    fn require_order(&self, id: &ServiceOrderId) -> Result<ServiceOrder, Error> {
        self.snapshot()
            .find_service_order(id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("service order {id} not found")))
    }

    fn ensure_technician(&self, technician_id: Option<&UserId>) -> Result<(), Error> {
        let Some(technician_id) = technician_id else {
            return Ok(());
        };
        match self.snapshot().find_user(technician_id) {
            Some(user) if user.is_technician() => Ok(()),
            Some(_) => Err(Error::invalid_request(format!(
                "user {technician_id} is not a technician"
            ))),
            None => Err(Error::invalid_request(format!(
                "technician {technician_id} is not on the roster"
            ))),
        }
    }

    /// Keep an acknowledged insert in the collection, returning the canonical
    /// copy. Rows stay ordered newest `created_at` first.
    fn insert_if_absent(&self, created: ServiceOrder) -> ServiceOrder {
        let mut canonical = created;
        self.state.send_modify(|state| {
            let orders = &mut state.snapshot.service_orders;
            if let Some(existing) = orders.iter().find(|order| order.id() == canonical.id()) {
                canonical = existing.clone();
                return;
            }
            let position = orders
                .iter()
                .position(|order| order.created_at() <= canonical.created_at())
                .unwrap_or(orders.len());
            debug!(order_id = %canonical.id(), "inserted acknowledged order locally");
            orders.insert(position, canonical.clone());
            state.touch();
        });
        canonical
    }

    /// Apply an acknowledged write to one order and return the result.
    fn patch_order<F>(&self, id: &ServiceOrderId, apply: F) -> Option<ServiceOrder>
    where
        F: FnOnce(&mut ServiceOrder),
    {
        let mut patched = None;
        self.state.send_modify(|state| {
            if let Some(order) = state
                .snapshot
                .service_orders
                .iter_mut()
                .find(|order| order.id() == id)
            {
                apply(order);
                patched = Some(order.clone());
                state.touch();
            }
            state.orders_applied = self.orders_issued.load(Ordering::SeqCst);
        });
        patched
    }
}

#[cfg(test)]
#[path = "dispatch_store_tests.rs"]
mod tests;
