//! Driven port for the remote persistence gateway.
//!
//! The gateway owns the `service_orders` and `profiles` tables and the
//! privileged admin-action endpoint used for account lifecycle. The domain
//! store talks to nothing else.

use std::fmt;

use async_trait::async_trait;
use serde::{Serialize, Serializer};
use zeroize::Zeroizing;

use crate::domain::{
    EmailAddress, NewTechnician, ServiceOrder, ServiceOrderDraft, ServiceOrderId,
    ServiceOrderStatus, User, UserId, UserName,
};

use super::define_port_error;

define_port_error! {
    /// Errors surfaced by gateway adapters.
    pub enum GatewayError {
        /// The gateway could not be reached.
        Connection { message: String } => "gateway connection failed: {message}",
        /// The gateway did not answer in time.
        Timeout { message: String } => "gateway timed out: {message}",
        /// The gateway answered but the query or mutation failed.
        Query { message: String } => "gateway query failed: {message}",
        /// An admin action was refused; `message` is shown to the user as-is.
        Rejected { message: String } => "{message}",
        /// The response could not be decoded.
        Decode { message: String } => "gateway response decode failed: {message}",
    }
}

impl GatewayError {
    /// Whether the failure is a transport problem rather than a refusal.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }
}

fn serialize_secret<S>(secret: &Zeroizing<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(secret.as_str())
}

/// Request body for the privileged admin-action endpoint.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AdminAction {
    /// Provision a technician account.
    CreateUser {
        email: EmailAddress,
        #[serde(serialize_with = "serialize_secret")]
        password: Zeroizing<String>,
        name: UserName,
    },
    /// Delete an account by identifier.
    DeleteUser { id: UserId },
}

impl AdminAction {
    pub fn create_user(technician: &NewTechnician) -> Self {
        Self::CreateUser {
            email: technician.email().clone(),
            password: Zeroizing::new(technician.password().to_owned()),
            name: technician.name().clone(),
        }
    }

    pub fn delete_user(id: UserId) -> Self {
        Self::DeleteUser { id }
    }

    /// Action name as sent on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateUser { .. } => "create_user",
            Self::DeleteUser { .. } => "delete_user",
        }
    }
}

impl fmt::Debug for AdminAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateUser { email, name, .. } => f
                .debug_struct("CreateUser")
                .field("email", email)
                .field("password", &"<redacted>")
                .field("name", name)
                .finish(),
            Self::DeleteUser { id } => f.debug_struct("DeleteUser").field("id", id).finish(),
        }
    }
}

/// Successful admin-action response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminActionReceipt {
    /// Identifier of the affected account, when the endpoint reports one.
    pub user_id: Option<UserId>,
    /// Informational message from the endpoint.
    pub message: Option<String>,
}

/// Port for the remote table API and admin actions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DispatchGateway: Send + Sync {
    /// All service orders, newest `created_at` first.
    async fn list_service_orders(&self) -> Result<Vec<ServiceOrder>, GatewayError>;

    /// Insert an order and return the stored row.
    async fn insert_service_order(
        &self,
        draft: &ServiceOrderDraft,
        status: ServiceOrderStatus,
    ) -> Result<ServiceOrder, GatewayError>;

    /// Set the status of one order.
    async fn update_service_order_status(
        &self,
        id: &ServiceOrderId,
        status: ServiceOrderStatus,
    ) -> Result<(), GatewayError>;

    /// Set or clear the technician assigned to one order.
    async fn update_service_order_assignment(
        &self,
        id: &ServiceOrderId,
        technician_id: Option<UserId>,
    ) -> Result<(), GatewayError>;

    async fn delete_service_order(&self, id: &ServiceOrderId) -> Result<(), GatewayError>;

    /// Null `assigned_technician_id` on every order referencing
    /// `technician_id`, returning how many rows changed.
    async fn clear_technician_assignments(
        &self,
        technician_id: &UserId,
    ) -> Result<usize, GatewayError>;

    /// All user profiles.
    async fn list_profiles(&self) -> Result<Vec<User>, GatewayError>;

    /// Invoke the privileged admin-action endpoint.
    async fn invoke_admin_action(
        &self,
        action: &AdminAction,
    ) -> Result<AdminActionReceipt, GatewayError>;
}

/// Fixture gateway with no data that acknowledges every write.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureDispatchGateway;

#[async_trait]
impl DispatchGateway for FixtureDispatchGateway {
    async fn list_service_orders(&self) -> Result<Vec<ServiceOrder>, GatewayError> {
        Ok(Vec::new())
    }

    async fn insert_service_order(
        &self,
        draft: &ServiceOrderDraft,
        status: ServiceOrderStatus,
    ) -> Result<ServiceOrder, GatewayError> {
        Ok(ServiceOrder::new(
            ServiceOrderId::random(),
            draft.clone(),
            status,
            chrono::Utc::now(),
        ))
    }

    async fn update_service_order_status(
        &self,
        _id: &ServiceOrderId,
        _status: ServiceOrderStatus,
    ) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn update_service_order_assignment(
        &self,
        _id: &ServiceOrderId,
        _technician_id: Option<UserId>,
    ) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn delete_service_order(&self, _id: &ServiceOrderId) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn clear_technician_assignments(
        &self,
        _technician_id: &UserId,
    ) -> Result<usize, GatewayError> {
        Ok(0)
    }

    async fn list_profiles(&self) -> Result<Vec<User>, GatewayError> {
        Ok(Vec::new())
    }

    async fn invoke_admin_action(
        &self,
        _action: &AdminAction,
    ) -> Result<AdminActionReceipt, GatewayError> {
        Ok(AdminActionReceipt::default())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn create_user_action_serialises_with_tag() {
        let technician = NewTechnician::try_from_parts("Jane Tech", "jane@tech.com", "secret1")
            .expect("valid technician");
        let action = AdminAction::create_user(&technician);
        let value = serde_json::to_value(&action).expect("action serialises");
        assert_eq!(
            value,
            json!({
                "action": "create_user",
                "email": "jane@tech.com",
                "password": "secret1",
                "name": "Jane Tech",
            })
        );
        assert!(!format!("{action:?}").contains("secret1"));
    }

    #[rstest]
    fn delete_user_action_serialises_with_tag() {
        let action = AdminAction::delete_user(UserId::new("3").expect("valid id"));
        assert_eq!(action.name(), "delete_user");
        let value = serde_json::to_value(&action).expect("action serialises");
        assert_eq!(value, json!({"action": "delete_user", "id": "3"}));
    }

    #[rstest]
    fn rejected_errors_show_the_message_verbatim() {
        let err = GatewayError::rejected("A user with this email address has already been registered");
        assert_eq!(
            err.to_string(),
            "A user with this email address has already been registered"
        );
        assert!(!err.is_transient());
        assert!(GatewayError::timeout("slow").is_transient());
    }

    #[rstest]
    #[tokio::test]
    async fn fixture_gateway_is_empty() {
        let gateway = FixtureDispatchGateway;
        assert!(gateway.list_service_orders().await.expect("orders").is_empty());
        assert!(gateway.list_profiles().await.expect("profiles").is_empty());
        let cleared = gateway
            .clear_technician_assignments(&UserId::new("2").expect("valid id"))
            .await
            .expect("cascade");
        assert_eq!(cleared, 0);
    }
}
