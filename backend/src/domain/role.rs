//! Role resolution and capability gating.
//!
//! A server-issued role claim always wins. Without one the resolver falls
//! back to the dashboard's email heuristic, which is a UI hint and never an
//! authorization boundary: the gateway stays authoritative.

use serde::Serialize;

use super::auth::Identity;
use super::error::Error;
use super::service_order::ServiceOrder;
use super::user::{EmailAddress, Role, UserId};

/// Support mailbox treated as an administrator when no claim is present.
pub const DEFAULT_SUPPORT_ADDRESS: &str = "suporte@maprinter.com.br";

/// Maps identities to roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleResolver {
    support_addresses: Vec<EmailAddress>,
}

impl Default for RoleResolver {
    fn default() -> Self {
        let support = EmailAddress::new(DEFAULT_SUPPORT_ADDRESS)
            .map(|address| vec![address])
            .unwrap_or_default();
        Self::new(support)
    }
}

impl RoleResolver {
    /// Resolver treating `support_addresses` as administrators.
    pub fn new(support_addresses: Vec<EmailAddress>) -> Self {
        Self { support_addresses }
    }

    pub fn support_addresses(&self) -> &[EmailAddress] {
        self.support_addresses.as_slice()
    }

    /// Resolve the role for `identity`.
    ///
    /// Without a claim, an address containing `admin` or matching a support
    /// address resolves to admin. Both checks run on the normalized
    /// (lower-cased) address, so `ADMIN@tech.com` is an admin too.
    ///
    /// # Examples
    /// ```
    /// use dispatch::domain::{EmailAddress, Identity, Role, RoleResolver, UserId};
    ///
    /// let resolver = RoleResolver::default();
    /// let identity = Identity::new(
    ///     UserId::new("1").unwrap(),
    ///     EmailAddress::new("admin@tech.com").unwrap(),
    /// );
    /// assert_eq!(resolver.resolve(&identity), Role::Admin);
    /// ```
    pub fn resolve(&self, identity: &Identity) -> Role {
        if let Some(claim) = identity.role_claim() {
            return claim;
        }
        let email = identity.email();
        if email.as_ref().contains("admin") || self.support_addresses.contains(email) {
            Role::Admin
        } else {
            Role::Technician
        }
    }
}

/// Resolve a role with the default support address.
pub fn resolve_role(identity: &Identity) -> Role {
    RoleResolver::default().resolve(identity)
}

/// Actions gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewAllOrders,
    CreateOrders,
    AssignOrders,
    ChangeStatus,
    RemoveOrders,
    ManageRoster,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ViewAllOrders => "view_all_orders",
            Self::CreateOrders => "create_orders",
            Self::AssignOrders => "assign_orders",
            Self::ChangeStatus => "change_status",
            Self::RemoveOrders => "remove_orders",
            Self::ManageRoster => "manage_roster",
        }
    }
}

/// Navigation entries offered to a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NavigationSection {
    Technicians,
    Orders,
    MyTasks,
    Calendar,
    Map,
}

impl NavigationSection {
    /// Route the presentation layer mounts the section under.
    pub fn path(self) -> &'static str {
        match self {
            Self::Technicians => "/dashboard",
            Self::Orders => "/orders",
            Self::MyTasks => "/my-tasks",
            Self::Calendar => "/calendar",
            Self::Map => "/map",
        }
    }
}

/// Capability set derived from a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    role: Role,
}

impl Capabilities {
    pub fn for_role(role: Role) -> Self {
        Self { role }
    }

    /// Whether the role holds `capability` in general.
    ///
    /// Technicians hold [`Capability::ChangeStatus`] only for their own
    /// orders; see [`Viewer::may_change_status`].
    pub fn allows(self, capability: Capability) -> bool {
        match self.role {
            Role::Admin => true,
            Role::Technician => capability == Capability::ChangeStatus,
        }
    }

    pub fn navigation(self) -> &'static [NavigationSection] {
        match self.role {
            Role::Admin => &[
                NavigationSection::Technicians,
                NavigationSection::Orders,
                NavigationSection::Calendar,
                NavigationSection::Map,
            ],
            Role::Technician => &[
                NavigationSection::MyTasks,
                NavigationSection::Calendar,
                NavigationSection::Map,
            ],
        }
    }
}

/// The signed-in identity together with its resolved role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    identity: Identity,
    role: Role,
}

impl Viewer {
    pub fn new(identity: Identity, resolver: &RoleResolver) -> Self {
        let role = resolver.resolve(&identity);
        Self { identity, role }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn id(&self) -> &UserId {
        self.identity.id()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::for_role(self.role)
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities().allows(capability)
    }

    /// Fail with a permission denial when `capability` is missing.
    pub fn require(&self, capability: Capability) -> Result<(), Error> {
        if self.can(capability) {
            return Ok(());
        }
        Err(Error::forbidden(format!(
            "{} may not {}",
            self.role,
            capability.as_str().replace('_', " ")
        )))
    }

    /// Whether `order` is visible on this viewer's surfaces.
    pub fn sees(&self, order: &ServiceOrder) -> bool {
        self.can(Capability::ViewAllOrders) || order.is_assigned_to(self.id())
    }

    /// Whether this viewer may change the status of `order`.
    pub fn may_change_status(&self, order: &ServiceOrder) -> bool {
        match self.role {
            Role::Admin => true,
            Role::Technician => order.is_assigned_to(self.id()),
        }
    }
}
