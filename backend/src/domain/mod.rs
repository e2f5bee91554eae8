//! Domain primitives, the dispatch store, and its ports.
//!
//! Purpose: define the strongly typed dispatch entities, the canonical store
//! that keeps them in sync with the remote gateway, and the role rules and
//! projections layered over it. Nothing here knows about HTTP; adapters live
//! in [`crate::outbound`].
//!
//! Public surface:
//! - [`User`], [`ServiceOrder`] and their validated value types.
//! - [`DispatchStore`]: canonical collections plus fetch and mutation
//!   operations.
//! - [`RoleResolver`], [`Viewer`], [`Capabilities`]: role-derived gating.
//! - [`GatedDispatch`]: the store behind the viewer's capability checks.
//! - [`projections`]: pure view models for the dashboard surfaces.
//! - [`Error`], [`ErrorCode`]: transport-agnostic failures.

pub mod auth;
pub mod dispatch_store;
pub mod error;
pub mod gated_dispatch;
pub mod localization;
pub mod ports;
pub mod projections;
pub mod role;
pub mod service_order;
pub mod user;

pub use self::auth::{
    CredentialValidationError, Identity, MIN_PASSWORD_LENGTH, NewTechnician, Session,
    validate_password_change,
};
pub use self::dispatch_store::{
    DispatchStore, FetchOutcome, ResyncReport, StoreSnapshot, StoreState, TechnicianRemoval,
};
pub use self::error::{Error, ErrorCode};
pub use self::gated_dispatch::GatedDispatch;
pub use self::localization::{Locale, UnsupportedLocale};
pub use self::role::{
    Capabilities, Capability, DEFAULT_SUPPORT_ADDRESS, NavigationSection, RoleResolver, Viewer,
    resolve_role,
};
pub use self::service_order::{
    Location, ServiceOrder, ServiceOrderDraft, ServiceOrderId, ServiceOrderStatus,
    ServiceOrderValidationError, StatusTransitionError, Transition, normalize_technician_id,
};
pub use self::user::{EmailAddress, Role, User, UserId, UserName, UserValidationError};
