//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod dispatch_gateway;
mod user_notifier;

#[cfg(test)]
pub use dispatch_gateway::MockDispatchGateway;
pub use dispatch_gateway::{
    AdminAction, AdminActionReceipt, DispatchGateway, FixtureDispatchGateway, GatewayError,
};
#[cfg(test)]
pub use user_notifier::MockUserNotifier;
pub use user_notifier::{
    FixtureUserNotifier, Notice, RecordingUserNotifier, StoreOperation, UserNotifier,
};
