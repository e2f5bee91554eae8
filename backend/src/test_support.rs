//! Test utilities for the dispatch crate.
//!
//! Shared by unit tests (in `src/`) and integration tests (in `tests/`). Only
//! compiled for tests or with the `test-support` feature.

mod clock;

pub use clock::MutableClock;

use chrono::{DateTime, TimeZone, Utc};

use crate::domain::{
    EmailAddress, Identity, Location, Role, ServiceOrder, ServiceOrderDraft, ServiceOrderId,
    ServiceOrderStatus, User, UserId,
};

/// Reference instant used by fixtures: 2024-03-01T12:00:00Z.
pub fn fixed_now() -> DateTime<Utc> {
    match Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).single() {
        Some(now) => now,
        None => panic!("fixture timestamp"),
    }
}

pub fn admin_user() -> User {
    User::from_strings("1", "Admin User", "admin@tech.com", Role::Admin)
}

pub fn john() -> User {
    User::from_strings("2", "John Tech", "john@tech.com", Role::Technician)
}

pub fn jane() -> User {
    User::from_strings("3", "Jane Tech", "jane@tech.com", Role::Technician)
}

/// Admin plus the two technicians.
pub fn sample_users() -> Vec<User> {
    vec![admin_user(), john(), jane()]
}

fn user_id(raw: &str) -> UserId {
    match UserId::new(raw) {
        Ok(id) => id,
        Err(error) => panic!("fixture user id '{raw}': {error}"),
    }
}

/// Identity as the session provider would hand it over.
pub fn identity(id: &str, email: &str) -> Identity {
    match EmailAddress::new(email) {
        Ok(email) => Identity::new(user_id(id), email),
        Err(error) => panic!("fixture email '{email}': {error}"),
    }
}

pub fn sample_location() -> Location {
    match Location::try_new(-23.5505, -46.6333, "Av. Paulista, 1000") {
        Ok(location) => location,
        Err(error) => panic!("fixture location: {error}"),
    }
}

/// Draft scheduled at [`fixed_now`].
pub fn sample_draft(title: &str, assigned: Option<&str>) -> ServiceOrderDraft {
    match ServiceOrderDraft::try_new(
        title,
        format!("{title} on site"),
        fixed_now(),
        sample_location(),
        assigned.map(user_id),
    ) {
        Ok(draft) => draft,
        Err(error) => panic!("fixture draft '{title}': {error}"),
    }
}

/// Stored order built from [`sample_draft`].
pub fn sample_order(
    id: &str,
    title: &str,
    status: ServiceOrderStatus,
    assigned: Option<&str>,
) -> ServiceOrder {
    let order_id = match ServiceOrderId::new(id) {
        Ok(order_id) => order_id,
        Err(error) => panic!("fixture order id '{id}': {error}"),
    };
    ServiceOrder::new(order_id, sample_draft(title, assigned), status, fixed_now())
}
