//! Display copy for the dispatch surfaces.
//!
//! The dashboard ships in Brazilian Portuguese; English is kept for operators
//! and tests. Labels are plain `&'static str` so projections stay
//! allocation-light.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

use super::service_order::ServiceOrderStatus;
use super::user::Role;

/// Supported display locales.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    #[serde(rename = "pt-BR")]
    PtBr,
    #[serde(rename = "en")]
    En,
}

/// Returned when a locale code is not supported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedLocale {
    pub code: String,
}

impl fmt::Display for UnsupportedLocale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "locale '{}' is not supported (use pt-BR or en)", self.code)
    }
}

impl std::error::Error for UnsupportedLocale {}

impl Locale {
    pub fn code(self) -> &'static str {
        match self {
            Self::PtBr => "pt-BR",
            Self::En => "en",
        }
    }

    /// Localized label for an order status.
    pub fn status_label(self, status: ServiceOrderStatus) -> &'static str {
        use ServiceOrderStatus::{Cancelled, Completed, InProgress, Pending};
        match (self, status) {
            (Self::PtBr, Pending) => "Pendente",
            (Self::PtBr, InProgress) => "Em Andamento",
            (Self::PtBr, Completed) => "Concluído",
            (Self::PtBr, Cancelled) => "Cancelado",
            (Self::En, Pending) => "Pending",
            (Self::En, InProgress) => "In Progress",
            (Self::En, Completed) => "Completed",
            (Self::En, Cancelled) => "Cancelled",
        }
    }

    /// Localized label for a user role.
    pub fn role_label(self, role: Role) -> &'static str {
        match (self, role) {
            (Self::PtBr, Role::Admin) => "Administrador",
            (Self::PtBr, Role::Technician) => "Técnico",
            (Self::En, Role::Admin) => "Administrator",
            (Self::En, Role::Technician) => "Technician",
        }
    }

    /// Badge shown on roster cards.
    pub fn active_label(self) -> &'static str {
        match self {
            Self::PtBr => "Ativo",
            Self::En => "Active",
        }
    }

    /// Label for orders without a technician.
    pub fn unassigned_label(self) -> &'static str {
        match self {
            Self::PtBr => "Não atribuído",
            Self::En => "Unassigned",
        }
    }

    /// Render a schedule as `dd/MM/yyyy <connector> HH:mm`.
    ///
    /// # Examples
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use dispatch::domain::Locale;
    ///
    /// let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 5, 0).unwrap();
    /// assert_eq!(Locale::PtBr.format_schedule(&at), "01/03/2024 às 09:05");
    /// ```
    pub fn format_schedule<Tz>(self, at: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let connector = match self {
            Self::PtBr => "às",
            Self::En => "at",
        };
        format!("{} {connector} {}", at.format("%d/%m/%Y"), at.format("%H:%M"))
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Locale {
    type Err = UnsupportedLocale;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pt-br" | "pt_br" | "pt" => Ok(Self::PtBr),
            "en" | "en-us" | "en-gb" => Ok(Self::En),
            _ => Err(UnsupportedLocale {
                code: value.to_owned(),
            }),
        }
    }
}
