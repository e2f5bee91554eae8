//! Print dispatch projections for one identity as JSON.
//!
//! Loads `DISPATCH_*` settings, resyncs the store through the hosted gateway
//! (or the in-memory demo gateway) and renders the requested surfaces.
//!
//! # Examples
//! ```sh
//! DISPATCH_DEMO=true cargo run --manifest-path backend/Cargo.toml \
//!     --bin dispatch-snapshot -- --user-id 2 --email john@tech.com --surface board
//! ```
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::io;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use dispatch::config::DispatchSettings;
use dispatch::domain::ports::{DispatchGateway, RecordingUserNotifier};
use dispatch::domain::{
    DispatchStore, EmailAddress, GatedDispatch, Identity, Role, UserId, Viewer,
};
use dispatch::outbound::gateway::RestDispatchGateway;
use dispatch::outbound::memory::InMemoryDispatchGateway;
use mockable::DefaultClock;
use ortho_config::OrthoConfig;
use serde_json::{Map, Value, json};
use tokio::runtime::Builder;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// Surfaces the command can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Surface {
    Board,
    Calendar,
    Map,
    Roster,
    Profile,
    All,
}

/// `dispatch-snapshot` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dispatch-snapshot",
    about = "Render dispatch dashboard projections for a signed-in identity",
    version
)]
struct CliArgs {
    /// Identifier of the signed-in user.
    #[arg(long = "user-id", value_name = "id")]
    user_id: String,
    /// Email address of the signed-in user.
    #[arg(long = "email", value_name = "address")]
    email: String,
    /// Role claim carried by the session, if any.
    #[arg(long = "role-claim", value_name = "admin|technician")]
    role_claim: Option<Role>,
    #[arg(long = "surface", value_enum, default_value = "all")]
    surface: Surface,
    /// Use the in-memory demo gateway regardless of settings.
    #[arg(long = "demo")]
    demo: bool,
}

fn main() -> io::Result<()> {
    if let Err(error) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .with_writer(io::stderr)
        .try_init()
    {
        warn!(error = %error, "tracing init failed");
    }

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| io::Error::other(format!("create Tokio runtime: {error}")))?;
    runtime.block_on(async_main())
}

async fn async_main() -> io::Result<()> {
    let args = CliArgs::try_parse().map_err(io::Error::other)?;
    let settings = DispatchSettings::load_from_iter([OsString::from("dispatch-snapshot")])
        .map_err(|error| io::Error::other(format!("load settings: {error}")))?;

    let identity = build_identity(&args)?;
    let resolver = settings.role_resolver().map_err(io::Error::other)?;
    let context = settings.projection_context().map_err(io::Error::other)?;
    let gateway = build_gateway(&settings, args.demo || settings.demo)?;
    let notifier = Arc::new(RecordingUserNotifier::new());
    let store = Arc::new(DispatchStore::new(gateway, notifier.clone()));
    let viewer = Viewer::new(identity, &resolver);
    info!(user_id = %viewer.id(), role = %viewer.role(), "rendering dispatch snapshot");
    let dispatch = GatedDispatch::new(store, viewer, context);

    if let Err(error) = dispatch.resync().await {
        warn!(error = %error, "resync failed; rendering last known state");
    }

    let output = render(&dispatch, args.surface, &notifier)?;
    let text = serde_json::to_string_pretty(&output)
        .map_err(|error| io::Error::other(format!("encode snapshot: {error}")))?;
    println!("{text}");
    Ok(())
}

fn build_identity(args: &CliArgs) -> io::Result<Identity> {
    let invalid = |error: dispatch::domain::UserValidationError| {
        io::Error::new(io::ErrorKind::InvalidInput, error.to_string())
    };
    let identity = Identity::new(
        UserId::new(&args.user_id).map_err(invalid)?,
        EmailAddress::new(&args.email).map_err(invalid)?,
    );
    Ok(match args.role_claim {
        Some(role) => identity.with_role_claim(role),
        None => identity,
    })
}

fn build_gateway(settings: &DispatchSettings, demo: bool) -> io::Result<Arc<dyn DispatchGateway>> {
    if demo {
        let gateway = InMemoryDispatchGateway::with_demo_data(Arc::new(DefaultClock))
            .map_err(|error| io::Error::other(format!("seed demo gateway: {error}")))?;
        return Ok(Arc::new(gateway));
    }
    let config = settings.rest_gateway_config().map_err(io::Error::other)?;
    let gateway = RestDispatchGateway::new(config)
        .map_err(|error| io::Error::other(format!("build HTTP client: {error}")))?;
    Ok(Arc::new(gateway))
}

fn to_value(value: impl serde::Serialize) -> io::Result<Value> {
    serde_json::to_value(value)
        .map_err(|error| io::Error::other(format!("encode projection: {error}")))
}

fn render(
    dispatch: &GatedDispatch,
    surface: Surface,
    notifier: &RecordingUserNotifier,
) -> io::Result<Value> {
    let wants = |candidate: Surface| surface == Surface::All || surface == candidate;
    let mut output = Map::new();
    if wants(Surface::Profile) {
        output.insert("profile".to_owned(), to_value(dispatch.session_profile())?);
    }
    if wants(Surface::Board) {
        output.insert("board".to_owned(), to_value(dispatch.order_board())?);
    }
    if wants(Surface::Calendar) {
        output.insert("calendar".to_owned(), to_value(dispatch.calendar_events())?);
    }
    if wants(Surface::Map) {
        output.insert(
            "map".to_owned(),
            json!({
                "viewport": to_value(dispatch.map_viewport())?,
                "markers": to_value(dispatch.map_markers())?,
            }),
        );
    }
    if wants(Surface::Roster) {
        let roster = match dispatch.roster_cards() {
            Ok(cards) => to_value(cards)?,
            Err(error) if surface == Surface::All => {
                warn!(error = %error, "roster omitted");
                Value::Null
            }
            Err(error) => return Err(io::Error::new(io::ErrorKind::PermissionDenied, error.to_string())),
        };
        output.insert("roster".to_owned(), roster);
    }
    output.insert("notices".to_owned(), to_value(notifier.notices())?);
    Ok(Value::Object(output))
}
