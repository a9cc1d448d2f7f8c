//! Flare responder console.
//!
//! A command-driven stand-in for the role dashboards: login, submit an
//! emergency request, list bookings, report unit positions (one-shot or
//! continuous), track a request's responding vehicles and complete the
//! active booking.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use flare_core::auth::{CredentialStore, Session};
use flare_core::cache::CacheManager;
use flare_core::dispatch::{history_view, AssignmentTracker, BookingStatus, SortOrder};
use flare_core::location::{LocationReporter, ReportEvent};
use flare_core::route::{MapboxDirections, RouteTracker, ROUTE_REFRESH_INTERVAL_SECS};
use flare_core::{ApiClient, Config, Coordinates, RequestDraft, ResponderService, VehicleKind};

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: &Path) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    std::fs::create_dir_all(log_dir).ok();
    let file_appender = tracing_appender::rolling::daily(log_dir, "flare.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .with(filter)
        .init();

    Some(guard)
}

fn print_usage() {
    eprintln!("flare - emergency dispatch responder console");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  flare login [email] [--remember]   Authenticate and store the session");
    eprintln!("  flare status                       Show the current session");
    eprintln!("  flare submit <draft.json>          Validate and submit an emergency request");
    eprintln!("  flare bookings [--status S] [--asc]");
    eprintln!("                                     List bookings for your service");
    eprintln!("  flare report <unit-id> <lat> <lon> Report a unit position once");
    eprintln!("  flare follow <unit-id>             Stream 'lat lon' lines from stdin and");
    eprintln!("                                     report automatically every 30s");
    eprintln!("  flare track <request-id> [ambulance|fire_truck|all] [--watch]");
    eprintln!("                                     Show distance/ETA for responding units");
    eprintln!("  flare complete                     Complete your active booking");
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn parse_status(value: &str) -> Result<BookingStatus> {
    match value.to_ascii_uppercase().as_str() {
        "PENDING" => Ok(BookingStatus::Pending),
        "EN_ROUTE" => Ok(BookingStatus::EnRoute),
        "COMPLETED" => Ok(BookingStatus::Completed),
        "CANCELLED" => Ok(BookingStatus::Cancelled),
        other => anyhow::bail!("unknown status '{}'", other),
    }
}

fn parse_vehicle(value: &str) -> Result<Option<VehicleKind>> {
    match value.to_ascii_lowercase().as_str() {
        "ambulance" => Ok(Some(VehicleKind::Ambulance)),
        "fire_truck" | "fire" => Ok(Some(VehicleKind::FireTruck)),
        "all" => Ok(None),
        other => anyhow::bail!("unknown vehicle kind '{}'", other),
    }
}

/// The responder service for the logged-in driver role.
fn responder_service(session: &Session) -> Result<ResponderService> {
    session
        .role()
        .and_then(|role| role.responder_service())
        .context("This command needs an ambulance or fire driver session")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let mut config = Config::load()?;
    let cache_dir = config
        .cache_dir()
        .unwrap_or_else(|_| PathBuf::from("./cache"));
    std::fs::create_dir_all(&cache_dir).ok();

    let _guard = init_tracing(&cache_dir.join("logs"));
    info!("Flare console starting");

    let mut session = Session::new(cache_dir.clone());
    let _ = session.load();

    let mut client = ApiClient::new(config.api_url())?;
    if let Some(token) = session.token() {
        client.set_token(token.to_string());
    }

    let args: Vec<String> = std::env::args().collect();
    let rest: Vec<&str> = args.iter().skip(2).map(String::as_str).collect();

    match args.get(1).map(String::as_str) {
        Some("login") => {
            let email = rest.iter().find(|a| !a.starts_with("--")).map(|s| s.to_string());
            let remember = rest.contains(&"--remember");
            cmd_login(&mut config, &client, &mut session, email, remember).await
        }
        Some("status") => cmd_status(&session),
        Some("submit") => {
            let path = rest
                .first()
                .context("usage: flare submit <draft.json>")?;
            cmd_submit(&client, path).await
        }
        Some("bookings") => cmd_bookings(&client, &session, &cache_dir, &rest).await,
        Some("report") => {
            let (unit_id, lat, lon) = match rest.as_slice() {
                [unit, lat, lon, ..] => (
                    unit.parse::<i64>().context("unit id must be a number")?,
                    lat.parse::<f64>().context("latitude must be a number")?,
                    lon.parse::<f64>().context("longitude must be a number")?,
                ),
                _ => anyhow::bail!("usage: flare report <unit-id> <lat> <lon>"),
            };
            cmd_report(&client, &session, unit_id, Coordinates::new(lat, lon)).await
        }
        Some("follow") => {
            let unit_id = rest
                .first()
                .context("usage: flare follow <unit-id>")?
                .parse::<i64>()
                .context("unit id must be a number")?;
            cmd_follow(&client, &session, unit_id).await
        }
        Some("track") => {
            let request_id = rest
                .first()
                .context("usage: flare track <request-id> [vehicle]")?
                .parse::<i64>()
                .context("request id must be a number")?;
            let vehicle = match rest.get(1).filter(|a| !a.starts_with("--")) {
                Some(value) => parse_vehicle(value)?,
                None => None,
            };
            let watch = rest.contains(&"--watch");
            cmd_track(&client, &config, request_id, vehicle, watch).await
        }
        Some("complete") => cmd_complete(&client, &session).await,
        _ => {
            print_usage();
            Ok(())
        }
    }
}

async fn cmd_login(
    config: &mut Config,
    client: &ApiClient,
    session: &mut Session,
    email: Option<String>,
    remember: bool,
) -> Result<()> {
    let email = match email.or_else(|| config.last_username.clone()) {
        Some(email) => email,
        None => prompt_line("Email: ")?,
    };

    let password = match CredentialStore::get_password(&email) {
        Ok(stored) => stored,
        Err(_) => rpassword::prompt_password("Password: ")?,
    };

    let data = client.login(&email, &password).await?;
    println!("Logged in as {} ({})", data.username, data.role);

    if remember {
        if let Err(e) = CredentialStore::store(&email, &password) {
            warn!(error = %e, "Could not store credentials in the keychain");
        }
    }

    config.last_username = Some(email);
    config.save()?;
    session.update(data);
    session.save()?;
    Ok(())
}

fn cmd_status(session: &Session) -> Result<()> {
    match &session.data {
        Some(data) if session.is_valid() => {
            println!("Logged in as {} ({})", data.username, data.role);
            println!("Session expires in {} minutes", data.minutes_until_expiry());
        }
        Some(data) => println!("Session for {} has expired. Please login again.", data.username),
        None => println!("Not logged in."),
    }
    Ok(())
}

async fn cmd_submit(client: &ApiClient, path: &str) -> Result<()> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read draft file {}", path))?;
    let draft: RequestDraft =
        serde_json::from_str(&contents).context("Draft file is not a valid request")?;

    let request = match draft.build() {
        Ok(request) => request,
        Err(errors) => {
            eprintln!("The request has validation errors:");
            for (field, message) in errors.iter() {
                eprintln!("  {}: {}", field, message);
            }
            anyhow::bail!("request not submitted");
        }
    };

    let receipt = client.submit_request(&request).await?;
    println!(
        "Emergency request submitted. Booking #{} ({})",
        receipt.booking_id, receipt.status
    );
    Ok(())
}

async fn cmd_bookings(
    client: &ApiClient,
    session: &Session,
    cache_dir: &Path,
    rest: &[&str],
) -> Result<()> {
    let service = responder_service(session)?;
    let cache = CacheManager::new(cache_dir.to_path_buf())?;

    let mut status = None;
    let mut order = SortOrder::default();
    let mut args = rest.iter();
    while let Some(arg) = args.next() {
        match *arg {
            "--status" => {
                let value = args.next().context("--status needs a value")?;
                status = Some(parse_status(value)?);
            }
            "--asc" => order = order.toggled(),
            _ => {}
        }
    }

    let (bookings, age) = match client.bookings(service).await {
        Ok(bookings) => {
            if let Err(e) = cache.save_bookings(service, &bookings) {
                warn!(error = %e, "Failed to cache bookings");
            }
            (bookings, None)
        }
        Err(e) => {
            warn!(error = %e, "Booking fetch failed, trying cache");
            match cache.load_bookings(service)? {
                Some(cached) => {
                    let age = cached.age_display();
                    (cached.data, Some(age))
                }
                None => return Err(e),
            }
        }
    };

    if let Some(age) = age {
        println!("(offline - showing data cached {})", age);
    }

    let view = history_view(&bookings, status, order);
    if view.is_empty() {
        println!("No bookings.");
        return Ok(());
    }
    for booking in view {
        println!(
            "#{:<6} {:10} {}  {}  {}",
            booking.booking_id,
            booking.status.to_string(),
            booking.requested_at.format("%Y-%m-%d %H:%M"),
            booking.pickup(),
            booking.issue_type,
        );
    }
    Ok(())
}

async fn cmd_report(
    client: &ApiClient,
    session: &Session,
    unit_id: i64,
    position: Coordinates,
) -> Result<()> {
    let service = responder_service(session)?;
    let (reporter, device, mut events) =
        LocationReporter::new(Arc::new(client.clone()), service, unit_id);

    device.update(position);
    reporter.report_now().await?;

    if let Ok(ReportEvent::Sent { coordinates, .. }) = events.try_recv() {
        println!("Location reported: {}", coordinates);
    }
    Ok(())
}

async fn cmd_follow(client: &ApiClient, session: &Session, unit_id: i64) -> Result<()> {
    let service = responder_service(session)?;
    let (mut reporter, device, mut events) =
        LocationReporter::new(Arc::new(client.clone()), service, unit_id);
    reporter.enable_automatic();
    println!("Streaming positions for unit #{unit_id}; enter '<lat> <lon>' lines, Ctrl-D to stop.");

    // Stdin is the acquisition subscription: one fix per line.
    let mut acquisition = tokio::task::spawn_blocking(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let mut parts = line.split_whitespace();
            let (Some(lat), Some(lon)) = (parts.next(), parts.next()) else {
                eprintln!("expected: <lat> <lon>");
                continue;
            };
            match (lat.parse::<f64>(), lon.parse::<f64>()) {
                (Ok(lat), Ok(lon)) => device.update(Coordinates::new(lat, lon)),
                _ => eprintln!("expected numeric: <lat> <lon>"),
            }
        }
    });

    loop {
        tokio::select! {
            maybe_event = events.recv() => match maybe_event {
                Some(ReportEvent::Sent { coordinates, .. }) => {
                    println!("reported {}", coordinates);
                }
                Some(ReportEvent::Failed { message, .. }) => {
                    eprintln!("report failed: {} (will retry on the next cycle)", message);
                }
                None => break,
            },
            _ = &mut acquisition => break,
        }
    }

    reporter.shutdown();
    println!("Position stream ended; automatic reporting stopped.");
    Ok(())
}

async fn cmd_track(
    client: &ApiClient,
    config: &Config,
    request_id: i64,
    vehicle: Option<VehicleKind>,
    watch: bool,
) -> Result<()> {
    let token = config
        .mapbox_token()
        .context("No Mapbox access token configured (set MAPBOX_ACCESS_TOKEN)")?;
    let provider = Arc::new(MapboxDirections::new(config.directions_url(), token)?);

    let snapshot = match vehicle {
        Some(vehicle) => client.location_map(vehicle, request_id).await?,
        None => client.location_map_all(request_id).await?,
    };
    let mut tracker = RouteTracker::from_snapshot(provider, &snapshot);

    loop {
        tracker.refresh().await;
        print_routes(&tracker, request_id);

        if !watch {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_secs(ROUTE_REFRESH_INTERVAL_SECS)).await;

        match vehicle {
            Some(vehicle) => match client.location_map(vehicle, request_id).await {
                Ok(snapshot) => tracker.apply_snapshot(&snapshot),
                Err(e) => warn!(error = %e, "Location refresh failed; keeping last positions"),
            },
            None => match client.location_map_all(request_id).await {
                Ok(snapshot) => tracker.apply_snapshot(&snapshot),
                Err(e) => warn!(error = %e, "Location refresh failed; keeping last positions"),
            },
        }
        // The fixed tick recomputes even when nothing moved.
        tracker.mark_all_stale();
    }
}

fn print_routes(tracker: &RouteTracker, request_id: i64) {
    println!("Emergency request #{} at {}", request_id, tracker.incident());
    for unit in tracker.routes() {
        match (&unit.estimate, &unit.error) {
            (Some(estimate), _) => println!(
                "  {} #{}: {:.1} km, ETA {:.0} min",
                unit.vehicle, unit.unit_id, estimate.distance_km, estimate.duration_min
            ),
            (None, Some(error)) => {
                println!("  {} #{}: route unavailable ({})", unit.vehicle, unit.unit_id, error)
            }
            (None, None) => println!("  {} #{}: calculating...", unit.vehicle, unit.unit_id),
        }
    }
    if let Some(summary) = tracker.summary() {
        println!(
            "  combined: {:.1} km total, {:.0} min average across {} vehicle(s)",
            summary.total_distance_km, summary.average_duration_min, summary.vehicle_count
        );
    }
    let bounds = tracker.map_bounds();
    if let (Some(sw), Some(ne)) = (bounds.south_west(), bounds.north_east()) {
        println!("  map bounds: [{}] - [{}]", sw, ne);
    }
}

async fn cmd_complete(client: &ApiClient, session: &Session) -> Result<()> {
    let service = responder_service(session)?;

    let assignment = client
        .current_assignment(service)
        .await
        .context("No active assignment to complete")?;

    let mut tracker = AssignmentTracker::new(assignment.booking_id.unwrap_or(0), service);
    // Having a current assignment means a unit was dispatched for it.
    tracker.observe(BookingStatus::EnRoute)?;
    tracker.complete(client).await?;

    println!("Booking marked as completed.");
    Ok(())
}
