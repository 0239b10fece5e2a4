//! Wardrobe CLI - drive the wardrobe-sync caches from a terminal.
//!
//! Commands sign in, list items and events, show the weekly outfit plan,
//! watch the item collection under polling, and bulk-upload images.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wardrobe_core::auth::{AuthSession, Credentials, KeyValueStore, KeyringStore};
use wardrobe_core::cache::{age_display, week_start};
use wardrobe_core::models::ImageSource;
use wardrobe_core::sync::UploadStatus;
use wardrobe_core::{ApiClient, Config, WardrobeApi, WardrobeSession};

const USAGE: &str = "\
Usage: wardrobe <command>

Commands:
  signin [email]        Sign in and store the session in the keychain
  signout               Sign out and forget the stored session
  items                 List every wardrobe item
  events                List upcoming events
  schedule [YYYY-MM-DD] Show the outfit plan for the week containing the date
  watch                 Poll the item collection and print changes
  upload <image>...     Add up to 10 images as new items";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

/// Everything a command needs: the token session plus the cache service.
struct Cli {
    config: Config,
    auth: AuthSession,
    session: WardrobeSession,
    invalidated: Arc<AtomicBool>,
}

impl Cli {
    fn build() -> Result<Self> {
        let config = Config::load()?;
        let store: Arc<dyn KeyValueStore> = Arc::new(KeyringStore);

        let invalidated = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&invalidated);
        let mut api = ApiClient::new(&config)?;
        api.set_on_unauthorized(Arc::new(move || flag.store(true, Ordering::SeqCst)));

        let auth = AuthSession::new(api.clone(), Arc::clone(&store));
        let session = WardrobeSession::new(Arc::new(api) as Arc<dyn WardrobeApi>, store, &config);
        Ok(Self {
            config,
            auth,
            session,
            invalidated,
        })
    }

    fn require_auth(&self) -> Result<()> {
        if !self.auth.restore()? {
            bail!("Not signed in. Run `wardrobe signin` first.");
        }
        Ok(())
    }

    /// Drop the stored session if the server rejected our token.
    fn check_invalidated(&self) -> Result<()> {
        if self.invalidated.load(Ordering::SeqCst) {
            self.auth.invalidate()?;
            self.session.clear();
            bail!("Session expired. Run `wardrobe signin` again.");
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };

    let mut ctx = Cli::build()?;
    let result = match command.as_str() {
        "signin" => sign_in(&mut ctx, args.get(1).cloned()).await,
        "signout" => sign_out(&ctx).await,
        "items" => list_items(&ctx).await,
        "events" => list_events(&ctx).await,
        "schedule" => show_schedule(&ctx, args.get(1).map(String::as_str)).await,
        "watch" => watch_items(&ctx).await,
        "upload" => upload(&ctx, &args[1..]).await,
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => bail!("Unknown command: {}\n\n{}", other, USAGE),
    };

    ctx.check_invalidated()?;
    result
}

async fn sign_in(ctx: &mut Cli, email: Option<String>) -> Result<()> {
    let email = match email.or_else(|| ctx.config.last_email.clone()) {
        Some(email) => email,
        None => {
            eprint!("Email: ");
            let mut line = String::new();
            io::stdin().read_line(&mut line)?;
            line.trim().to_string()
        }
    };
    let password = rpassword::prompt_password("Password: ").context("Failed to read password")?;

    let user = ctx
        .auth
        .sign_in(&Credentials {
            email: email.clone(),
            password,
        })
        .await?;

    ctx.config.last_email = Some(email);
    ctx.config.save()?;
    println!("Signed in as {}", user.email);
    Ok(())
}

async fn sign_out(ctx: &Cli) -> Result<()> {
    ctx.auth.restore()?;
    ctx.auth.sign_out().await?;
    ctx.session.clear();
    println!("Signed out");
    Ok(())
}

async fn list_items(ctx: &Cli) -> Result<()> {
    ctx.require_auth()?;
    let pages = ctx.session.item_pages();
    pages.refresh().await?;
    while pages.has_more() {
        pages.load_more().await?;
    }

    let snapshot = ctx.session.items().read();
    if snapshot.is_empty() {
        println!("No items yet");
        return Ok(());
    }
    for item in snapshot.records.iter() {
        let color = item.color.as_deref().unwrap_or("-");
        println!("{:<24} {:<12} {:<10} {}", item.name, item.category.as_str(), color, item.id);
    }
    println!("{} items", snapshot.len());
    Ok(())
}

async fn list_events(ctx: &Cli) -> Result<()> {
    ctx.require_auth()?;
    let events = ctx.session.events();
    events.refresh(ctx.session.event_source().as_ref()).await?;

    let snapshot = events.read();
    if snapshot.is_empty() {
        println!("No events");
    }
    for event in snapshot.records.iter() {
        println!("{}  {:<28} {}", event.formatted_date(), event.name, event.dress_code);
    }
    Ok(())
}

async fn show_schedule(ctx: &Cli, date: Option<&str>) -> Result<()> {
    ctx.require_auth()?;
    let day = match date {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .with_context(|| format!("Invalid date: {}", raw))?,
        None => Local::now().date_naive(),
    };
    let start = week_start(day, 0);

    let Some(schedule) = ctx.session.schedules().fetch(start).await? else {
        println!("No schedule for the week of {}", start);
        return Ok(());
    };

    println!(
        "Week of {} in {} (generated {})",
        schedule.start_date,
        schedule.location,
        age_display(schedule.generated_at, chrono::Utc::now())
    );
    for day in &schedule.schedule {
        let names: Vec<&str> = [&day.top, &day.bottom, &day.shoes, &day.outer_layer]
            .into_iter()
            .flatten()
            .map(|i| i.name.as_str())
            .chain(day.accessories.iter().map(|i| i.name.as_str()))
            .collect();
        println!(
            "{} {:<9} {:>3.0}-{:<3.0} {:<16} {}",
            day.date,
            day.day_name,
            day.weather.temp_min,
            day.weather.temp_max,
            day.weather.description,
            if names.is_empty() {
                "-".to_string()
            } else {
                names.join(", ")
            }
        );
    }
    Ok(())
}

async fn watch_items(ctx: &Cli) -> Result<()> {
    ctx.require_auth()?;
    let poller = ctx.session.item_poller();
    poller.manual_refresh().await?;
    println!(
        "{} items, polling every {}s",
        ctx.session.items().read().len(),
        ctx.config.poll_interval_secs
    );

    let mut changes = ctx.session.items().changes();
    let mut status = poller.watch_status();
    ctx.session.start_polling();
    info!("Watching item collection");

    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = ctx.session.items().read();
                println!("revision {}: {} items", snapshot.revision, snapshot.len());
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = status.borrow_and_update().clone();
                if let Some(message) = current.error {
                    eprintln!("{}", message);
                    break;
                }
            }
        }
        if ctx.invalidated.load(Ordering::SeqCst) {
            break;
        }
    }

    ctx.session.stop_polling();
    Ok(())
}

async fn upload(ctx: &Cli, paths: &[String]) -> Result<()> {
    ctx.require_auth()?;
    if paths.is_empty() {
        bail!("No images given\n\n{}", USAGE);
    }

    let uploads = ctx.session.uploads();
    uploads.initialize_queue(paths.iter().map(ImageSource::from_path).collect())?;
    let mut counts = uploads.start_uploads().await;

    for entry in uploads.queue() {
        match entry.status {
            UploadStatus::Success => println!("ok    {}", entry.image.file_name),
            _ => println!(
                "fail  {}: {}",
                entry.image.file_name,
                entry.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }

    if counts.failed > 0 {
        println!("Retrying {} failed upload(s)", counts.failed);
        counts = uploads.retry_failed().await;
    }
    println!("{}/{} uploaded", counts.succeeded, counts.total);
    ctx.session.refresh_hub().request_refresh().await;
    Ok(())
}
