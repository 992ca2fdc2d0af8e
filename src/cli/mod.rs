use crate::{
    core::{
        renderer::{Tick, LOADING_TEXT},
        TripPlanner, TripRenderer, TripView,
    },
    error::TripError,
    generators::{OpenRouterGenerator, ReplayGenerator, TripGenerator},
    storage::{SqliteStore, TripId, TripStore, UserId},
    types::{context::TripContext, partial::PartialTripPlan, result::GenerationEvent},
};
use anyhow::{anyhow, bail, Context};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::{env, path::PathBuf, sync::Arc, time::Duration};
use tracing::{error, info};

const DEFAULT_DB: &str = "mood-trip.db";

fn command() -> Command {
    let user = Arg::new("user")
        .long("user")
        .value_name("USER_ID")
        .global(true)
        .help("Signed-in user (or set MOOD_TRIP_USER)");
    let db = Arg::new("db")
        .long("db")
        .value_name("PATH")
        .global(true)
        .help("SQLite database file (or set MOOD_TRIP_DB)");
    let trip_id = Arg::new("id")
        .help("Saved trip id")
        .required(true)
        .index(1);

    Command::new("mood-trip")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Plan a trip from a mood, streamed from an LLM and checked for consistency")
        .subcommand_required(true)
        .arg(user)
        .arg(db)
        .subcommand(
            Command::new("generate")
                .about("Generate a trip plan and print it as it streams")
                .arg(
                    Arg::new("mood")
                        .short('m')
                        .long("mood")
                        .value_name("MOOD")
                        .help("Mood slug, e.g. culture-explorer"),
                )
                .arg(
                    Arg::new("budget")
                        .short('b')
                        .long("budget")
                        .value_name("AMOUNT")
                        .value_parser(value_parser!(f64))
                        .help("Total budget; 0 or absent means moderate"),
                )
                .arg(
                    Arg::new("timeframe")
                        .short('t')
                        .long("timeframe")
                        .value_name("DAYS|TEXT")
                        .help("Number of days or free text such as \"long weekend\""),
                )
                .arg(
                    Arg::new("currency")
                        .short('c')
                        .long("currency")
                        .value_name("CODE")
                        .help("Currency code, e.g. EUR"),
                )
                .arg(
                    Arg::new("location")
                        .short('l')
                        .long("location")
                        .value_name("PLACE")
                        .help("Where the trip starts"),
                )
                .arg(
                    Arg::new("departure-date")
                        .short('d')
                        .long("departure-date")
                        .value_name("YYYY-MM-DD")
                        .help("Departure date"),
                )
                .arg(
                    Arg::new("model")
                        .long("model")
                        .value_name("MODEL")
                        .help("Model to request (or set MOOD_TRIP_MODEL)"),
                )
                .arg(
                    Arg::new("api-key")
                        .short('k')
                        .long("api-key")
                        .value_name("KEY")
                        .help("OpenRouter API key (or set OPENROUTER_API_KEY / OPENAI_API_KEY)"),
                )
                .arg(
                    Arg::new("base-url")
                        .short('u')
                        .long("base-url")
                        .value_name("URL")
                        .help("API base URL (or set OPENAI_BASE_URL / OPENROUTER_BASE_URL)"),
                )
                .arg(
                    Arg::new("timeout")
                        .long("timeout")
                        .value_name("SECONDS")
                        .value_parser(value_parser!(u64))
                        .help("Generation timeout in seconds (or set MOOD_TRIP_TIMEOUT_SECS)"),
                )
                .arg(
                    Arg::new("offline")
                        .long("offline")
                        .action(ArgAction::SetTrue)
                        .help("Replay the bundled sample plan instead of calling the API"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print every event as a JSON line"),
                )
                .arg(
                    Arg::new("save")
                        .long("save")
                        .action(ArgAction::SetTrue)
                        .help("Save the finished plan"),
                )
                .arg(
                    Arg::new("book")
                        .long("book")
                        .action(ArgAction::SetTrue)
                        .help("Book the finished plan"),
                ),
        )
        .subcommand(Command::new("trips").about("List saved trips, newest first"))
        .subcommand(Command::new("bookings").about("List bookings, newest first"))
        .subcommand(
            Command::new("show")
                .about("Print a saved trip")
                .arg(trip_id.clone()),
        )
        .subcommand(
            Command::new("book")
                .about("Book a saved trip")
                .arg(trip_id.clone()),
        )
        .subcommand(
            Command::new("delete-trip")
                .about("Delete a saved trip")
                .arg(trip_id),
        )
}

/// CLI entry point for the mood-trip tool
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let matches = command().get_matches();
    match matches.subcommand() {
        Some(("generate", sub)) => generate(&matches, sub).await,
        Some(("trips", _)) => list_trips(&matches).await,
        Some(("bookings", _)) => list_bookings(&matches).await,
        Some(("show", sub)) => show_trip(&matches, sub).await,
        Some(("book", sub)) => book_trip(&matches, sub).await,
        Some(("delete-trip", sub)) => delete_trip(&matches, sub).await,
        _ => bail!("unknown command"),
    }
}

fn user(matches: &ArgMatches) -> Option<UserId> {
    matches
        .get_one::<String>("user")
        .cloned()
        .or_else(|| env::var("MOOD_TRIP_USER").ok())
        .filter(|user| !user.trim().is_empty())
        .map(UserId::new)
}

fn required_user(matches: &ArgMatches) -> anyhow::Result<UserId> {
    user(matches).ok_or_else(|| anyhow!("a user is required. Use --user or set MOOD_TRIP_USER"))
}

fn open_store(matches: &ArgMatches) -> anyhow::Result<SqliteStore> {
    let path = matches
        .get_one::<String>("db")
        .cloned()
        .or_else(|| env::var("MOOD_TRIP_DB").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB));
    SqliteStore::open(&path).with_context(|| format!("opening trip store at {}", path.display()))
}

fn context_from(sub: &ArgMatches) -> TripContext {
    let mut context = TripContext::new();
    if let Some(mood) = sub.get_one::<String>("mood") {
        context = context.with_mood(mood);
    }
    if let Some(budget) = sub.get_one::<f64>("budget") {
        context = context.with_budget(*budget);
    }
    if let Some(timeframe) = sub.get_one::<String>("timeframe") {
        context = match timeframe.trim().parse::<f64>() {
            Ok(days) => context.with_timeframe_days(days),
            Err(_) => context.with_timeframe_text(timeframe),
        };
    }
    if let Some(currency) = sub.get_one::<String>("currency") {
        context = context.with_currency(currency);
    }
    if let Some(location) = sub.get_one::<String>("location") {
        context = context.with_location(location);
    }
    if let Some(date) = sub.get_one::<String>("departure-date") {
        context = context.with_departure_date(date);
    }
    context
}

fn generator_from(sub: &ArgMatches) -> anyhow::Result<Arc<dyn TripGenerator>> {
    if sub.get_flag("offline") {
        return Ok(Arc::new(
            ReplayGenerator::sample().with_delay(Duration::from_millis(15)),
        ));
    }

    let mut generator = match sub.get_one::<String>("api-key") {
        Some(key) => OpenRouterGenerator::new(key.clone())?,
        None => OpenRouterGenerator::from_env()?,
    };
    if let Some(model) = sub.get_one::<String>("model") {
        generator = generator.with_model(model);
    }
    if let Some(base_url) = sub.get_one::<String>("base-url") {
        generator = generator.with_base_url(base_url);
    }
    info!("Using model: {}", generator.model());
    info!("Base URL: {}", generator.base_url());
    Ok(Arc::new(generator))
}

async fn generate(matches: &ArgMatches, sub: &ArgMatches) -> anyhow::Result<()> {
    let mut planner = TripPlanner::with_shared_generator(generator_from(sub)?)?;
    let timeout = sub.get_one::<u64>("timeout").copied().or_else(|| {
        env::var("MOOD_TRIP_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.parse().ok())
    });
    if let Some(seconds) = timeout {
        planner = planner.with_timeout(Duration::from_secs(seconds));
    }

    let context = context_from(sub);
    let planner = Arc::new(planner);
    let mut renderer = TripRenderer::new(planner.clone(), context.clone());

    let outcome = if sub.get_flag("json") {
        stream_json(&planner, &context, &mut renderer).await?
    } else {
        stream_view(&mut renderer).await?
    };
    if outcome == Tick::Failed {
        let message = renderer
            .failure()
            .map(|err| err.to_string())
            .unwrap_or_else(|| "generation failed".to_string());
        error!("Trip generation failed: {}", message);
        bail!(message);
    }

    let wants_save = sub.get_flag("save");
    let wants_book = sub.get_flag("book");
    let persisted = if wants_save || wants_book {
        let store = open_store(matches)?;
        persist(
            &mut renderer,
            &store,
            user(matches).as_ref(),
            wants_save,
            wants_book,
        )
        .await
    } else {
        Ok(())
    };

    for notice in renderer.take_notices() {
        eprintln!("{notice}");
    }
    persisted
}

/// Run the requested save and booking, attempting both; the first failure is returned.
async fn persist(
    renderer: &mut TripRenderer,
    store: &dyn TripStore,
    user: Option<&UserId>,
    save: bool,
    book: bool,
) -> anyhow::Result<()> {
    let mut failure = None;
    if save {
        match renderer.save(store, user).await {
            Ok(id) => info!("Saved trip {}", id),
            Err(err) => failure = Some(anyhow::Error::new(err).context("saving trip")),
        }
    }
    if book {
        match renderer.book(store, user).await {
            Ok(id) => info!("Created booking {}", id),
            Err(err) => {
                failure.get_or_insert_with(|| anyhow::Error::new(err).context("booking trip"));
            }
        }
    }
    failure.map_or(Ok(()), Err)
}

/// Drive the planner directly and print each event on the wire format.
async fn stream_json(
    planner: &TripPlanner,
    context: &TripContext,
    renderer: &mut TripRenderer,
) -> anyhow::Result<Tick> {
    let mut stream = planner.generate(context);
    let mut outcome = Tick::Idle;
    while let Some(event) = stream.recv().await {
        println!("{}", serde_json::to_string(&event.to_wire())?);
        let terminal = event.is_terminal();
        outcome = renderer.apply(event);
        if terminal {
            break;
        }
    }
    if outcome == Tick::Idle || outcome == Tick::Partial {
        outcome = renderer.apply(GenerationEvent::Failed(TripError::Stream(
            "generation ended without a result".to_string(),
        )));
    }
    Ok(outcome)
}

async fn stream_view(renderer: &mut TripRenderer) -> anyhow::Result<Tick> {
    renderer.start();
    eprintln!("{LOADING_TEXT}...");

    let mut days_seen = 0;
    loop {
        match renderer.next_tick().await {
            Tick::Partial => {
                let days = renderer.partial().day_count();
                if days > days_seen {
                    days_seen = days;
                    let title = renderer.partial().title.as_deref().unwrap_or("...");
                    eprintln!("  {title}: {days} day(s) planned");
                }
            }
            terminal => {
                print!("{}", renderer.view());
                return Ok(terminal);
            }
        }
    }
}

async fn list_trips(matches: &ArgMatches) -> anyhow::Result<()> {
    let user = required_user(matches)?;
    let store = open_store(matches)?;
    let trips = store.list_trips(&user).await.context("listing trips")?;
    if trips.is_empty() {
        println!("No saved trips.");
    }
    for trip in trips {
        println!(
            "{}  {}  {} ({})  {}  {}  [{}]",
            trip.id,
            trip.created_at.format("%Y-%m-%d %H:%M"),
            trip.title,
            trip.destination,
            trip.mood,
            trip.budget,
            trip.status
        );
    }
    Ok(())
}

async fn list_bookings(matches: &ArgMatches) -> anyhow::Result<()> {
    let user = required_user(matches)?;
    let store = open_store(matches)?;
    let bookings = store.list_bookings(&user).await.context("listing bookings")?;
    if bookings.is_empty() {
        println!("No bookings.");
    }
    for booking in bookings {
        println!(
            "{}  {}  {} ({})  {}  {}  [{}]  trip: {}",
            booking.id,
            booking.created_at.format("%Y-%m-%d %H:%M"),
            booking.title,
            booking.destination,
            booking.budget,
            booking.status,
            booking.plan_status,
            booking.trip_id.as_ref().map_or("-", TripId::as_str)
        );
    }
    Ok(())
}

fn trip_id(sub: &ArgMatches) -> anyhow::Result<TripId> {
    sub.get_one::<String>("id")
        .map(TripId::new)
        .ok_or_else(|| anyhow!("a trip id is required"))
}

async fn show_trip(matches: &ArgMatches, sub: &ArgMatches) -> anyhow::Result<()> {
    let user = required_user(matches)?;
    let store = open_store(matches)?;
    let id = trip_id(sub)?;
    let stored = store
        .get_trip(&user, &id)
        .await
        .with_context(|| format!("loading trip {id}"))?;
    let view = TripView::from_partial(&PartialTripPlan::from_value(&serde_json::to_value(
        &stored.plan,
    )?));
    println!(
        "[{}] saved {}",
        stored.summary.status,
        stored.summary.created_at.format("%Y-%m-%d %H:%M")
    );
    print!("{view}");
    Ok(())
}

async fn book_trip(matches: &ArgMatches, sub: &ArgMatches) -> anyhow::Result<()> {
    let user = required_user(matches)?;
    let store = open_store(matches)?;
    let id = trip_id(sub)?;
    let booking = store
        .book_saved_trip(&user, &id)
        .await
        .with_context(|| format!("booking trip {id}"))?;
    println!("Booked trip {id} as {booking}");
    Ok(())
}

async fn delete_trip(matches: &ArgMatches, sub: &ArgMatches) -> anyhow::Result<()> {
    let user = required_user(matches)?;
    let store = open_store(matches)?;
    let id = trip_id(sub)?;
    store
        .delete_trip(&user, &id)
        .await
        .with_context(|| format!("deleting trip {id}"))?;
    println!("Deleted trip {id}");
    Ok(())
}
