//! `bookings` CLI: query availability and book agents against a JSON schedule file.
//!
//! ## Usage
//!
//! ```sh
//! # Hourly slots for an agent on a date
//! bookings slots -s schedule.json --agent agent-x --date 2026-03-16
//!
//! # Same, folded into open/closed ranges at 30-minute granularity
//! bookings slots -s schedule.json --agent agent-x --date 2026-03-16 --granularity 30 --compact
//!
//! # Is 10:00-11:00 free?
//! bookings check -s schedule.json --agent agent-x --date 2026-03-16 --start 10:00 --end 11:00
//!
//! # Book it and write the updated schedule back
//! bookings book -s schedule.json --agent agent-x --client c-1 --service deck \
//!     --date 2026-03-16 --start 10:00 --end 11:00 --location "12 Elm St" -o schedule.json
//!
//! # Week view bucketed by hour
//! bookings calendar -s schedule.json --view week --date 2026-03-18
//!
//! # Merge hourly selections into ranges
//! echo '[{"start":"09:00","end":"10:00","flag":true}]' | bookings compress
//! ```
//!
//! Results go to stdout as pretty JSON; logs go to stderr (`RUST_LOG` overrides
//! the default `warn` level).

use std::io::{self, Read};
use std::sync::Arc;

use anyhow::{Context, Result};
use booking_engine::calendar::{self, CalendarView};
use booking_engine::interval::{self, Span};
use booking_engine::{
    find_conflicts, AgentId, BookingManager, BookingRequest, ClientId, ClockTime, EngineConfig,
    InMemoryStore, ScheduleData, ServiceId, SlotGenerator,
};
use chrono::{Duration, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "bookings",
    version,
    about = "Agent availability and conflict-free booking"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine configuration (JSON); defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List an agent's slots for a date
    Slots {
        /// Schedule file
        #[arg(short, long)]
        schedule: String,
        #[arg(long)]
        agent: String,
        /// Date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        /// Slot width in minutes (overrides the config)
        #[arg(long)]
        granularity: Option<u32>,
        /// Fold consecutive slots with equal availability into ranges
        #[arg(long)]
        compact: bool,
    },
    /// Check whether an interval is free right now
    Check {
        #[arg(short, long)]
        schedule: String,
        #[arg(long)]
        agent: String,
        #[arg(long)]
        date: NaiveDate,
        /// Start time (HH:MM)
        #[arg(long)]
        start: ClockTime,
        /// End time (HH:MM, 24:00 allowed)
        #[arg(long)]
        end: ClockTime,
    },
    /// Create a PENDING booking
    Book {
        #[arg(short, long)]
        schedule: String,
        #[arg(long)]
        agent: String,
        #[arg(long)]
        client: String,
        #[arg(long)]
        service: String,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        start: ClockTime,
        #[arg(long)]
        end: ClockTime,
        #[arg(long)]
        location: String,
        /// Quoted price, e.g. 150.00
        #[arg(long)]
        price: Option<Decimal>,
        #[arg(long)]
        notes: Option<String>,
        /// Write the updated schedule here (the input file is left untouched otherwise)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Bookings bucketed by date and start hour
    Calendar {
        #[arg(short, long)]
        schedule: String,
        #[arg(long, value_enum, default_value_t = ViewArg::Week)]
        view: ViewArg,
        /// Any date inside the view
        #[arg(long)]
        date: NaiveDate,
        /// Only this agent's bookings
        #[arg(long)]
        agent: Option<String>,
    },
    /// Merge flagged spans into maximal ranges
    Compress {
        /// Input file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ViewArg {
    Day,
    Week,
}

impl From<ViewArg> for CalendarView {
    fn from(view: ViewArg) -> Self {
        match view {
            ViewArg::Day => CalendarView::Day,
            ViewArg::Week => CalendarView::Week,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Slots {
            schedule,
            agent,
            date,
            granularity,
            compact,
        } => {
            let store = Arc::new(load_schedule(&schedule)?);
            let minutes = granularity.unwrap_or(config.granularity_minutes);
            let generator =
                SlotGenerator::new(store).with_granularity(Duration::minutes(i64::from(minutes)));
            let slots = generator
                .get_available_slots(&AgentId::new(agent), date)
                .context("Failed to generate slots")?;

            if compact {
                let spans: Vec<Span> = slots
                    .iter()
                    .map(|s| Span::new(s.start_time, s.end_time, s.available))
                    .collect();
                print_json(&interval::compress(&spans))?;
            } else {
                print_json(&slots)?;
            }
        }
        Commands::Check {
            schedule,
            agent,
            date,
            start,
            end,
        } => {
            let store = Arc::new(load_schedule(&schedule)?);
            let generator = SlotGenerator::from_config(store, &config);
            let available = generator
                .check_availability(&AgentId::new(agent), date, start, end)
                .context("Failed to check availability")?;
            print_json(&json!({ "available": available }))?;
        }
        Commands::Book {
            schedule,
            agent,
            client,
            service,
            date,
            start,
            end,
            location,
            price,
            notes,
            output,
        } => {
            let store = Arc::new(load_schedule(&schedule)?);
            let manager = BookingManager::new(store.clone(), config);
            let booking = manager
                .create(BookingRequest {
                    service_id: ServiceId::new(service),
                    client_id: ClientId::new(client),
                    agent_id: AgentId::new(agent),
                    date,
                    start_time: start,
                    end_time: end,
                    location,
                    price,
                    notes,
                })
                .context("Booking rejected")?;

            if let Some(path) = output {
                let updated = serde_json::to_string_pretty(&store.to_data())?;
                std::fs::write(&path, updated)
                    .with_context(|| format!("Failed to write file: {}", path))?;
                info!(path = %path, "schedule written");
            }
            print_json(&booking)?;
        }
        Commands::Calendar {
            schedule,
            view,
            date,
            agent,
        } => {
            let data = read_schedule(&schedule)?;
            let range = calendar::view_range(view.into(), date);
            let bookings: Vec<_> = data
                .bookings
                .into_iter()
                .filter(|b| agent.as_deref().is_none_or(|a| b.agent_id.as_str() == a))
                .collect();

            let cells: Vec<_> =
                calendar::bucket_by_hour(&bookings, range, config.calendar_hours.range())
                    .into_iter()
                    .map(|((day, hour), bookings)| {
                        json!({ "date": day, "hour": hour, "bookings": bookings })
                    })
                    .collect();

            print_json(&json!({
                "start": range.start,
                "end": range.end,
                "cells": cells,
            }))?;
        }
        Commands::Compress { input } => {
            let raw = read_input(input.as_deref())?;
            let mut spans: Vec<Span> =
                serde_json::from_str(&raw).context("Failed to parse spans JSON")?;
            spans.sort_by_key(|s| (s.start, s.end));
            print_json(&interval::compress(&spans))?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&str>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let raw =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))?;
    EngineConfig::from_json_str(&raw).with_context(|| format!("Invalid config: {}", path))
}

fn read_schedule(path: &str) -> Result<ScheduleData> {
    let raw =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))?;
    let data: ScheduleData = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse schedule: {}", path))?;

    for conflict in find_conflicts(&data.bookings) {
        warn!(
            agent_id = %conflict.agent_id,
            date = %conflict.date,
            booking_a = %conflict.booking_a,
            booking_b = %conflict.booking_b,
            overlap_minutes = conflict.overlap_minutes,
            "schedule file contains overlapping bookings"
        );
    }
    Ok(data)
}

fn load_schedule(path: &str) -> Result<InMemoryStore> {
    Ok(InMemoryStore::from_data(read_schedule(path)?))
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
