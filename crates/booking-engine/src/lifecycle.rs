//! Booking lifecycle: creation and state transitions.
//!
//! ```text
//!            create
//!              |
//!              v
//!   +------ PENDING ------ confirm ------> CONFIRMED ---- start ----> IN_PROGRESS
//!   |          ^  \                        /  ^   \                      |
//!   |          |   +---- reschedule ------+   |    cancel             complete
//!   |          |          (RESCHEDULED)       |      |                   |
//!   |          +------------------------------+      v                   v
//!   +--------------------- cancel ----------> CANCELLED              COMPLETED
//! ```
//!
//! Every write goes through [`ScheduleStore::put_booking_if`]. Creation and
//! rescheduling check "no overlapping active booking for this agent and date"
//! inside that call; status changes compare the stored version, so two
//! concurrent transitions of one booking cannot both land.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::{ClockTime, DateRange};
use crate::config::{EngineConfig, ReschedulePolicy};
use crate::conflict;
use crate::error::{Result, ScheduleError};
use crate::model::{
    validate_interval, Actor, AgentId, Booking, BookingId, BookingRequest, BookingStatus, ClientId,
    Reschedule, RescheduleRecord, SeriesLink,
};
use crate::notify::{BookingEvent, NoopNotifier, NoopPayments, Notifier, PaymentGateway};
use crate::recurrence::{self, Recurrence, SeriesFailure, SeriesOutcome};
use crate::slots::{self, SlotGenerator};
use crate::store::{ScheduleStore, WriteContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Confirm,
    Start,
    Cancel,
    Reschedule,
    Complete,
}

impl Action {
    fn verb(self) -> &'static str {
        match self {
            Action::Confirm => "confirm",
            Action::Start => "start",
            Action::Cancel => "cancel",
            Action::Reschedule => "reschedule",
            Action::Complete => "complete",
        }
    }

    fn event(self) -> BookingEvent {
        match self {
            Action::Confirm => BookingEvent::Confirmed,
            Action::Start => BookingEvent::Started,
            Action::Cancel => BookingEvent::Cancelled,
            Action::Reschedule => BookingEvent::Rescheduled,
            Action::Complete => BookingEvent::Completed,
        }
    }

    /// Actions reserved for the agent doing the work.
    fn agent_only(self) -> bool {
        matches!(self, Action::Confirm | Action::Start | Action::Complete)
    }
}

/// Creates bookings and drives them through the state table.
#[derive(Clone)]
pub struct BookingManager {
    store: Arc<dyn ScheduleStore>,
    notifier: Arc<dyn Notifier>,
    payments: Arc<dyn PaymentGateway>,
    config: EngineConfig,
}

impl BookingManager {
    /// A manager with no-op notification and payment collaborators.
    pub fn new(store: Arc<dyn ScheduleStore>, config: EngineConfig) -> Self {
        BookingManager {
            store,
            notifier: Arc::new(NoopNotifier),
            payments: Arc::new(NoopPayments),
            config,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_payments(mut self, payments: Arc<dyn PaymentGateway>) -> Self {
        self.payments = payments;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Slot generator over the same store at the granularity `create` and
    /// `reschedule` validate against.
    pub fn slot_generator(&self) -> SlotGenerator {
        SlotGenerator::from_config(self.store.clone(), &self.config)
    }

    /// # Errors
    /// `NotFound` for an unknown id.
    pub fn get(&self, id: BookingId) -> Result<Booking> {
        self.store
            .booking(id)?
            .ok_or_else(|| ScheduleError::NotFound(format!("booking {}", id)))
    }

    pub fn bookings_for_agent(&self, agent_id: &AgentId, range: DateRange) -> Result<Vec<Booking>> {
        self.store.bookings_for_agent(agent_id, range)
    }

    pub fn bookings_for_client(&self, client_id: &ClientId, range: DateRange) -> Result<Vec<Booking>> {
        self.store.bookings_for_client(client_id, range)
    }

    /// Create a PENDING booking.
    ///
    /// # Errors
    /// - `Validation` for an empty/inverted interval, blank location or
    ///   negative price.
    /// - `Unavailable` if the interval is outside the agent's weekly pattern
    ///   or inside one of their exceptions.
    /// - `Conflict` if an active booking of the agent overlaps at commit time.
    ///   Nothing is written.
    pub fn create(&self, request: BookingRequest) -> Result<Booking> {
        self.create_linked(request, None)
    }

    /// Create one booking per date of a recurring series.
    ///
    /// Each occurrence is committed on its own; conflicting or unavailable
    /// dates are reported in [`SeriesOutcome::failed`] and the rest are kept.
    pub fn create_series(
        &self,
        request: BookingRequest,
        recurrence: Recurrence,
        occurrences: u32,
    ) -> Result<SeriesOutcome> {
        request.validate()?;
        if occurrences > self.config.max_series_occurrences {
            return Err(ScheduleError::Validation(format!(
                "a series may have at most {} occurrences, got {}",
                self.config.max_series_occurrences, occurrences
            )));
        }

        let dates = recurrence::series_dates(recurrence, request.date, occurrences, &self.config.timezone)?;
        let series_id = Uuid::new_v4();
        let mut outcome = SeriesOutcome {
            series_id,
            created: Vec::new(),
            failed: Vec::new(),
        };

        for (index, date) in dates.into_iter().enumerate() {
            let sequence = index as u32 + 1;
            let occurrence = BookingRequest {
                date,
                ..request.clone()
            };
            match self.create_linked(occurrence, Some(SeriesLink { series_id, sequence })) {
                Ok(booking) => outcome.created.push(booking),
                Err(error) => {
                    warn!(%series_id, %date, sequence, %error, "series occurrence not booked");
                    outcome.failed.push(SeriesFailure {
                        date,
                        sequence,
                        error,
                    });
                }
            }
        }

        info!(
            %series_id,
            created = outcome.created.len(),
            failed = outcome.failed.len(),
            "series created"
        );
        Ok(outcome)
    }

    /// PENDING → CONFIRMED. Agent only.
    pub fn confirm(&self, id: BookingId, actor: &Actor) -> Result<Booking> {
        self.transition(id, actor, Action::Confirm, |_| {})
    }

    /// CONFIRMED → IN_PROGRESS. Agent only.
    pub fn start(&self, id: BookingId, actor: &Actor) -> Result<Booking> {
        self.transition(id, actor, Action::Start, |_| {})
    }

    /// PENDING or CONFIRMED → CANCELLED, releasing the booked time.
    ///
    /// Cancelling an already cancelled booking is a `State` error so callers
    /// can detect double submission.
    pub fn cancel(&self, id: BookingId, actor: &Actor, reason: &str) -> Result<Booking> {
        let reason = reason.trim().to_string();
        self.transition(id, actor, Action::Cancel, |booking| {
            booking.cancellation_reason = Some(reason);
        })
    }

    /// IN_PROGRESS → COMPLETED (also CONFIRMED → COMPLETED when
    /// `allow_complete_from_confirmed` is set). Agent only.
    ///
    /// Charges `final_price`, or the quoted price when none is given. A failed
    /// charge is logged and notified as [`BookingEvent::PaymentFailed`]; the
    /// booking stays COMPLETED.
    pub fn complete(&self, id: BookingId, actor: &Actor, final_price: Option<Decimal>) -> Result<Booking> {
        if let Some(price) = final_price {
            if price.is_sign_negative() {
                return Err(ScheduleError::Validation(format!(
                    "final price must not be negative: {}",
                    price
                )));
            }
        }

        let booking = self.transition(id, actor, Action::Complete, |booking| {
            if final_price.is_some() {
                booking.final_price = final_price;
            }
        })?;
        self.collect_payment(&booking);
        Ok(booking)
    }

    /// Move a PENDING or CONFIRMED booking to a new date and time.
    ///
    /// The booking's own current interval does not block the move. The
    /// previous placement is kept in [`Booking::reschedules`]. The resulting
    /// status follows [`ReschedulePolicy`].
    ///
    /// # Errors
    /// `Validation`, `Unauthorized`, `State`, `Unavailable` or `Conflict`; on
    /// any error the stored booking is unchanged.
    pub fn reschedule(&self, id: BookingId, actor: &Actor, change: Reschedule) -> Result<Booking> {
        let (start, end) = (change.new_start_time, change.new_end_time);
        validate_interval(start, end)?;

        let current = self.get(id)?;
        authorize(actor, &current, Action::Reschedule)?;
        let landing = self
            .allowed_target(Action::Reschedule, current.status)
            .ok_or(ScheduleError::State {
                from: current.status,
                action: Action::Reschedule.verb(),
            })?;
        self.ensure_offered(&current.agent_id, change.new_date, start, end)?;

        let now = Utc::now();
        let mut next = current.clone();
        next.reschedules.push(RescheduleRecord {
            previous_date: current.date,
            previous_start_time: current.start_time,
            previous_end_time: current.end_time,
            new_date: change.new_date,
            new_start_time: start,
            new_end_time: end,
            reason: change.reason,
            at: now,
        });
        next.date = change.new_date;
        next.start_time = start;
        next.end_time = end;
        next.record_transition(BookingStatus::Rescheduled, now);
        next.record_transition(landing, now);
        next.version = current.version + 1;

        self.commit(&next, current.version, Action::Reschedule, &|ctx: &WriteContext<'_>| {
            reject_overlap(ctx, start, end)
        })?;

        info!(
            booking_id = %id,
            from_date = %current.date,
            to_date = %next.date,
            start = %start,
            end = %end,
            status = %next.status,
            "booking rescheduled"
        );
        self.emit(BookingEvent::Rescheduled, &next);
        Ok(next)
    }

    fn create_linked(&self, request: BookingRequest, series: Option<SeriesLink>) -> Result<Booking> {
        request.validate()?;
        self.ensure_offered(&request.agent_id, request.date, request.start_time, request.end_time)?;

        let mut booking = Booking::from_request(request, Utc::now());
        booking.series = series;
        let (start, end) = (booking.start_time, booking.end_time);

        self.store
            .put_booking_if(booking.clone(), &|ctx: &WriteContext<'_>| {
                if ctx.existing.is_some() {
                    return Err(ScheduleError::Conflict(format!(
                        "booking {} already exists",
                        booking.id
                    )));
                }
                reject_overlap(ctx, start, end)
            })
            .inspect_err(|error| debug!(agent_id = %booking.agent_id, %error, "booking rejected"))?;

        info!(
            booking_id = %booking.id,
            agent_id = %booking.agent_id,
            client_id = %booking.client_id,
            date = %booking.date,
            start = %start,
            end = %end,
            "booking created"
        );
        self.emit(BookingEvent::Created, &booking);
        Ok(booking)
    }

    /// Apply a plain status transition (everything except reschedule).
    fn transition(
        &self,
        id: BookingId,
        actor: &Actor,
        action: Action,
        apply: impl FnOnce(&mut Booking),
    ) -> Result<Booking> {
        let current = self.get(id)?;
        authorize(actor, &current, action)?;
        let target = self
            .allowed_target(action, current.status)
            .ok_or(ScheduleError::State {
                from: current.status,
                action: action.verb(),
            })?;

        let mut next = current.clone();
        apply(&mut next);
        next.record_transition(target, Utc::now());
        next.version = current.version + 1;

        self.commit(&next, current.version, action, &|_: &WriteContext<'_>| Ok(()))?;

        info!(
            booking_id = %id,
            from = %current.status,
            to = %target,
            actor = %actor,
            "booking {}",
            action.verb()
        );
        self.emit(action.event(), &next);
        Ok(next)
    }

    /// Where `action` takes a booking currently in `from`, if anywhere.
    fn allowed_target(&self, action: Action, from: BookingStatus) -> Option<BookingStatus> {
        let target = match action {
            Action::Confirm => BookingStatus::Confirmed,
            Action::Start => BookingStatus::InProgress,
            Action::Cancel => BookingStatus::Cancelled,
            Action::Complete => BookingStatus::Completed,
            Action::Reschedule => {
                if !from.can_transition_to(BookingStatus::Rescheduled) {
                    return None;
                }
                return Some(match self.config.reschedule_policy {
                    ReschedulePolicy::RequireReconfirmation => BookingStatus::Pending,
                    ReschedulePolicy::KeepStatus => from,
                });
            }
        };

        let skip_start = action == Action::Complete
            && from == BookingStatus::Confirmed
            && self.config.allow_complete_from_confirmed;

        (from.can_transition_to(target) || skip_start).then_some(target)
    }

    /// Conditional write of an existing booking: lands only if nobody else
    /// wrote it since it was read at `expected_version` and `extra` accepts.
    fn commit(
        &self,
        next: &Booking,
        expected_version: u64,
        action: Action,
        extra: &dyn Fn(&WriteContext<'_>) -> Result<()>,
    ) -> Result<()> {
        self.store
            .put_booking_if(next.clone(), &|ctx: &WriteContext<'_>| {
                let stored = ctx
                    .existing
                    .ok_or_else(|| ScheduleError::NotFound(format!("booking {}", next.id)))?;
                if stored.version != expected_version {
                    if self.allowed_target(action, stored.status).is_none() {
                        return Err(ScheduleError::State {
                            from: stored.status,
                            action: action.verb(),
                        });
                    }
                    return Err(ScheduleError::Conflict(format!(
                        "booking {} was modified concurrently",
                        next.id
                    )));
                }
                extra(ctx)
            })
            .inspect_err(|error| {
                debug!(booking_id = %next.id, action = action.verb(), %error, "write rejected")
            })
    }

    /// Fail with `Unavailable` unless the agent offers all of `[start, end)`
    /// on `date` (weekly pattern minus exceptions).
    fn ensure_offered(
        &self,
        agent_id: &AgentId,
        date: chrono::NaiveDate,
        start: ClockTime,
        end: ClockTime,
    ) -> Result<()> {
        let snapshot = self.store.day_snapshot(agent_id, date)?;
        let spans = slots::base_spans(&snapshot, self.config.granularity())?;
        if !slots::interval_is_open(&spans, start, end) {
            return Err(ScheduleError::Unavailable(format!(
                "agent {} does not offer {}-{} on {}",
                agent_id, start, end, date
            )));
        }
        Ok(())
    }

    fn emit(&self, event: BookingEvent, booking: &Booking) {
        if let Err(error) = self.notifier.notify(event, booking) {
            warn!(booking_id = %booking.id, ?event, %error, "notification failed");
        }
    }

    fn collect_payment(&self, booking: &Booking) {
        let Some(amount) = booking.final_price.or(booking.price) else {
            debug!(booking_id = %booking.id, "no price on completed booking, nothing to charge");
            return;
        };

        match self.payments.charge_for_booking(booking.id, amount) {
            Ok(()) => info!(booking_id = %booking.id, %amount, "payment captured"),
            Err(error) => {
                warn!(booking_id = %booking.id, %amount, %error, "payment failed, booking stays completed");
                self.emit(BookingEvent::PaymentFailed, booking);
            }
        }
    }
}

fn reject_overlap(ctx: &WriteContext<'_>, start: ClockTime, end: ClockTime) -> Result<()> {
    match conflict::first_overlap(start, end, ctx.same_day.iter().copied()) {
        Some(other) => Err(ScheduleError::Conflict(format!(
            "{}-{} overlaps booking {} ({}-{}) on {}",
            start, end, other.id, other.start_time, other.end_time, other.date
        ))),
        None => Ok(()),
    }
}

fn authorize(actor: &Actor, booking: &Booking, action: Action) -> Result<()> {
    match actor {
        Actor::System => Ok(()),
        Actor::Agent(agent_id) if agent_id == &booking.agent_id => Ok(()),
        Actor::Client(client_id) if client_id == &booking.client_id => {
            if action.agent_only() {
                return Err(ScheduleError::Unauthorized(format!(
                    "only the agent may {} booking {}",
                    action.verb(),
                    booking.id
                )));
            }
            Ok(())
        }
        _ => Err(ScheduleError::Unauthorized(format!(
            "{} is not a party to booking {}",
            actor, booking.id
        ))),
    }
}
