//! Outbound collaborators: notification and payment.
//!
//! Both are fire-and-forget from the engine's point of view. A failure is
//! logged and, for payments, reported as a [`BookingEvent::PaymentFailed`]
//! notification; it never rolls back the booking mutation that triggered it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Booking, BookingId};

/// What just happened to a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingEvent {
    Created,
    Confirmed,
    Started,
    Cancelled,
    Rescheduled,
    Completed,
    PaymentFailed,
}

/// Failure reported by an outbound collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct CollaboratorError(pub String);

/// Delivers booking events to the parties (push, email, ...).
pub trait Notifier: Send + Sync {
    fn notify(&self, event: BookingEvent, booking: &Booking) -> Result<(), CollaboratorError>;
}

/// Captures payment for completed work.
pub trait PaymentGateway: Send + Sync {
    fn charge_for_booking(&self, booking_id: BookingId, amount: Decimal) -> Result<(), CollaboratorError>;
}

/// Drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _event: BookingEvent, _booking: &Booking) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// Accepts every charge without contacting anyone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPayments;

impl PaymentGateway for NoopPayments {
    fn charge_for_booking(&self, _booking_id: BookingId, _amount: Decimal) -> Result<(), CollaboratorError> {
        Ok(())
    }
}
