//! Booking lifecycle state machine.
//!
//! The backend owns the authoritative transitions; the client mirrors them
//! from polled booking records. The one transition the client drives is
//! completion, issued by the assigned responder.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::models::booking::Booking;
use crate::models::unit::ResponderService;

/// Lifecycle states of a booking.
///
/// `Pending -> EnRoute` when the backend assigns a unit,
/// `Pending -> Cancelled` by the requester, `EnRoute -> Completed` by the
/// responder. `Completed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    EnRoute,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::EnRoute)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
                | (BookingStatus::EnRoute, BookingStatus::Completed)
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BookingStatus::Pending => "Pending",
            BookingStatus::EnRoute => "En Route",
            BookingStatus::Completed => "Completed",
            BookingStatus::Cancelled => "Cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("booking cannot move from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
}

/// Client-side mirror of one booking's lifecycle.
///
/// `observe` applies remotely-reported statuses; `complete` drives the
/// responder-initiated completion and only flips local state once the
/// backend confirms. After a successful completion the session owner must
/// stop location reporting and route tracking for this assignment.
#[derive(Debug, Clone)]
pub struct AssignmentTracker {
    booking_id: i64,
    service: ResponderService,
    status: BookingStatus,
}

impl AssignmentTracker {
    /// Track a freshly-accepted booking (initial state `Pending`).
    pub fn new(booking_id: i64, service: ResponderService) -> Self {
        Self {
            booking_id,
            service,
            status: BookingStatus::Pending,
        }
    }

    pub fn from_booking(booking: &Booking, service: ResponderService) -> Self {
        Self {
            booking_id: booking.booking_id,
            service,
            status: booking.status,
        }
    }

    pub fn booking_id(&self) -> i64 {
        self.booking_id
    }

    pub fn service(&self) -> ResponderService {
        self.service
    }

    pub fn status(&self) -> BookingStatus {
        self.status
    }

    /// Apply a status observed from a polled/fetched booking record.
    ///
    /// Re-observing the current status is a no-op. A report that would
    /// move a terminal booking, or skip a legal edge, is rejected rather
    /// than silently applied.
    pub fn observe(&mut self, remote: BookingStatus) -> Result<(), DispatchError> {
        if remote == self.status {
            return Ok(());
        }
        if !self.status.can_transition_to(remote) {
            return Err(DispatchError::InvalidTransition {
                from: self.status,
                to: remote,
            });
        }
        debug!(
            booking_id = self.booking_id,
            from = %self.status,
            to = %remote,
            "Observed booking transition"
        );
        self.status = remote;
        Ok(())
    }

    /// Issue the responder's completion action.
    ///
    /// Local state changes only on a confirmed success; on any failure the
    /// assignment stays `EnRoute` and the operator may retry (no automatic
    /// retry). Completing an already-terminal booking is an explicit
    /// rejection, never a silent state change.
    pub async fn complete(&mut self, client: &ApiClient) -> Result<()> {
        if !self.status.can_transition_to(BookingStatus::Completed) {
            return Err(DispatchError::InvalidTransition {
                from: self.status,
                to: BookingStatus::Completed,
            }
            .into());
        }

        // 0 means the id was not known client-side; the backend resolves
        // the driver's active booking itself in that case.
        let booking_id = (self.booking_id != 0).then_some(self.booking_id);
        client.complete_booking(self.service, booking_id).await?;

        self.status = BookingStatus::Completed;
        info!(booking_id = self.booking_id, "Booking marked completed");
        Ok(())
    }
}

/// Sort direction for history views. A pure toggle; flipping it twice
/// restores the original order and never touches the underlying data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl SortOrder {
    pub fn toggled(self) -> Self {
        match self {
            SortOrder::Ascending => SortOrder::Descending,
            SortOrder::Descending => SortOrder::Ascending,
        }
    }
}

/// Filtered, sorted view over a booking list for history screens.
///
/// Default presentation is newest-first by `requested_at`. Returns
/// references; the source slice is left untouched.
pub fn history_view<'a>(
    bookings: &'a [Booking],
    status: Option<BookingStatus>,
    order: SortOrder,
) -> Vec<&'a Booking> {
    let mut view: Vec<&Booking> = bookings
        .iter()
        .filter(|b| status.map_or(true, |s| b.status == s))
        .collect();

    view.sort_by(|a, b| match order {
        SortOrder::Ascending => a.requested_at.cmp(&b.requested_at),
        SortOrder::Descending => b.requested_at.cmp(&a.requested_at),
    });

    view
}
