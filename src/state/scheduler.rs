//! Timer ownership for one room: at most one scheduled callback is pending at
//! any instant, and every callback carries the identity of the round it was
//! armed for.

use std::time::Duration;

use tokio::{sync::mpsc, task::JoinHandle, time::sleep};
use tracing::debug;

use crate::state::{actor::RoomCommand, room::RoomId};

/// What a timer does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// End of the informational countdown: open the round.
    Countdown,
    /// End of the active window without a winner.
    RoundTimeout,
    /// End of the pause after a resolved round.
    Intermission,
}

/// Identity of one armed timer, delivered back to the room when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTicket {
    /// Unique (per room) timer identifier.
    pub id: u64,
    /// Action to run.
    pub kind: TimerKind,
    /// Round number the timer was armed for.
    pub round: usize,
}

struct PendingTimer {
    ticket: TimerTicket,
    task: JoinHandle<()>,
}

/// Owns the single pending timer of a room.
pub struct RoundScheduler {
    room_id: RoomId,
    commands: mpsc::WeakSender<RoomCommand>,
    pending: Option<PendingTimer>,
    next_id: u64,
}

impl RoundScheduler {
    /// The scheduler only holds a weak sender so timers never keep a closed room alive.
    pub fn new(room_id: RoomId, commands: mpsc::WeakSender<RoomCommand>) -> Self {
        Self {
            room_id,
            commands,
            pending: None,
            next_id: 0,
        }
    }

    /// Ticket of the pending timer, if any.
    pub fn pending(&self) -> Option<TimerTicket> {
        self.pending.as_ref().map(|pending| pending.ticket)
    }

    /// Arm a timer, replacing (and cancelling) any pending one.
    pub fn arm(&mut self, kind: TimerKind, round: usize, delay: Duration) -> TimerTicket {
        self.cancel();

        self.next_id += 1;
        let ticket = TimerTicket {
            id: self.next_id,
            kind,
            round,
        };

        let commands = self.commands.clone();
        let task = tokio::spawn(async move {
            sleep(delay).await;
            if let Some(sender) = commands.upgrade() {
                let _ = sender.send(RoomCommand::TimerFired(ticket)).await;
            }
        });

        debug!(room_id = %self.room_id, ?ticket, ?delay, "timer armed");
        self.pending = Some(PendingTimer { ticket, task });
        ticket
    }

    /// Cancel the pending timer. A delivery already queued is filtered out by
    /// [`RoundScheduler::take_fired`].
    pub fn cancel(&mut self) -> Option<TimerTicket> {
        let pending = self.pending.take()?;
        pending.task.abort();
        debug!(room_id = %self.room_id, ticket = ?pending.ticket, "timer cancelled");
        Some(pending.ticket)
    }

    /// Accept a fired ticket only if it is the pending one, clearing it.
    pub fn take_fired(&mut self, ticket: TimerTicket) -> bool {
        match &self.pending {
            Some(pending) if pending.ticket == ticket => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }
}

impl Drop for RoundScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
