//! Command correlator: pending server→device commands and their waiters.
//!
//! Every server-originated command gets a MessageID from a rolling 16-bit
//! counter that skips zero and any id still pending, so an id uniquely
//! names one in-flight command. (Early firmware integrations pinned every
//! command to id 1; the devices reject overlapping commands under that
//! scheme, which is exactly what this allocator exists to prevent.)
//!
//! Resolution matches on `(PhysicalID, MessageID, Command)`; late,
//! duplicate or mismatched responses are ignored. Expiry is swept by the
//! driver tick, and closing a session cancels everything tracked on it.

use std::{collections::HashMap, ops::Sub, time::Duration};

use bytes::Bytes;
use tokio::sync::oneshot;

use dny_proto::PhysicalId;

/// Terminal state of a tracked command.
#[derive(Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The device answered; raw response payload attached.
    Response(Bytes),
    /// The deadline passed with no matching response.
    Timeout,
    /// The session closed or the command was explicitly cancelled.
    Cancelled,
}

/// One in-flight command.
#[derive(Debug)]
struct Pending<I> {
    physical_id: PhysicalId,
    session_id: u64,
    command: u8,
    deadline: I,
    waiter: oneshot::Sender<CommandOutcome>,
}

/// Table of in-flight server→device commands.
#[derive(Debug)]
pub struct CommandCorrelator<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    pending: HashMap<u16, Pending<I>>,
    next_id: u16,
}

impl<I> Default for CommandCorrelator<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<I> CommandCorrelator<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Create an empty correlator.
    #[must_use]
    pub fn new() -> Self {
        Self { pending: HashMap::new(), next_id: 0 }
    }

    /// Allocate a MessageID: in `[1, 65535]`, roughly monotonic with
    /// wraparound, never colliding with a pending command.
    ///
    /// `None` only when all 65535 ids are pending.
    #[must_use]
    pub fn allocate(&mut self) -> Option<u16> {
        if self.pending.len() >= usize::from(u16::MAX) {
            return None;
        }
        loop {
            self.next_id = self.next_id.wrapping_add(1);
            if self.next_id == 0 {
                continue;
            }
            if !self.pending.contains_key(&self.next_id) {
                return Some(self.next_id);
            }
        }
    }

    /// Register a pending command and hand back its waiter.
    pub fn track(
        &mut self,
        message_id: u16,
        physical_id: PhysicalId,
        session_id: u64,
        command: u8,
        deadline: I,
    ) -> oneshot::Receiver<CommandOutcome> {
        let (tx, rx) = oneshot::channel();
        let entry = Pending { physical_id, session_id, command, deadline, waiter: tx };
        if let Some(stale) = self.pending.insert(message_id, entry) {
            // Allocation prevents this; a caller tracking a foreign id
            // displaces the stale waiter as cancelled.
            let _ = stale.waiter.send(CommandOutcome::Cancelled);
        }
        rx
    }

    /// Complete the waiter for a matching device response.
    ///
    /// Returns `true` when a pending command was resolved. Responses with
    /// no matching entry - late, duplicated, or from the wrong device -
    /// are ignored.
    pub fn resolve(
        &mut self,
        physical_id: PhysicalId,
        message_id: u16,
        command: u8,
        payload: Bytes,
    ) -> bool {
        let matches = self
            .pending
            .get(&message_id)
            .is_some_and(|p| p.physical_id == physical_id && p.command == command);
        if !matches {
            return false;
        }

        if let Some(entry) = self.pending.remove(&message_id) {
            let _ = entry.waiter.send(CommandOutcome::Response(payload));
        }
        true
    }

    /// Cancel one pending command.
    pub fn cancel(&mut self, message_id: u16) -> bool {
        match self.pending.remove(&message_id) {
            Some(entry) => {
                let _ = entry.waiter.send(CommandOutcome::Cancelled);
                true
            },
            None => false,
        }
    }

    /// Cancel everything tracked on a closing session.
    pub fn cancel_session(&mut self, session_id: u64) -> usize {
        let expired: Vec<u16> = self
            .pending
            .iter()
            .filter(|(_, p)| p.session_id == session_id)
            .map(|(&id, _)| id)
            .collect();

        for id in &expired {
            if let Some(entry) = self.pending.remove(id) {
                let _ = entry.waiter.send(CommandOutcome::Cancelled);
            }
        }
        expired.len()
    }

    /// Time out every command whose deadline has passed.
    pub fn sweep_expired(&mut self, now: I) -> usize {
        let expired: Vec<u16> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(&id, _)| id)
            .collect();

        for id in &expired {
            if let Some(entry) = self.pending.remove(id) {
                let _ = entry.waiter.send(CommandOutcome::Timeout);
            }
        }
        expired.len()
    }

    /// Commands currently in flight.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Whether an id is currently pending.
    #[must_use]
    pub fn is_pending(&self, message_id: u16) -> bool {
        self.pending.contains_key(&message_id)
    }
}
