//! Play-request queue, claim retry and repeat policy
//!
//! The scheduler pushes "play this prepared item" requests; the engine is the
//! single consumer and never looks past the head request. When the head
//! request's item is not prepared yet, the claim is retried on later ticks
//! with exponential backoff and fails terminally after a bounded number of
//! attempts.

use crate::playback::types::{PlayRequest, PrepItem};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Strict FIFO of play requests
#[derive(Debug, Default)]
pub struct PlayRequestQueue {
    requests: VecDeque<PlayRequest>,
}

impl PlayRequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, request: PlayRequest) {
        self.requests.push_back(request);
    }

    pub fn pop_front(&mut self) -> Option<PlayRequest> {
        self.requests.pop_front()
    }

    pub fn front(&self) -> Option<&PlayRequest> {
        self.requests.front()
    }

    pub fn count(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn clear(&mut self) {
        self.requests.clear();
    }
}

/// Bounds for retrying a claim that found nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts before giving up (the first attempt counts)
    pub limit: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            limit: 40,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Delay after the `attempt`-th miss (1-based), doubling up to the cap
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << shift)
            .min(self.max_backoff)
    }
}

/// What to do after a claim miss
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again at the given instant
    RetryAt(Instant),
    /// Out of attempts: fail the request
    GiveUp,
}

/// Claim attempt bookkeeping for the head request
#[derive(Debug)]
pub struct ClaimRetry {
    policy: RetryPolicy,
    request: Option<PlayRequest>,
    misses: u32,
    next_attempt: Option<Instant>,
}

impl ClaimRetry {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            request: None,
            misses: 0,
            next_attempt: None,
        }
    }

    /// True when a claim for `request` may be attempted at `now`
    ///
    /// A different head request starts a fresh retry window.
    pub fn ready(&mut self, request: &PlayRequest, now: Instant) -> bool {
        if self.request.as_ref() != Some(request) {
            self.reset();
            return true;
        }
        self.next_attempt.map_or(true, |at| now >= at)
    }

    /// Record a miss for `request`
    pub fn record_miss(&mut self, request: &PlayRequest, now: Instant) -> RetryDecision {
        if self.request.as_ref() != Some(request) {
            self.reset();
            self.request = Some(request.clone());
        }
        self.misses += 1;
        if self.misses >= self.policy.limit {
            return RetryDecision::GiveUp;
        }
        let at = now + self.policy.backoff(self.misses);
        self.next_attempt = Some(at);
        RetryDecision::RetryAt(at)
    }

    /// Allow the next attempt at once, keeping the miss count
    pub fn expedite(&mut self) {
        self.next_attempt = None;
    }

    pub fn misses(&self) -> u32 {
        self.misses
    }

    pub fn reset(&mut self) {
        self.request = None;
        self.misses = 0;
        self.next_attempt = None;
    }
}

/// Where the next item comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextItem {
    /// Play the current item again; its request stays queued
    Replay,
    /// Claim the item for the head request
    ClaimHead,
}

/// Repeat policy
///
/// Only a current track is replayed. With an announcement current, repeat is
/// ignored for this one decision; the flag itself is left untouched.
pub fn next_item(repeat: bool, current: Option<&PrepItem>) -> NextItem {
    match current {
        Some(item) if repeat && !item.is_announcement() => NextItem::Replay,
        _ => NextItem::ClaimHead,
    }
}
