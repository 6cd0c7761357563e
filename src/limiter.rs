use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::catalog::{Identity, LimitCatalog};
use crate::dispatch::PriorityDispatcher;

// Fixed window length - counters reset lazily on the first reservation
// observed after expiry, there is no background timer
pub const WINDOW: Duration = Duration::from_secs(60);

// Per-identity window state, read and written only under its own lock
struct CounterState {
    window_start: Instant,
    request_count: u32,
}

// One counter per catalog identity, built up front and never removed
struct EndpointCounter {
    state: Mutex<CounterState>,
}

/// Outcome of a reservation attempt. Created fresh per call and returned
/// to the caller; never an error, callers branch on `allowed`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub allowed: bool,
    pub reserved_tokens: u64,
    pub reserved_requests: u64,
    // Remaining budget is reported raw on denial and may go negative -
    // callers observe the deficit, it is never clamped
    pub remaining_tokens: i64,
    pub remaining_requests: i64,
    pub target_endpoint_path: String,
}

impl Reservation {
    // Unknown (API key, endpoint) pairs are denied with all fields zero
    fn denied_unknown() -> Self {
        Self {
            allowed: false,
            reserved_tokens: 0,
            reserved_requests: 0,
            remaining_tokens: 0,
            remaining_requests: 0,
            target_endpoint_path: String::new(),
        }
    }
}

/// The reservation engine: admission checks against the catalog quotas,
/// fixed-window counter upkeep, and post-admission priority dispatch.
///
/// Owned by the process entry point and shared behind an `Arc` - there is
/// deliberately no module-level limiter instance.
pub struct ReservationEngine {
    catalog: LimitCatalog,
    counters: HashMap<Identity, EndpointCounter>,
    dispatcher: PriorityDispatcher,
}

impl ReservationEngine {
    pub fn new(catalog: LimitCatalog, dispatcher: PriorityDispatcher) -> Self {
        // Counters mirror the catalog keys exactly; since neither map
        // changes after this point, lookups never take a map-wide lock
        let now = Instant::now();
        let counters = catalog
            .identities()
            .cloned()
            .map(|identity| {
                (
                    identity,
                    EndpointCounter {
                        state: Mutex::new(CounterState {
                            window_start: now,
                            request_count: 0,
                        }),
                    },
                )
            })
            .collect();

        Self {
            catalog,
            counters,
            dispatcher,
        }
    }

    /// Attempt to reserve `requests` requests and `tokens` tokens for one
    /// identity. Every input produces a Reservation; unknown identities and
    /// exceeded quotas are ordinary deny decisions, not errors.
    ///
    /// RPM is checked against the cumulative window count plus this batch.
    /// TPM is checked against this reservation's tokens alone - there is no
    /// running token counter. The asymmetry is inherited behavior and is
    /// pinned by tests, not fixed here.
    pub fn reserve(&self, identity: &Identity, tokens: u64, requests: u64) -> Reservation {
        let Some(entry) = self.catalog.get(identity) else {
            debug!(api_key = %identity.api_key, path = %identity.path, "unknown identity denied");
            return Reservation::denied_unknown();
        };
        let Some(counter) = self.counters.get(identity) else {
            // counters are built from the catalog keys, so this arm is
            // unreachable; deny rather than panic if it ever diverges
            return Reservation::denied_unknown();
        };
        let quota = entry.quota;

        let reservation = {
            // A poisoned lock still holds consistent counts
            let mut state = counter
                .state
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());

            // Lazy fixed-window reset; the reset and the increment below are
            // observed atomically by anyone else contending for this identity
            let now = Instant::now();
            if now.duration_since(state.window_start) >= WINDOW {
                state.request_count = 0;
                state.window_start = now;
            }

            let over_rpm = u64::from(state.request_count) + requests > u64::from(quota.rpm);
            let over_tpm = tokens > u64::from(quota.tpm);

            if over_rpm || over_tpm {
                Reservation {
                    allowed: false,
                    reserved_tokens: 0,
                    reserved_requests: 0,
                    remaining_tokens: i64::from(quota.tpm) - tokens as i64,
                    remaining_requests: i64::from(quota.rpm) - i64::from(state.request_count),
                    target_endpoint_path: String::new(),
                }
            } else {
                // Admission only bumps the count; the window start moves
                // solely at reset time
                state.request_count += requests as u32;
                Reservation {
                    allowed: true,
                    reserved_tokens: tokens,
                    reserved_requests: requests,
                    remaining_tokens: i64::from(quota.tpm) - tokens as i64,
                    remaining_requests: i64::from(quota.rpm) - i64::from(state.request_count),
                    target_endpoint_path: identity.path.clone(),
                }
            }
        };

        // Dispatch happens outside the lock and is never awaited here; the
        // caller gets the reservation back regardless of dispatch outcome
        if reservation.allowed {
            self.dispatcher
                .dispatch(entry.class, &identity.api_key, reservation.clone());
        }

        reservation
    }

    // Test hook: pull an identity's window start into the past so reset
    // behavior can be exercised without sleeping out a real window
    #[cfg(test)]
    pub(crate) fn rewind_window(&self, identity: &Identity, by: Duration) {
        let counter = self.counters.get(identity).expect("unknown identity");
        let mut state = counter.state.lock().unwrap();
        state.window_start = state.window_start.checked_sub(by).expect("instant underflow");
    }
}
