use crate::limiter::ReservationEngine;

// App's shared state - the engine owns the catalog, the counters and the
// dispatcher, and is shared with the handlers through an Arc
pub struct AppState {
    pub engine: ReservationEngine,
}
