use biometrics::{Collector, Counter, Moments};

pub(crate) static TRANSPORT_REQUESTS: Counter = Counter::new("beeper.transport.requests");
pub(crate) static TRANSPORT_REQUEST_ERRORS: Counter =
    Counter::new("beeper.transport.request_errors");
pub(crate) static TRANSPORT_REQUEST_DURATION: Moments =
    Moments::new("beeper.transport.request_duration_seconds");

pub(crate) static UPDATE_CHECKS: Counter = Counter::new("beeper.update.checks");
pub(crate) static UPDATE_CACHE_HITS: Counter = Counter::new("beeper.update.cache_hits");
pub(crate) static UPDATE_CACHE_WRITE_FAILURES: Counter =
    Counter::new("beeper.update.cache_write_failures");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&TRANSPORT_REQUESTS);
    collector.register_counter(&TRANSPORT_REQUEST_ERRORS);
    collector.register_moments(&TRANSPORT_REQUEST_DURATION);

    collector.register_counter(&UPDATE_CHECKS);
    collector.register_counter(&UPDATE_CACHE_HITS);
    collector.register_counter(&UPDATE_CACHE_WRITE_FAILURES);
}
