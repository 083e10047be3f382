use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("askdata.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("askdata.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("askdata.client.request_duration_seconds");

pub(crate) static SESSION_SENDS: Counter = Counter::new("askdata.session.sends");
pub(crate) static SESSION_IGNORED_SENDS: Counter = Counter::new("askdata.session.ignored_sends");
pub(crate) static SESSION_FAILURES: Counter = Counter::new("askdata.session.failures");
pub(crate) static SESSION_DISCARDED: Counter = Counter::new("askdata.session.discarded");
pub(crate) static SESSION_RESETS: Counter = Counter::new("askdata.session.resets");
pub(crate) static SESSION_QUERY_DURATION: Moments =
    Moments::new("askdata.session.query_duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&SESSION_SENDS);
    collector.register_counter(&SESSION_IGNORED_SENDS);
    collector.register_counter(&SESSION_FAILURES);
    collector.register_counter(&SESSION_DISCARDED);
    collector.register_counter(&SESSION_RESETS);
    collector.register_moments(&SESSION_QUERY_DURATION);
}
