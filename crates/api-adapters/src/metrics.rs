//! # Metrics
//!
//! A `prometheus-client` registry for the HTTP layer: request counts by
//! method, matched route and status, plus signup and analysis outcomes.

use prometheus_client::encoding::{text::encode, EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabels {
    pub method: String,
    pub route:  String,
    pub status: String,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Outcome {
    Success,
    Failure,
}

impl From<bool> for Outcome {
    fn from(ok: bool) -> Self {
        if ok {
            Outcome::Success
        } else {
            Outcome::Failure
        }
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OutcomeLabels {
    pub outcome: Outcome,
}

pub struct Metrics {
    registry:      Registry,
    http_requests: Family<HttpLabels, Counter>,
    signups:       Family<OutcomeLabels, Counter>,
    analyses:      Family<OutcomeLabels, Counter>,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("kashaaf");
        let http_requests = Family::<HttpLabels, Counter>::default();
        let signups = Family::<OutcomeLabels, Counter>::default();
        let analyses = Family::<OutcomeLabels, Counter>::default();

        registry.register("http_requests", "HTTP requests handled", http_requests.clone());
        registry.register("signups", "Signup attempts by outcome", signups.clone());
        registry.register("analyses", "Gameplay analyses by outcome", analyses.clone());

        Self { registry, http_requests, signups, analyses }
    }

    pub fn record_http(&self, method: &str, route: &str, status: u16) {
        self.http_requests
            .get_or_create(&HttpLabels {
                method: method.to_string(),
                route:  route.to_string(),
                status: status.to_string(),
            })
            .inc();
    }

    pub fn record_signup(&self, ok: bool) {
        self.signups.get_or_create(&OutcomeLabels { outcome: ok.into() }).inc();
    }

    pub fn record_analysis(&self, ok: bool) {
        self.analyses.get_or_create(&OutcomeLabels { outcome: ok.into() }).inc();
    }

    /// OpenMetrics text exposition.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut out = String::new();
        encode(&mut out, &self.registry)?;
        Ok(out)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_the_exposition() {
        let metrics = Metrics::new();
        metrics.record_http("GET", "/api/feed", 200);
        metrics.record_http("GET", "/api/feed", 200);
        metrics.record_signup(false);

        let text = metrics.encode().unwrap();
        assert!(text.contains(r#"kashaaf_http_requests_total{method="GET",route="/api/feed",status="200"} 2"#));
        assert!(text.contains(r#"kashaaf_signups_total{outcome="Failure"} 1"#));
        assert!(text.ends_with("# EOF\n"));
    }
}
