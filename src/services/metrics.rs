use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::{Duration, Instant};

use crate::errors::AppError;

pub struct MetricsService {
    registry: Registry,
    stories_generated: IntCounter,
    covers: IntCounterVec,
    upstream_errors: IntCounterVec,
    quota_denials: IntCounterVec,
    shares_recorded: IntCounter,
    request_duration: HistogramVec,
    errors: IntCounterVec,
}

impl MetricsService {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("bravebunny".to_string()), None)?;

        let stories_generated =
            IntCounter::new("stories_generated_total", "Stories returned to users")?;
        let covers = IntCounterVec::new(
            Opts::new("covers_total", "Cover generations by outcome"),
            &["outcome"],
        )?;
        let upstream_errors = IntCounterVec::new(
            Opts::new("upstream_errors_total", "Failed calls to upstream APIs"),
            &["kind"],
        )?;
        let quota_denials = IntCounterVec::new(
            Opts::new("quota_denials_total", "Generations refused by the quota policy"),
            &["reason"],
        )?;
        let shares_recorded =
            IntCounter::new("shares_recorded_total", "Shares recorded by users")?;
        let request_duration = HistogramVec::new(
            HistogramOpts::new("request_duration_seconds", "HTTP request latency")
                .buckets(vec![0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 90.0]),
            &["endpoint"],
        )?;
        let errors = IntCounterVec::new(
            Opts::new("errors_total", "HTTP responses with error status"),
            &["type"],
        )?;

        for collector in [
            Box::new(stories_generated.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(covers.clone()),
            Box::new(upstream_errors.clone()),
            Box::new(quota_denials.clone()),
            Box::new(shares_recorded.clone()),
            Box::new(request_duration.clone()),
            Box::new(errors.clone()),
        ] {
            registry.register(collector)?;
        }

        Ok(Self {
            registry,
            stories_generated,
            covers,
            upstream_errors,
            quota_denials,
            shares_recorded,
            request_duration,
            errors,
        })
    }

    pub fn record_story(&self) {
        self.stories_generated.inc();
    }

    pub fn record_cover(&self, succeeded: bool) {
        let outcome = if succeeded { "succeeded" } else { "failed" };
        self.covers.with_label_values(&[outcome]).inc();
    }

    pub fn record_upstream_error(&self, error: &AppError) {
        let kind = match error {
            AppError::UpstreamUnauthorized { .. } => "unauthorized",
            AppError::UpstreamRateLimited { .. } => "rate_limited",
            AppError::Upstream { .. } | AppError::Transport(_) => "upstream",
            AppError::MalformedResponse(_) => "malformed",
            AppError::JobFailed(_) => "job_failed",
            AppError::PollTimeout { .. } => "poll_timeout",
            AppError::AuthConfiguration(_) => "configuration",
            _ => return,
        };
        self.upstream_errors.with_label_values(&[kind]).inc();
    }

    pub fn record_quota_denial(&self, reason: &str) {
        self.quota_denials.with_label_values(&[reason]).inc();
    }

    pub fn record_share(&self) {
        self.shares_recorded.inc();
    }

    pub fn record_request_duration(&self, duration: Duration, endpoint: &str) {
        self.request_duration
            .with_label_values(&[endpoint])
            .observe(duration.as_secs_f64());
    }

    pub fn record_error(&self, error_type: &str) {
        self.errors.with_label_values(&[error_type]).inc();
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub struct RequestTimer<'a> {
    metrics: &'a MetricsService,
    start: Instant,
    endpoint: String,
}

impl<'a> RequestTimer<'a> {
    pub fn new(metrics: &'a MetricsService, endpoint: String) -> Self {
        Self {
            metrics,
            start: Instant::now(),
            endpoint,
        }
    }
}

impl Drop for RequestTimer<'_> {
    fn drop(&mut self) {
        self.metrics
            .record_request_duration(self.start.elapsed(), &self.endpoint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_recorded_metrics() {
        let metrics = MetricsService::new().unwrap();
        metrics.record_story();
        metrics.record_cover(false);
        metrics.record_upstream_error(&AppError::UpstreamRateLimited { service: "chat" });
        metrics.record_upstream_error(&AppError::Validation("ignored".to_string()));

        let output = metrics.render().unwrap();
        assert!(output.contains("bravebunny_stories_generated_total 1"));
        assert!(output.contains("bravebunny_covers_total{outcome=\"failed\"} 1"));
        assert!(output.contains("bravebunny_upstream_errors_total{kind=\"rate_limited\"} 1"));
    }

    #[test]
    fn test_request_timer_records_on_drop() {
        let metrics = MetricsService::new().unwrap();
        {
            let _timer = RequestTimer::new(&metrics, "POST /api/stories".to_string());
        }
        let output = metrics.render().unwrap();
        assert!(output.contains("bravebunny_request_duration_seconds_count{endpoint=\"POST /api/stories\"} 1"));
    }
}
