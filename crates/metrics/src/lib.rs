use std::net::SocketAddr;

use anyhow::{Context, Result};
use hyper::{
    header::{HeaderValue, CONTENT_TYPE},
    service::{make_service_fn, service_fn},
    Body, Request, Response, Server, StatusCode,
};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use tracing::{info, warn};

/// Export counters scraped from the daemon's metrics endpoint.
#[derive(Clone)]
pub struct ExportMetrics {
    registry: Registry,
    refreshes: IntCounter,
    failures: IntCounter,
    rows_exported: IntCounterVec,
    last_refresh: IntGauge,
}

impl ExportMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let refreshes = IntCounter::new("shipmap_refresh_total", "Completed export runs")?;
        let failures =
            IntCounter::new("shipmap_refresh_failures_total", "Export runs that failed")?;
        let rows_exported = IntCounterVec::new(
            Opts::new("shipmap_rows_exported_total", "Rows written per extract"),
            &["extract"],
        )?;
        let last_refresh = IntGauge::new(
            "shipmap_last_refresh_timestamp_seconds",
            "Unix time of the last successful export",
        )?;
        registry.register(Box::new(refreshes.clone()))?;
        registry.register(Box::new(failures.clone()))?;
        registry.register(Box::new(rows_exported.clone()))?;
        registry.register(Box::new(last_refresh.clone()))?;
        Ok(Self {
            registry,
            refreshes,
            failures,
            rows_exported,
            last_refresh,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Records a successful run. `rows` pairs each extract name with its row count.
    pub fn record_success<'a, I>(&self, rows: I, finished_at_secs: i64)
    where
        I: IntoIterator<Item = (&'a str, usize)>,
    {
        self.refreshes.inc();
        for (extract, count) in rows {
            self.rows_exported
                .with_label_values(&[extract])
                .inc_by(count as u64);
        }
        self.last_refresh.set(finished_at_secs);
    }

    pub fn record_failure(&self) {
        self.refreshes.inc();
        self.failures.inc();
    }

    pub fn render(&self) -> Result<String> {
        render(&self.registry)
    }

    pub async fn serve(self, addr: SocketAddr) -> Result<()> {
        let registry = self.registry.clone();
        let make_svc = make_service_fn(move |_| {
            let registry = registry.clone();
            async move {
                Ok::<_, hyper::Error>(service_fn(move |_req: Request<Body>| {
                    let registry = registry.clone();
                    async move { Ok::<_, hyper::Error>(scrape(&registry)) }
                }))
            }
        });

        let server = Server::try_bind(&addr)
            .with_context(|| format!("failed to bind metrics endpoint {addr}"))?
            .serve(make_svc);
        info!(%addr, "metrics exporter listening");
        server.await?;
        Ok(())
    }
}

fn render(registry: &Registry) -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

fn scrape(registry: &Registry) -> Response<Body> {
    let mut response = match render(registry) {
        Ok(text) => Response::new(Body::from(text)),
        Err(err) => {
            warn!(error = ?err, "metrics encoding failed");
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            return response;
        }
    };
    if let Ok(value) = TextEncoder::new().format_type().parse::<HeaderValue>() {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_and_failure_update_counters() {
        let metrics = ExportMetrics::new().unwrap();
        metrics.record_success([("ports", 2), ("imo_tracking", 40)], 1_710_050_400);
        metrics.record_success([("ports", 3)], 1_710_054_000);
        metrics.record_failure();

        let text = metrics.render().unwrap();
        assert!(text.contains("shipmap_refresh_total 3"), "{text}");
        assert!(text.contains("shipmap_refresh_failures_total 1"));
        assert!(text.contains(r#"shipmap_rows_exported_total{extract="ports"} 5"#));
        assert!(text.contains(r#"shipmap_rows_exported_total{extract="imo_tracking"} 40"#));
        assert!(text.contains("shipmap_last_refresh_timestamp_seconds 1710054000"));
    }

    #[tokio::test]
    async fn scrape_sets_text_content_type() {
        let metrics = ExportMetrics::new().unwrap();
        let response = scrape(metrics.registry());
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[CONTENT_TYPE]
            .to_str()
            .unwrap()
            .to_string();
        assert!(content_type.starts_with("text/plain"));
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("shipmap_refresh_total 0"));
    }
}
