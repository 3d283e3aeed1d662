//! Prometheus metrics HTTP endpoint
//!
//! Exposes node metrics in Prometheus text format at /metrics.
//! Uses hyper for the HTTP server.

use crate::infra::metrics::{Metrics, MetricsSummary};
use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

/// Prometheus metric type
enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

/// Write a simple metric (counter or gauge) with node label
fn write_metric(
    output: &mut String,
    name: &str,
    help: &str,
    typ: MetricType,
    node: &str,
    val: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {}", typ.as_str());
    let _ = writeln!(output, "{name}{{node=\"{node}\"}} {val}");
}

/// Format metrics in Prometheus text exposition format
fn format_prometheus_metrics(metrics: &Metrics, node_id: &str) -> String {
    let summary = metrics.report();
    let mut output = String::with_capacity(4096);

    write_tick_metrics(&mut output, node_id, &summary);
    write_dispatch_metrics(&mut output, node_id, &summary);
    write_occupancy_metrics(&mut output, node_id, &summary);
    write_notice_metrics(&mut output, node_id, &summary);

    output
}

fn write_tick_metrics(output: &mut String, node: &str, summary: &MetricsSummary) {
    write_metric(
        output,
        "acnode_uptime_seconds",
        "Seconds since the node started",
        MetricType::Gauge,
        node,
        summary.uptime_secs,
    );
    write_metric(
        output,
        "acnode_ticks_total",
        "Control loop ticks executed",
        MetricType::Counter,
        node,
        summary.ticks,
    );
    let _ = writeln!(output, "# HELP acnode_ticks_per_sec Control loop ticks per second");
    let _ = writeln!(output, "# TYPE acnode_ticks_per_sec gauge");
    let _ = writeln!(output, "acnode_ticks_per_sec{{node=\"{node}\"}} {:.2}", summary.ticks_per_sec);
    write_metric(
        output,
        "acnode_sensor_timeouts_total",
        "Ultrasonic echo waits that timed out",
        MetricType::Counter,
        node,
        summary.sensor_timeouts,
    );
}

fn write_dispatch_metrics(output: &mut String, node: &str, summary: &MetricsSummary) {
    write_metric(
        output,
        "acnode_messages_received_total",
        "Inbound MQTT messages received",
        MetricType::Counter,
        node,
        summary.messages_received,
    );
    write_metric(
        output,
        "acnode_messages_dropped_total",
        "Inbound MQTT messages dropped (channel full)",
        MetricType::Counter,
        node,
        summary.messages_dropped,
    );
    write_metric(
        output,
        "acnode_dispatch_success_total",
        "Dispatches that produced a device action",
        MetricType::Counter,
        node,
        summary.dispatch_success,
    );
    write_metric(
        output,
        "acnode_dispatch_invalid_action_total",
        "Dispatches rejected for unknown action or category",
        MetricType::Counter,
        node,
        summary.dispatch_invalid_action,
    );
    write_metric(
        output,
        "acnode_dispatch_invalid_argument_total",
        "Dispatches rejected for out-of-range argument",
        MetricType::Counter,
        node,
        summary.dispatch_invalid_argument,
    );
    write_metric(
        output,
        "acnode_ir_transmissions_total",
        "IR pulse tables transmitted",
        MetricType::Counter,
        node,
        summary.ir_transmissions,
    );
    write_metric(
        output,
        "acnode_ir_failures_total",
        "IR transmissions that reported an error",
        MetricType::Counter,
        node,
        summary.ir_failures,
    );
    write_metric(
        output,
        "acnode_temperature_reads_total",
        "Temperature sensor reads",
        MetricType::Counter,
        node,
        summary.temperature_reads,
    );
}

fn write_occupancy_metrics(output: &mut String, node: &str, summary: &MetricsSummary) {
    write_metric(
        output,
        "acnode_occupancy_entries_total",
        "Doorway events classified as entries",
        MetricType::Counter,
        node,
        summary.occupancy_entries,
    );
    write_metric(
        output,
        "acnode_occupancy_exits_total",
        "Doorway events classified as exits",
        MetricType::Counter,
        node,
        summary.occupancy_exits,
    );
}

fn write_notice_metrics(output: &mut String, node: &str, summary: &MetricsSummary) {
    write_metric(
        output,
        "acnode_notices_published_total",
        "Notices published to the coordinator",
        MetricType::Counter,
        node,
        summary.notices_published,
    );
    write_metric(
        output,
        "acnode_notices_dropped_total",
        "Notices dropped (channel full)",
        MetricType::Counter,
        node,
        summary.notices_dropped,
    );
}

/// Handle HTTP requests
async fn handle_request(
    req: Request<hyper::body::Incoming>,
    metrics: Arc<Metrics>,
    node_id: Arc<String>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = format_prometheus_metrics(&metrics, &node_id);
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "text/plain; version=0.0.4; charset=utf-8")
                .body(Full::new(Bytes::from(body)))
                .expect("static response should not fail"))
        }
        (&Method::GET, "/health") => Ok(Response::builder()
            .status(StatusCode::OK)
            .body(Full::new(Bytes::from("ok")))
            .expect("static response should not fail")),
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("Not Found")))
            .expect("static response should not fail")),
    }
}

/// Start the Prometheus metrics HTTP server
pub async fn start_metrics_server(
    port: u16,
    metrics: Arc<Metrics>,
    node_id: String,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    let node_id = Arc::new(node_id);

    info!(port = %port, node = %node_id, "prometheus_metrics_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let metrics = metrics.clone();
                        let node_id = node_id.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let metrics = metrics.clone();
                                let node_id = node_id.clone();
                                async move { handle_request(req, metrics, node_id).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "prometheus_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "prometheus_accept_error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("prometheus_metrics_server_shutdown");
                    return Ok(());
                }
            }
        }
    }
}
