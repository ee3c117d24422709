// Metrics module for observability
// Counters, gauges and histograms for the query, forwarding and membership paths

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

/// Initialize all metric descriptions
/// Should be called once at application startup
pub fn init_metrics() {
    describe_counter!(
        "sql_queries_total",
        "Total number of queries submitted to consensus by this node"
    );
    describe_histogram!(
        "sql_query_duration_seconds",
        "Time from submit until the query was applied locally"
    );
    describe_counter!(
        "sql_forwarded_total",
        "Total number of requests relayed to another member"
    );
    describe_counter!(
        "sql_forward_failures_total",
        "Total number of failed forwarding attempts"
    );
    describe_counter!(
        "cluster_join_attempts_total",
        "Total number of join requests sent by this node"
    );
    describe_gauge!("cluster_members_total", "Total number of cluster members");

    tracing::info!("Metrics initialized");
}

pub fn record_query(duration_secs: f64, success: bool) {
    let outcome = if success { "ok" } else { "error" };
    counter!("sql_queries_total", "outcome" => outcome).increment(1);
    histogram!("sql_query_duration_seconds").record(duration_secs);
}

pub fn record_forward(path: &str, success: bool) {
    if success {
        counter!("sql_forwarded_total", "path" => path.to_string()).increment(1);
    } else {
        counter!("sql_forward_failures_total", "path" => path.to_string()).increment(1);
    }
}

pub fn record_join_attempt() {
    counter!("cluster_join_attempts_total").increment(1);
}

pub fn set_cluster_members(total: usize) {
    gauge!("cluster_members_total").set(total as f64);
}
