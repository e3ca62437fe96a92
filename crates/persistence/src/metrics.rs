//! Query timing and pool gauges.

use metrics::{gauge, histogram};
use sqlx::PgPool;
use std::time::{Duration, Instant};

/// Histogram of repository query latency, labelled by query name.
pub const QUERY_DURATION_METRIC: &str = "database_query_duration_seconds";

/// Times one repository query.
///
/// Create it before the query and call [`QueryTimer::record`] once the rows
/// are back. A timer dropped on an error path records nothing, so failed
/// queries do not skew the latency histogram.
#[derive(Debug)]
pub struct QueryTimer {
    query: &'static str,
    start: Instant,
}

impl QueryTimer {
    pub fn new(query: &'static str) -> Self {
        Self {
            query,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn record(self) {
        histogram!(QUERY_DURATION_METRIC, "query" => self.query)
            .record(self.elapsed().as_secs_f64());
    }
}

/// Publishes pool occupancy gauges.
pub fn record_pool_metrics(pool: &PgPool) {
    let size = pool.size() as usize;
    let idle = pool.num_idle();

    gauge!("database_connections_total").set(size as f64);
    gauge!("database_connections_idle").set(idle as f64);
    gauge!("database_connections_active").set(size.saturating_sub(idle) as f64);
}
