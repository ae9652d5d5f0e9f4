//! Metric descriptors and the per-scrape metric set.
//!
//! Every metric the exporter can emit is described once, as a constant
//! [`MetricDesc`], together with the stat key(s) it is read from. A scrape
//! fills a fresh [`ScrapeMetrics`] from these tables; nothing is registered
//! globally and nothing survives between scrapes.
//!
//! # Examples
//!
//! ```rust
//! use mcrouter_exporter::metrics::{ScrapeMetrics, UP, VERSION};
//!
//! let mut metrics = ScrapeMetrics::new();
//! metrics.push(&UP, 1.0);
//! metrics.push_labeled(&VERSION, "41.0.0 mcrouter", 1.0);
//!
//! let text = metrics.encode().unwrap();
//! assert!(text.contains("mcrouter_up 1"));
//! assert!(text.contains(r#"mcrouter_version{version="41.0.0 mcrouter"} 1"#));
//! ```

use std::collections::HashMap;

use prometheus::proto::{self, LabelPair, Metric, MetricFamily, MetricType};
use prometheus::{Encoder, TextEncoder};

use crate::error::EncodeError;

/// Prefix of every metric name.
pub const NAMESPACE: &str = "mcrouter";

/// Prometheus metric type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
}

/// Static description of one metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDesc {
    /// Name without the namespace prefix.
    pub name: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
    /// Name of the single variable label, if any.
    pub label: Option<&'static str>,
}

impl MetricDesc {
    const fn gauge(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            kind: MetricKind::Gauge,
            label: None,
        }
    }

    const fn counter(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            kind: MetricKind::Counter,
            label: None,
        }
    }

    const fn labeled(self, label: &'static str) -> Self {
        Self {
            label: Some(label),
            ..self
        }
    }

    /// Fully qualified name, e.g. `mcrouter_up`.
    pub fn fq_name(&self) -> String {
        format!("{NAMESPACE}_{}", self.name)
    }

    fn proto_type(&self) -> MetricType {
        match self.kind {
            MetricKind::Counter => MetricType::COUNTER,
            MetricKind::Gauge => MetricType::GAUGE,
        }
    }
}

// =============================================================================
// Aggregate metrics (`stats all`)
// =============================================================================

pub const UP: MetricDesc = MetricDesc::gauge("up", "Could the mcrouter server be reached.");

pub const START_TIME: MetricDesc =
    MetricDesc::counter("start_time_seconds", "UNIX timestamp of mcrouter startup time.");

pub const VERSION: MetricDesc =
    MetricDesc::gauge("version", "Version of mcrouter binary.").labeled("version");

pub const COMMAND_ARGS: MetricDesc =
    MetricDesc::gauge("commandargs", "Command line arguments used to start mcrouter.")
        .labeled("commandargs");

pub const COMMANDS: MetricDesc = MetricDesc::gauge(
    "commands",
    "Average number of received requests per second drilled down by operation.",
)
.labeled("cmd");

pub const COMMAND_COUNT: MetricDesc = MetricDesc::counter(
    "command_count",
    "Total number of received requests drilled down by operation.",
)
.labeled("cmd");

pub const COMMAND_OUT: MetricDesc = MetricDesc::counter(
    "command_out",
    "Average number of sent normal (non-shadow, non-failover) requests per second drilled down by operation.",
)
.labeled("cmd");

pub const COMMAND_OUT_ALL: MetricDesc = MetricDesc::counter(
    "command_out_all",
    "Total number of sent requests per second (failover + shadow + normal) drilled down by operation.",
)
.labeled("cmd");

pub const CONFIG_FAILURES: MetricDesc = MetricDesc::counter(
    "config_failures",
    "How many times mcrouter failed to reconfigure (if > 0 and growing, check the config is valid).",
);

pub const CONFIG_LAST_ATTEMPT: MetricDesc = MetricDesc::gauge(
    "config_last_attempt",
    "UNIX timestamp of last time mcrouter tried to reconfigure.",
);

pub const CONFIG_LAST_SUCCESS: MetricDesc = MetricDesc::gauge(
    "config_last_success",
    "UNIX timestamp of last time mcrouter reconfigured successfully.",
);

pub const DEV_NULL_REQUESTS: MetricDesc =
    MetricDesc::counter("dev_null_requests", "Number of requests sent to DevNullRoute.");

pub const DURATION_US: MetricDesc = MetricDesc::gauge(
    "duration_us",
    "Average time of processing a request (i.e. receiving request and sending a reply).",
);

pub const FIBERS_ALLOCATED: MetricDesc = MetricDesc::gauge(
    "fibers_allocated",
    "Number of fibers (lightweight threads) created by mcrouter.",
);

pub const FIBERS_POOL_SIZE: MetricDesc = MetricDesc::gauge(
    "fibers_pool_size",
    "Number of fibers (lightweight threads) created by mcrouter that are currently in the free pool.",
);

pub const PROXY_REQS_PROCESSING: MetricDesc = MetricDesc::gauge(
    "proxy_reqs_processing",
    "Requests mcrouter started routing but didn't receive a reply yet.",
);

pub const PROXY_REQS_WAITING: MetricDesc =
    MetricDesc::gauge("proxy_reqs_waiting", "Requests queued up and not routed yet.");

pub const REQUEST: MetricDesc = MetricDesc::gauge(
    "request",
    "Average number of requests per second drilled down by request outcome.",
)
.labeled("type");

pub const REQUEST_COUNT: MetricDesc = MetricDesc::counter(
    "request_count",
    "Total number of requests drilled down by request outcome.",
)
.labeled("type");

pub const RESULTS: MetricDesc = MetricDesc::gauge(
    "results",
    "Average number of replies per second received for normal requests drilled down by reply result.",
)
.labeled("reply");

pub const RESULT_COUNT: MetricDesc = MetricDesc::counter(
    "result_count",
    "Total number of replies received drilled down by reply result.",
)
.labeled("reply");

pub const RESULT_ALL: MetricDesc = MetricDesc::gauge(
    "result_all",
    "Average number of replies per second received for requests drilled down by reply result.",
)
.labeled("reply");

pub const RESULT_ALL_COUNT: MetricDesc = MetricDesc::counter(
    "result_all_count",
    "Total number of replies received for all requests drilled down by reply result.",
)
.labeled("reply");

pub const CLIENTS: MetricDesc =
    MetricDesc::counter("clients", "Number of connected clients (prior to version 39).");

pub const NUM_CLIENT_CONNECTIONS: MetricDesc = MetricDesc::gauge(
    "num_client_connections",
    "Number of connected clients (version 39 and after).",
);

pub const SERVERS: MetricDesc =
    MetricDesc::gauge("servers", "Number of connected memcached servers.").labeled("state");

pub const CPU_SECONDS: MetricDesc =
    MetricDesc::counter("cpu_seconds_total", "Number of seconds mcrouter spent on CPU.");

pub const RESIDENT_MEMORY: MetricDesc =
    MetricDesc::gauge("resident_memory_bytes", "Number of bytes of resident memory.");

pub const VIRTUAL_MEMORY: MetricDesc =
    MetricDesc::gauge("virtual_memory_bytes", "Number of bytes of virtual memory.");

pub const ASYNCLOG_REQUESTS: MetricDesc = MetricDesc::counter(
    "asynclog_requests",
    "Number of failed deletes written to spool file.",
);

pub const ASYNCLOG_REQUESTS_RATE: MetricDesc = MetricDesc::gauge(
    "asynclog_requests_rate",
    "Number of requests that were attempted to be spooled to disk.",
);

pub const ASYNCLOG_SPOOL_SUCCESS_RATE: MetricDesc = MetricDesc::gauge(
    "asynclog_spool_success_rate",
    "Number of requests that were spooled successfully.",
);

/// Unlabeled aggregate metrics and the stat key each is read from.
pub const AGGREGATE_STATS: &[(MetricDesc, &str)] = &[
    (START_TIME, "start_time"),
    (DEV_NULL_REQUESTS, "dev_null_requests"),
    (DURATION_US, "duration_us"),
    (FIBERS_ALLOCATED, "fibers_allocated"),
    (FIBERS_POOL_SIZE, "fibers_pool_size"),
    (PROXY_REQS_PROCESSING, "proxy_reqs_processing"),
    (PROXY_REQS_WAITING, "proxy_reqs_waiting"),
    (CONFIG_FAILURES, "config_failures"),
    (CONFIG_LAST_ATTEMPT, "config_last_attempt"),
    (CONFIG_LAST_SUCCESS, "config_last_success"),
    (CLIENTS, "num_clients"),
    (NUM_CLIENT_CONNECTIONS, "num_client_connections"),
    (RESIDENT_MEMORY, "ps_rss"),
    (VIRTUAL_MEMORY, "ps_vsize"),
    (ASYNCLOG_REQUESTS, "asynclog_requests"),
    (ASYNCLOG_REQUESTS_RATE, "asynclog_requests_rate"),
    (ASYNCLOG_SPOOL_SUCCESS_RATE, "asynclog_spool_success_rate"),
];

/// Stat keys summed into [`CPU_SECONDS`].
pub const CPU_TIME_STATS: [&str; 2] = ["ps_user_time_sec", "ps_system_time_sec"];

/// A family of labeled metrics read from `<prefix><label value><suffix>`.
#[derive(Debug, Clone, Copy)]
pub struct FanOut {
    pub prefix: &'static str,
    pub label_values: &'static [&'static str],
    /// Each metric with the suffix of its stat key.
    pub metrics: &'static [(MetricDesc, &'static str)],
}

impl FanOut {
    /// Yields `(metric, label value, stat key)` for every combination.
    pub fn entries(&self) -> impl Iterator<Item = (&'static MetricDesc, &'static str, String)> + '_ {
        let prefix = self.prefix;
        let metrics = self.metrics;
        self.label_values.iter().flat_map(move |value| {
            metrics
                .iter()
                .map(move |(desc, suffix)| (desc, *value, format!("{prefix}{value}{suffix}")))
        })
    }
}

pub const COMMAND_OPS: &[&str] = &[
    "add", "append", "cas", "decr", "flushall", "flushre", "get", "gets", "incr", "metaget",
    "prepend", "replace", "touch", "set", "delete", "lease_get", "lease_set",
];

pub const REQUEST_OUTCOMES: &[&str] = &["error", "replied", "sent", "success"];

/// Reply results, as named by mcrouter's request logger.
pub const REPLY_RESULTS: &[&str] = &[
    "busy",
    "connect_error",
    "connect_timeout",
    "data_timeout",
    "error",
    "local_error",
    "tko",
];

pub const SERVER_STATES: &[&str] = &["closed", "down", "new", "up"];

pub const COMMAND_FAN_OUT: FanOut = FanOut {
    prefix: "cmd_",
    label_values: COMMAND_OPS,
    metrics: &[
        (COMMANDS, ""),
        (COMMAND_COUNT, "_count"),
        (COMMAND_OUT, "_out"),
        (COMMAND_OUT_ALL, "_out_all"),
    ],
};

pub const REQUEST_FAN_OUT: FanOut = FanOut {
    prefix: "request_",
    label_values: REQUEST_OUTCOMES,
    metrics: &[(REQUEST, ""), (REQUEST_COUNT, "_count")],
};

pub const RESULT_FAN_OUT: FanOut = FanOut {
    prefix: "result_",
    label_values: REPLY_RESULTS,
    metrics: &[
        (RESULTS, ""),
        (RESULT_COUNT, "_count"),
        (RESULT_ALL, "_all"),
        (RESULT_ALL_COUNT, "_all_count"),
    ],
};

pub const SERVERS_FAN_OUT: FanOut = FanOut {
    prefix: "num_servers_",
    label_values: SERVER_STATES,
    metrics: &[(SERVERS, "")],
};

/// All fan-outs over the aggregate stats, in emission order.
pub const AGGREGATE_FAN_OUTS: &[FanOut] = &[
    COMMAND_FAN_OUT,
    REQUEST_FAN_OUT,
    RESULT_FAN_OUT,
    SERVERS_FAN_OUT,
];

// =============================================================================
// Per-destination metrics (`stats servers`)
// =============================================================================

const fn server_gauge(name: &'static str, help: &'static str) -> MetricDesc {
    MetricDesc::gauge(name, help).labeled("server")
}

const fn server_counter(name: &'static str, help: &'static str) -> MetricDesc {
    MetricDesc::counter(name, help).labeled("server")
}

pub const SERVER_DURATION_US: MetricDesc = server_gauge(
    "server_duration_us",
    "Average time of processing a request per-server (i.e. receiving request and sending a reply).",
);

pub const SERVER_PROXY_REQS_PROCESSING: MetricDesc = server_gauge(
    "server_proxy_reqs_processing",
    "Requests mcrouter started routing but didn't receive a reply yet (per-server metric).",
);

pub const SERVER_PROXY_REQS_WAITING: MetricDesc = server_gauge(
    "server_proxy_reqs_waiting",
    "Requests queued up and not routed yet (per-server metric).",
);

pub const SERVER_PROXY_REQS_RETRANS_RATIO: MetricDesc = server_gauge(
    "server_proxy_reqs_retrans_ratio",
    "Requests mcrouter started but that required retransmission.",
);

pub const SERVER_MEMCACHED_STORED: MetricDesc = server_counter(
    "server_memcached_stored_count",
    "Number of memcached STORED replies (per-server metric).",
);

pub const SERVER_MEMCACHED_NOT_STORED: MetricDesc = server_counter(
    "server_memcached_not_stored_count",
    "Number of memcached NOT_STORED replies (per-server metric).",
);

pub const SERVER_MEMCACHED_FOUND: MetricDesc = server_counter(
    "server_memcached_found_count",
    "Number of memcached FOUND replies (per-server metric).",
);

pub const SERVER_MEMCACHED_NOT_FOUND: MetricDesc = server_counter(
    "server_memcached_not_found_count",
    "Number of memcached NOT_FOUND replies (per-server metric).",
);

pub const SERVER_MEMCACHED_DELETED: MetricDesc = server_counter(
    "server_memcached_deleted_count",
    "Number of memcached DELETED replies (per-server metric).",
);

pub const SERVER_MEMCACHED_TOUCHED: MetricDesc = server_counter(
    "server_memcached_touched_count",
    "Number of memcached TOUCHED replies (per-server metric).",
);

pub const SERVER_MEMCACHED_EXISTS: MetricDesc = server_counter(
    "server_memcached_exists_count",
    "Number of memcached EXISTS replies (per-server metric).",
);

pub const SERVER_MEMCACHED_REMOTE_ERROR: MetricDesc = server_counter(
    "server_memcached_remote_error_count",
    "Number of memcached remote errors (per-server metric).",
);

pub const SERVER_MEMCACHED_CONNECT_TIMEOUT: MetricDesc = server_counter(
    "server_memcached_connect_timeout_count",
    "Number of memcached connect timeouts (per-server metric).",
);

pub const SERVER_MEMCACHED_TIMEOUT: MetricDesc = server_counter(
    "server_memcached_timeout_count",
    "Number of memcached timeouts (per-server metric).",
);

pub const SERVER_MEMCACHED_SOFT_TKO: MetricDesc = server_gauge(
    "server_memcached_soft_tko",
    "Whether the destination is marked soft TKO (per-server metric).",
);

pub const SERVER_MEMCACHED_HARD_TKO: MetricDesc = server_gauge(
    "server_memcached_hard_tko",
    "Whether the destination is marked hard TKO (per-server metric).",
);

/// Per-destination metrics and the field each is read from.
pub const SERVER_STATS: &[(MetricDesc, &str)] = &[
    (SERVER_DURATION_US, "avg_latency_us"),
    (SERVER_PROXY_REQS_PROCESSING, "pending_reqs"),
    (SERVER_PROXY_REQS_WAITING, "inflight_reqs"),
    (SERVER_PROXY_REQS_RETRANS_RATIO, "avg_retrans_ratio"),
    (SERVER_MEMCACHED_STORED, "stored"),
    (SERVER_MEMCACHED_NOT_STORED, "notstored"),
    (SERVER_MEMCACHED_FOUND, "found"),
    (SERVER_MEMCACHED_NOT_FOUND, "notfound"),
    (SERVER_MEMCACHED_DELETED, "deleted"),
    (SERVER_MEMCACHED_TOUCHED, "touched"),
    (SERVER_MEMCACHED_EXISTS, "exists"),
    (SERVER_MEMCACHED_REMOTE_ERROR, "remote_error"),
    (SERVER_MEMCACHED_CONNECT_TIMEOUT, "connect_timeout"),
    (SERVER_MEMCACHED_TIMEOUT, "timeout"),
    (SERVER_MEMCACHED_SOFT_TKO, "soft_tko"),
    (SERVER_MEMCACHED_HARD_TKO, "hard_tko"),
];

// =============================================================================
// Admin request metrics (`get __mcrouter__.*`)
// =============================================================================

pub const ADMIN_VERSION: MetricDesc =
    MetricDesc::gauge("admin_request_version", "Version of mcrouter binary (admin request).")
        .labeled("version");

pub const ADMIN_CONFIG_AGE: MetricDesc = MetricDesc::gauge(
    "admin_request_config_age",
    "How long, in seconds, since mcrouter loaded its current configuration.",
);

pub const ADMIN_CONFIG_FILE: MetricDesc =
    MetricDesc::gauge("admin_request_config_file", "Configuration file mcrouter was loaded from.")
        .labeled("config_file");

pub const ADMIN_HOSTID: MetricDesc =
    MetricDesc::gauge("admin_request_hostid", "Host id of the mcrouter instance.")
        .labeled("hostid");

pub const ADMIN_CONFIG_MD5_DIGEST: MetricDesc = MetricDesc::gauge(
    "admin_request_config_md5_digest",
    "MD5 digest of the configuration mcrouter is running with.",
)
.labeled("config_md5_digest");

pub const ADMIN_VERSION_KEY: &str = "__mcrouter__.version";
pub const ADMIN_CONFIG_AGE_KEY: &str = "__mcrouter__.config_age";
pub const ADMIN_CONFIG_FILE_KEY: &str = "__mcrouter__.config_file";
pub const ADMIN_HOSTID_KEY: &str = "__mcrouter__.hostid";
pub const ADMIN_CONFIG_MD5_DIGEST_KEY: &str = "__mcrouter__.config_md5_digest";

// =============================================================================
// Per-scrape metric set
// =============================================================================

/// Metric families collected during one scrape, in first-seen order.
#[derive(Debug, Default)]
pub struct ScrapeMetrics {
    families: Vec<MetricFamily>,
    index: HashMap<&'static str, usize>,
}

impl ScrapeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an unlabeled sample.
    pub fn push(&mut self, desc: &MetricDesc, value: f64) {
        self.add(desc, None, value);
    }

    /// Records a sample carrying `label_value` for the descriptor's label.
    pub fn push_labeled(&mut self, desc: &MetricDesc, label_value: &str, value: f64) {
        self.add(desc, Some(label_value), value);
    }

    /// Moves every sample of `other` into `self`.
    pub fn append(&mut self, other: ScrapeMetrics) {
        let mut names: Vec<(&'static str, usize)> = other.index.into_iter().collect();
        names.sort_by_key(|(_, position)| *position);

        let mut families: Vec<Option<MetricFamily>> = other.families.into_iter().map(Some).collect();
        for (name, position) in names {
            let Some(mut family) = families[position].take() else {
                continue;
            };
            match self.index.get(name) {
                Some(&existing) => {
                    let samples = std::mem::take(family.mut_metric());
                    self.families[existing].mut_metric().extend(samples);
                }
                None => {
                    self.index.insert(name, self.families.len());
                    self.families.push(family);
                }
            }
        }
    }

    pub fn families(&self) -> &[MetricFamily] {
        &self.families
    }

    /// Looks up a recorded value; `label_value` selects among labeled samples.
    pub fn get(&self, desc: &MetricDesc, label_value: Option<&str>) -> Option<f64> {
        let family = &self.families[*self.index.get(desc.name)?];
        family.get_metric().iter().find_map(|metric| {
            let label = metric.get_label().first().map(|pair| pair.get_value());
            if label != label_value {
                return None;
            }
            Some(match desc.kind {
                MetricKind::Counter => metric.get_counter().value(),
                MetricKind::Gauge => metric.get_gauge().value(),
            })
        })
    }

    /// Renders the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, EncodeError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| EncodeError(prometheus::Error::Msg(e.to_string())))
    }

    fn add(&mut self, desc: &MetricDesc, label_value: Option<&str>, value: f64) {
        let mut metric = Metric::default();

        if let (Some(name), Some(label_value)) = (desc.label, label_value) {
            let mut pair = LabelPair::default();
            pair.set_name(name.to_string());
            pair.set_value(label_value.to_string());
            metric.set_label(vec![pair]);
        }

        match desc.kind {
            MetricKind::Counter => {
                let mut counter = proto::Counter::default();
                counter.set_value(value);
                metric.set_counter(counter);
            }
            MetricKind::Gauge => {
                let mut gauge = proto::Gauge::default();
                gauge.set_value(value);
                metric.set_gauge(gauge);
            }
        }

        self.family_mut(desc).mut_metric().push(metric);
    }

    fn family_mut(&mut self, desc: &MetricDesc) -> &mut MetricFamily {
        let position = match self.index.get(desc.name) {
            Some(&position) => position,
            None => {
                let mut family = MetricFamily::default();
                family.set_name(desc.fq_name());
                family.set_help(desc.help.to_string());
                family.set_field_type(desc.proto_type());

                self.families.push(family);
                self.index.insert(desc.name, self.families.len() - 1);
                self.families.len() - 1
            }
        };
        &mut self.families[position]
    }
}
