use std::time::Duration;

/// Per-call deadline used when `call_timeout` is left at zero.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// How often stats are logged (and pushed to a sink) when `stats_poll_interval` is left at zero.
pub const DEFAULT_STATS_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// The unit the RPS value of a schedule is expressed in.
pub const DEFAULT_RATE_LIMIT_UNIT: Duration = Duration::from_secs(1);

/// Capacity of the queue feeding results to a sink.
pub const DEFAULT_SINK_QUEUE_CAPACITY: usize = 50_000;

/// Capacity of the channel instances submit their results through.
pub const DEFAULT_CALL_RESULT_BUF_LEN: usize = 50_000;

pub const DEFAULT_GENERATOR_NAME: &str = "Generator";

/// Error string of a result synthesized when a call outlives its deadline.
pub const CALL_TIMEOUT_ERROR: &str = "generator request call timeout";

pub const RPS_SCHEDULE: &str = "rps_schedule";
pub const INSTANCES_SCHEDULE: &str = "instance_schedule";

/// Label distinguishing per-call payloads from stats payloads in a sink.
pub const DATA_TYPE_LABEL: &str = "test_data_type";
pub const DATA_TYPE_RESPONSES: &str = "responses";
pub const DATA_TYPE_STATS: &str = "stats";

pub const GENERATOR_NAME_LABEL: &str = "gen_name";
pub const TEST_NAME_LABEL: &str = "test_name";
