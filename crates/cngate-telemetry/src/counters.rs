//! Counter names for the gateway daemon.
//!
//! Counters register against whatever recorder the binary installs. Frame
//! and sample counters take a `kind`/`stream` label.

use metrics::describe_counter;

/// Complete frames decoded from the serial stream, labeled by kind.
pub const FRAMES_DECODED: &str = "cngate_frames_decoded_total";
/// Frames rejected by validation, labeled by kind.
pub const FRAMES_INVALID: &str = "cngate_frames_invalid_total";
/// Samples handed to the telemetry sink, labeled by stream.
pub const SAMPLES_EMITTED: &str = "cngate_samples_emitted_total";
/// Command lines that failed to parse.
pub const COMMAND_PARSE_ERRORS: &str = "cngate_command_parse_errors_total";
/// Commands encoded and written to the serial port.
pub const COMMANDS_SENT: &str = "cngate_commands_sent_total";
/// Sniffer packets forwarded to the connected client.
pub const SNIFFER_FORWARDED: &str = "cngate_sniffer_packets_forwarded_total";
/// Sniffer packets dropped: no client, queue full, or connection gone.
pub const SNIFFER_DROPPED: &str = "cngate_sniffer_packets_dropped_total";
/// Telemetry stream write failures, labeled by stream.
pub const SINK_WRITE_ERRORS: &str = "cngate_sink_write_errors_total";

/// Describe every counter once at startup.
pub fn describe_metrics() {
    describe_counter!(
        FRAMES_DECODED,
        "Complete frames decoded from the serial stream"
    );
    describe_counter!(FRAMES_INVALID, "Frames rejected by validation");
    describe_counter!(SAMPLES_EMITTED, "Samples handed to the telemetry sink");
    describe_counter!(
        COMMAND_PARSE_ERRORS,
        "Command lines rejected by the parser"
    );
    describe_counter!(COMMANDS_SENT, "Commands written to the serial port");
    describe_counter!(
        SNIFFER_FORWARDED,
        "Sniffer packets forwarded to the connected client"
    );
    describe_counter!(
        SNIFFER_DROPPED,
        "Sniffer packets dropped without a connected client"
    );
    describe_counter!(SINK_WRITE_ERRORS, "Telemetry stream write failures");
}
