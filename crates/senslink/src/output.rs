use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use senslink_link::{Ack, LinkEvent, StatsSnapshot};
use senslink_transport::PortInfo;
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

pub fn print_event(event: &LinkEvent, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(event),
        OutputFormat::Table => {
            let mut table = new_table(vec!["EVENT", "DETAIL"]);
            table.add_row(vec![event_kind(event).to_string(), describe_event(event)]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{:<7} {}", event_kind(event), describe_event(event)),
    }
}

/// Hex dump from the debug tap. Kept on stderr so it never mixes with
/// machine-readable events.
pub fn print_wire_line(line: &str) {
    eprintln!("{line}");
}

#[derive(Serialize)]
struct SentOutput {
    command: u8,
    seq: u8,
}

pub fn print_sent(command: u8, seq: u8, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&SentOutput { command, seq }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["COMMAND", "SEQ"]);
            table.add_row(vec![format!("0x{command:02X}"), seq.to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("sent command=0x{command:02X} seq={seq}"),
    }
}

#[derive(Serialize)]
struct PortOutput<'a> {
    name: &'a str,
    kind: &'a str,
    product: Option<&'a str>,
    usb_id: Option<&'a str>,
}

pub fn print_ports(ports: &[PortInfo], format: OutputFormat) {
    let rows: Vec<PortOutput<'_>> = ports
        .iter()
        .map(|port| PortOutput {
            name: &port.name,
            kind: port.kind,
            product: port.product.as_deref(),
            usb_id: port.usb_id.as_deref(),
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Table => {
            let mut table = new_table(vec!["PORT", "KIND", "PRODUCT", "USB ID"]);
            for row in &rows {
                table.add_row(vec![
                    row.name,
                    row.kind,
                    row.product.unwrap_or("-"),
                    row.usb_id.unwrap_or("-"),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            if rows.is_empty() {
                println!("no serial ports found");
            }
            for row in &rows {
                match (row.product, row.usb_id) {
                    (Some(product), Some(id)) => {
                        println!("{} ({}, {product} [{id}])", row.name, row.kind)
                    }
                    _ => println!("{} ({})", row.name, row.kind),
                }
            }
        }
    }
}

pub fn print_stats(stats: &StatsSnapshot, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(stats),
        OutputFormat::Table => {
            let mut table = new_table(vec!["COUNTER", "VALUE"]);
            for (name, value) in stats_rows(stats) {
                table.add_row(vec![name.to_string(), value.to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let line: Vec<String> = stats_rows(stats)
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            println!("stats   {}", line.join(" "));
        }
    }
}

fn stats_rows(stats: &StatsSnapshot) -> [(&'static str, u64); 8] {
    [
        ("frames_received", stats.frames_received),
        ("frames_sent", stats.frames_sent),
        ("bytes_discarded", stats.bytes_discarded),
        ("checksum_failures", stats.checksum_failures),
        ("unknown_types", stats.unknown_types),
        ("protocol_violations", stats.protocol_violations),
        ("samples_recorded", stats.samples_recorded),
        ("sink_errors", stats.sink_errors),
    ]
}

fn event_kind(event: &LinkEvent) -> &'static str {
    match event {
        LinkEvent::Status(_) => "status",
        LinkEvent::Ack(_) => "ack",
        LinkEvent::Sample { .. } => "sample",
    }
}

fn describe_event(event: &LinkEvent) -> String {
    match event {
        LinkEvent::Status(status) => format!(
            "state={} sensors={}",
            status.state.name(),
            status.active_sensors
        ),
        LinkEvent::Ack(ack) => describe_ack(ack),
        LinkEvent::Sample { sample, recorded } => format!(
            "t={}ms adc={} voltage={:.4}V {}{}",
            sample.timestamp_ms,
            sample.adc_raw,
            sample.voltage,
            sample.contact.as_str(),
            if *recorded { " [rec]" } else { "" }
        ),
    }
}

fn describe_ack(ack: &Ack) -> String {
    let result = if ack.is_success() {
        "ok".to_string()
    } else {
        format!("error({})", ack.result)
    };
    format!("cmd=0x{:02X} seq={} result={result}", ack.cmd_id, ack.seq)
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

#[cfg(test)]
mod tests {
    use senslink_link::{DeviceState, Sample, StatusReport};

    use super::*;

    #[test]
    fn describes_status() {
        let event = LinkEvent::Status(StatusReport {
            state: DeviceState::Measuring,
            active_sensors: 2,
        });
        assert_eq!(describe_event(&event), "state=MEASURING sensors=2");
    }

    #[test]
    fn describes_failed_ack() {
        let ack = Ack {
            cmd_id: 0x02,
            seq: 7,
            result: 3,
        };
        assert_eq!(describe_ack(&ack), "cmd=0x02 seq=7 result=error(3)");
    }

    #[test]
    fn describes_recorded_sample() {
        let event = LinkEvent::Sample {
            sample: Sample::from_adc(16, 19264),
            recorded: true,
        };
        assert_eq!(
            describe_event(&event),
            "t=16ms adc=19264 voltage=0.6020V released [rec]"
        );
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = LinkEvent::Sample {
            sample: Sample::from_adc(1, 100),
            recorded: false,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "sample");
        assert_eq!(json["sample"]["contact"], "pressed");
    }
}
