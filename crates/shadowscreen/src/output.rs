use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use shadowscreen::mirror::ReceivedFrame;
use shadowscreen::record::{FrameRecord, Gap, ParameterSetKind};

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct GapOutput {
    expected: u32,
    received: u32,
    missing: u32,
    regression: bool,
}

impl From<Gap> for GapOutput {
    fn from(gap: Gap) -> Self {
        Self {
            expected: gap.expected,
            received: gap.received,
            missing: gap.missing(),
            regression: gap.is_regression(),
        }
    }
}

#[derive(Serialize)]
struct RecordOutput<'a> {
    source: &'a str,
    sequence_number: u32,
    presentation_time: f64,
    nal_unit_header_length: u8,
    vps_size: usize,
    sps_size: usize,
    pps_size: usize,
    payload_size: usize,
    message_size: usize,
    gap: Option<GapOutput>,
}

impl<'a> RecordOutput<'a> {
    fn new(frame: &ReceivedFrame, source: &'a str) -> Self {
        let record = &frame.record;
        let sets = &record.parameter_sets;
        Self {
            source,
            sequence_number: record.sequence_number,
            presentation_time: record.presentation_time,
            nal_unit_header_length: record.nal_unit_header_length,
            vps_size: sets.get(ParameterSetKind::Video).len(),
            sps_size: sets.get(ParameterSetKind::Sequence).len(),
            pps_size: sets.get(ParameterSetKind::Picture).len(),
            payload_size: record.payload.len(),
            message_size: frame.message.len(),
            gap: frame.gap.map(GapOutput::from),
        }
    }
}

pub fn print_frame(frame: &ReceivedFrame, source: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = RecordOutput::new(frame, source);
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let record = &frame.record;
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SEQ", "PTS", "NAL", "VPS/SPS/PPS", "PAYLOAD", "GAP"])
                .add_row(vec![
                    record.sequence_number.to_string(),
                    format!("{:.3}", record.presentation_time),
                    record.nal_unit_header_length.to_string(),
                    parameter_set_sizes(record),
                    record.payload.len().to_string(),
                    gap_label(frame.gap),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let record = &frame.record;
            println!(
                "seq={} pts={:.3} nal={} sets={} payload={} gap={} source={}",
                record.sequence_number,
                record.presentation_time,
                record.nal_unit_header_length,
                parameter_set_sizes(record),
                record.payload.len(),
                gap_label(frame.gap),
                source,
            );
        }
    }
}

/// Totals for one `listen`, `send` or `inspect` run.
#[derive(Debug, Default, Serialize)]
pub struct Summary {
    pub records: u64,
    pub bytes: u64,
    pub gaps: u64,
    pub malformed: u64,
}

pub fn print_summary(summary: &Summary, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&serde_json::json!({ "summary": summary }))
                    .unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["RECORDS", "BYTES", "GAPS", "MALFORMED"])
                .add_row(vec![
                    summary.records.to_string(),
                    summary.bytes.to_string(),
                    summary.gaps.to_string(),
                    summary.malformed.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "records={} bytes={} gaps={} malformed={}",
                summary.records, summary.bytes, summary.gaps, summary.malformed
            );
        }
    }
}

fn parameter_set_sizes(record: &FrameRecord) -> String {
    record
        .parameter_sets
        .iter()
        .map(|(_, set)| set.len().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn gap_label(gap: Option<Gap>) -> String {
    match gap {
        None => "-".to_string(),
        Some(gap) if gap.is_regression() => {
            format!("restart (expected {})", gap.expected)
        }
        Some(gap) => format!("{} missing", gap.missing()),
    }
}
