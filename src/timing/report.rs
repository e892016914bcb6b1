//! CSV serialisation of a [`super::TimingLog`]: the per-event "Report" table
//! and the aggregated "Summary" table.
//!
//! Both formats share a header block reproducing the workload's
//! human-readable description; only the body rows differ. Serialisation goes
//! through the `csv` crate rather than hand-built strings, the way the rest
//! of this crate's on-disk formats go through a real crate (`serde_yaml` for
//! configuration).

use std::io::Write;

use serde::Serialize;

use super::{si_prefix, EventId, TimeRatio, TimingLog};
use crate::error::HarnessError;

fn csv_err(err: csv::Error) -> HarnessError {
    HarnessError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
}

/// Everything a report or summary's header block reproduces.
#[derive(Debug, Clone)]
pub struct ReportHeader {
    /// Workload display name.
    pub workload_name: String,
    /// Backend scheme name.
    pub scheme: String,
    /// Latency or Offline, as text.
    pub category: String,
    /// Data type, as text.
    pub data_type: String,
    /// `cipher_param_mask` rendered as a bitstring, low bit first.
    pub cipher_mask_bits: String,
    /// Backend security-level name.
    pub security: String,
    /// Backend's free-form `other` field.
    pub extra_code: i64,
    /// Resolved workload parameters as `name=value` pairs.
    pub params: Vec<String>,
}

impl ReportHeader {
    fn write_block(&self, out: &mut impl Write) -> Result<(), HarnessError> {
        writeln!(out, "# workload,{}", self.workload_name)?;
        writeln!(out, "# scheme,{}", self.scheme)?;
        writeln!(out, "# category,{}", self.category)?;
        writeln!(out, "# data_type,{}", self.data_type)?;
        writeln!(out, "# cipher_mask,{}", self.cipher_mask_bits)?;
        writeln!(out, "# security,{}", self.security)?;
        writeln!(out, "# extra_code,{}", self.extra_code)?;
        writeln!(out, "# params,{}", self.params.join(";"))?;
        Ok(())
    }
}

#[derive(Serialize)]
struct ReportRow {
    event_id: String,
    iteration: u64,
    input_sample_count: u64,
    wall_start: u64,
    wall_end: u64,
    cpu_start: u64,
    cpu_end: u64,
}

/// Writes the Report CSV: header block, then one row per recorded event, in
/// recording order.
pub fn write_report(
    out: &mut impl Write,
    header: &ReportHeader,
    log: &TimingLog,
) -> Result<(), HarnessError> {
    header.write_block(out)?;
    let mut writer = csv::WriterBuilder::new().from_writer(out);
    for event in log.events() {
        writer.serialize(ReportRow {
            event_id: event.event_id.to_string(),
            iteration: event.iteration,
            input_sample_count: event.input_sample_count,
            wall_start: event.wall_start,
            wall_end: event.wall_end,
            cpu_start: event.cpu_start,
            cpu_end: event.cpu_end,
        })
        .map_err(csv_err)?;
    }
    writer.flush().map_err(HarnessError::Io)?;
    Ok(())
}

#[derive(Serialize)]
struct SummaryRow {
    event_id: String,
    count: u64,
    total: f64,
    mean: f64,
    variance: f64,
    min: f64,
    max: f64,
    ratio_numerator: u64,
    ratio_denominator: u64,
    si_prefix: String,
}

/// Writes the Summary CSV: header block, then one row per event id with
/// count/total/mean/variance/min/max and the chosen SI prefix for the mean.
pub fn write_summary(
    out: &mut impl Write,
    header: &ReportHeader,
    log: &TimingLog,
    ratio: TimeRatio,
) -> Result<(), HarnessError> {
    header.write_block(out)?;
    let mut writer = csv::WriterBuilder::new().from_writer(out);
    for (event_id, stats) in log.stats() {
        let (_, prefix) = si_prefix(ratio.convert(stats.mean() as u64));
        writer.serialize(SummaryRow {
            event_id: event_id.to_string(),
            count: stats.count(),
            total: stats.total(),
            mean: stats.mean(),
            variance: stats.variance(),
            min: stats.min(),
            max: stats.max(),
            ratio_numerator: ratio.numerator,
            ratio_denominator: ratio.denominator,
            si_prefix: prefix.to_string(),
        })
        .map_err(csv_err)?;
    }
    writer.flush().map_err(HarnessError::Io)?;
    Ok(())
}

/// Reads back a Report CSV's body rows (skipping the `#`-prefixed header
/// block) and regenerates the summary that would have been produced from it
/// at run time.
pub fn summary_from_report(bytes: &[u8]) -> Result<TimingLog, HarnessError> {
    let body_start = header_block_len(bytes);
    let mut reader = csv::ReaderBuilder::new().from_reader(&bytes[body_start..]);
    let mut log = TimingLog::new();
    for result in reader.deserialize::<ReportRowOwned>() {
        let row = result.map_err(csv_err)?;
        log.record(super::TimingEvent {
            event_id: leak_event_id(row.event_id),
            iteration: row.iteration,
            input_sample_count: row.input_sample_count,
            wall_start: row.wall_start,
            wall_end: row.wall_end,
            cpu_start: row.cpu_start,
            cpu_end: row.cpu_end,
        });
    }
    Ok(log)
}

#[derive(serde::Deserialize)]
struct ReportRowOwned {
    event_id: String,
    iteration: u64,
    input_sample_count: u64,
    wall_start: u64,
    wall_end: u64,
    cpu_start: u64,
    cpu_end: u64,
}

/// Byte length of the leading run of `#`-prefixed header lines.
fn header_block_len(bytes: &[u8]) -> usize {
    let mut offset = 0;
    loop {
        let rest = &bytes[offset..];
        if !rest.starts_with(b"#") {
            return offset;
        }
        let line_len = rest.iter().position(|&b| b == b'\n').map_or(rest.len(), |i| i + 1);
        offset += line_len;
    }
}

/// [`EventId`] is `&'static str`; a round-tripped report only has an owned
/// `String`, so this leaks one small string per distinct event id
/// encountered while replaying a report. Event ids are a small fixed set of
/// stage names, so this never grows unboundedly.
fn leak_event_id(s: String) -> EventId {
    Box::leak(s.into_boxed_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::TimingEvent;

    fn sample_header() -> ReportHeader {
        ReportHeader {
            workload_name: "ElementwiseAdd".to_string(),
            scheme: "mock-scheme-0".to_string(),
            category: "Latency".to_string(),
            data_type: "Int64".to_string(),
            cipher_mask_bits: "11".to_string(),
            security: "mock-security-0-0".to_string(),
            extra_code: 0,
            params: vec!["n=4".to_string()],
        }
    }

    fn sample_log() -> TimingLog {
        let mut log = TimingLog::new();
        for i in 0..5u64 {
            log.record(TimingEvent {
                event_id: "operate",
                iteration: i,
                input_sample_count: 1,
                wall_start: i * 1000,
                wall_end: i * 1000 + 500,
                cpu_start: i * 1000,
                cpu_end: i * 1000 + 500,
            });
        }
        log
    }

    #[test]
    fn report_round_trips_into_an_equivalent_summary() {
        let header = sample_header();
        let log = sample_log();

        let mut report_bytes = Vec::new();
        write_report(&mut report_bytes, &header, &log).unwrap();

        let mut summary_bytes = Vec::new();
        write_summary(&mut summary_bytes, &header, &log, TimeRatio::NANOSECONDS).unwrap();

        let replayed = summary_from_report(&report_bytes).unwrap();
        let mut replayed_summary_bytes = Vec::new();
        write_summary(&mut replayed_summary_bytes, &header, &replayed, TimeRatio::NANOSECONDS).unwrap();

        assert_eq!(summary_bytes, replayed_summary_bytes);
    }
}
