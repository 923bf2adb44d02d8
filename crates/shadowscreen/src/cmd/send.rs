use std::time::Duration;

use bytes::Bytes;
use shadowscreen::frame::{FrameConfig, FrameError};
use shadowscreen::mirror::RecordSink;
use shadowscreen::record::{FrameRecord, ParameterSets, SequenceCounter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cmd::{parse_endpoint, spawn_interrupt_handler, SendArgs};
use crate::exit::{frame_error, io_error, mirror_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_summary, OutputFormat, Summary};

// Minimal HEVC-shaped VPS/SPS/PPS headers; consumers treat them as opaque.
const SYNTHETIC_VPS: &[u8] = &[0x40, 0x01, 0x0c, 0x01, 0xff, 0xff];
const SYNTHETIC_SPS: &[u8] = &[0x42, 0x01, 0x01, 0x01, 0x60, 0x00];
const SYNTHETIC_PPS: &[u8] = &[0x44, 0x01, 0xc1, 0x72, 0xb4, 0x62];

pub async fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let frame_interval = frame_interval(args.fps)?;
    let endpoint = parse_endpoint(&args.endpoint)?;
    let payload = resolve_payload(&args).await?;

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let (sink, drain) = RecordSink::connect(&endpoint, FrameConfig::default(), cancel.clone())
        .await
        .map_err(|err| mirror_error("connect failed", err))?;
    let parameter_sets = synthetic_parameter_sets();
    let mut counter = SequenceCounter::new();
    let mut ticker = tokio::time::interval(frame_interval);
    let mut summary = Summary::default();

    for index in 0..args.frames {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if sink.queue().is_broken() {
            break;
        }
        let record = FrameRecord::new(
            counter.next_sequence(),
            f64::from(index) / args.fps,
            args.nal_length,
            parameter_sets.clone(),
            payload.clone(),
        );
        sink.submit(&record)
            .map_err(|err| mirror_error("encode failed", err))?;
        summary.records += 1;
        summary.bytes += record.encoded_len() as u64;
        debug!(
            seq = record.sequence_number,
            pending = sink.queue().pending(),
            "frame record queued"
        );
    }

    sink.close();
    match drain.join().await {
        Ok(()) => {}
        Err(FrameError::Cancelled) => {
            warn!(
                pending = sink.queue().pending(),
                "interrupted before the queue was flushed"
            );
        }
        Err(err) => return Err(frame_error("send failed", err)),
    }

    info!(records = summary.records, bytes = summary.bytes, "send finished");
    print_summary(&summary, format);
    Ok(SUCCESS)
}

fn frame_interval(fps: f64) -> CliResult<Duration> {
    if !(fps.is_finite() && fps > 0.0) {
        return Err(CliError::new(USAGE, "--fps must be a positive number"));
    }
    let interval = Duration::try_from_secs_f64(1.0 / fps)
        .map_err(|err| CliError::new(USAGE, format!("invalid --fps {fps}: {err}")))?;
    Ok(interval.max(Duration::from_nanos(1)))
}

async fn resolve_payload(args: &SendArgs) -> CliResult<Bytes> {
    if let Some(path) = &args.payload_file {
        let data = tokio::fs::read(path)
            .await
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
        return Ok(Bytes::from(data));
    }
    Ok(synthetic_payload(args.payload_size))
}

fn synthetic_payload(size: usize) -> Bytes {
    (0..size).map(|i| (i % 251) as u8).collect::<Vec<_>>().into()
}

fn synthetic_parameter_sets() -> ParameterSets {
    ParameterSets::new(
        Bytes::from_static(SYNTHETIC_VPS),
        Bytes::from_static(SYNTHETIC_SPS),
        Bytes::from_static(SYNTHETIC_PPS),
    )
}
