use std::path::Path;

use futures_util::SinkExt;
use shadowscreen::frame::{AtomCodec, FrameConfig};
use shadowscreen::mirror::RecordSource;
use shadowscreen::transport::MirrorListener;
use tokio::fs::{File, OpenOptions};
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cmd::{parse_endpoint, spawn_interrupt_handler, ListenArgs};
use crate::exit::{frame_error, io_error, mirror_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_frame, print_summary, OutputFormat, Summary};

type DumpWriter = FramedWrite<File, AtomCodec>;

pub async fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let endpoint = parse_endpoint(&args.endpoint)?;
    let listener = MirrorListener::bind(&endpoint)
        .await
        .map_err(|err| transport_error("bind failed", err))?;
    let local = listener.local_endpoint();
    info!(endpoint = %local, "listening");

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let mut config = FrameConfig::default();
    if let Some(max) = args.max_message_size {
        config.max_message_size = max;
    }
    let accepted = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(SUCCESS),
        accepted = RecordSource::accept(&listener, config.clone(), cancel.clone()) => accepted,
    };
    let mut source = accepted.map_err(|err| mirror_error("accept failed", err))?;

    let mut dump = match &args.dump {
        Some(path) => Some(open_dump(path, config.max_message_size).await?),
        None => None,
    };

    let source_name = local.to_string();
    let mut summary = Summary::default();

    while let Some(item) = source.next_frame().await {
        match item {
            Ok(frame) => {
                if let Some(dump) = dump.as_mut() {
                    dump.send(frame.message.clone())
                        .await
                        .map_err(|err| frame_error("dump write failed", err))?;
                }
                print_frame(&frame, &source_name, format);
                summary.records += 1;
                summary.bytes += frame.message.len() as u64;
                if args.count.is_some_and(|count| summary.records >= count) {
                    break;
                }
            }
            Err(err) if !err.is_fatal() => summary.malformed += 1,
            Err(err) => return Err(mirror_error("receive failed", err)),
        }
    }
    summary.gaps = source.gap_count();

    if let Some(mut dump) = dump {
        dump.close()
            .await
            .map_err(|err| frame_error("dump flush failed", err))?;
    }
    if summary.gaps > 0 {
        warn!(gaps = summary.gaps, "sequence gaps observed");
    }
    info!(records = summary.records, bytes = summary.bytes, "listen finished");
    print_summary(&summary, format);
    Ok(SUCCESS)
}

async fn open_dump(path: &Path, max_message_size: usize) -> CliResult<DumpWriter> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|err| io_error(&format!("failed opening {}", path.display()), err))?;
    Ok(FramedWrite::new(
        file,
        AtomCodec::with_max_message_size(max_message_size),
    ))
}
