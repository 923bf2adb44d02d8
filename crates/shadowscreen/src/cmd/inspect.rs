use shadowscreen::frame::{AtomCodec, FrameError};
use shadowscreen::mirror::{MirrorError, RecordSource};
use tokio_util::codec::FramedRead;
use tracing::warn;

use crate::cmd::InspectArgs;
use crate::exit::{io_error, mirror_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_frame, print_summary, OutputFormat, Summary};

pub async fn run(args: InspectArgs, format: OutputFormat) -> CliResult<i32> {
    let file = tokio::fs::File::open(&args.file)
        .await
        .map_err(|err| io_error(&format!("failed opening {}", args.file.display()), err))?;
    let source_name = args.file.display().to_string();
    let mut source = RecordSource::new(FramedRead::new(file, AtomCodec::new()));
    let mut summary = Summary::default();
    let mut failure = None;

    while let Some(item) = source.next_frame().await {
        match item {
            Ok(frame) => {
                print_frame(&frame, &source_name, format);
                summary.records += 1;
                summary.bytes += frame.message.len() as u64;
            }
            Err(err) if !err.is_fatal() => {
                warn!(%err, after = summary.records, "skipping malformed record");
                summary.malformed += 1;
            }
            // Short body at end of file.
            Err(MirrorError::Frame(FrameError::ConnectionClosed)) => {
                failure = Some(CliError::new(
                    DATA_INVALID,
                    "dump file is corrupt: truncated message body",
                ));
            }
            Err(err) => failure = Some(mirror_error("dump file is corrupt", err)),
        }
    }
    summary.gaps = source.gap_count();
    print_summary(&summary, format);

    if let Some(err) = failure {
        return Err(err);
    }
    if summary.malformed > 0 {
        return Ok(DATA_INVALID);
    }
    Ok(SUCCESS)
}
