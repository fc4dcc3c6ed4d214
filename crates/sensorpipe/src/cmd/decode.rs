use std::fs::File;
use std::io::Read;
use std::path::Path;

use sensorpipe_decode::{Decode, DecodeError, Decoder, StructuredRecord};
use sensorpipe_frame::{ChunkReader, FrameError};

use crate::cmd::{check_chunk_size, DecodeArgs};
use crate::exit::{config_error, decode_error, frame_error, io_error, CliResult, SUCCESS};
use crate::output::{print_records, print_stats, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let chunk_size = check_chunk_size(args.chunk_size)?;
    let config = args.decoder.load()?;
    let mut decoder =
        Decoder::from_config(config).map_err(|err| config_error("invalid decoder config", err))?;

    let source = args.file.display().to_string();
    let mut reader = ChunkReader::with_chunk_size(open_input(&args.file)?, chunk_size);

    // Tables are rendered once at the end; line formats stream.
    let mut table_rows: Vec<StructuredRecord> = Vec::new();
    let mut last_error: Option<DecodeError> = None;

    loop {
        let chunk = match reader.read_chunk() {
            Ok(chunk) => chunk,
            Err(FrameError::ConnectionClosed) => break,
            Err(err) => return Err(frame_error("read failed", err)),
        };

        match decoder.decode(chunk.into()) {
            Ok(records) => match format {
                OutputFormat::Table => table_rows.extend(records),
                _ => print_records(&records, &source, format),
            },
            Err(err) => {
                tracing::warn!(decoder = decoder.name(), error = %err, "chunk rejected");
                last_error = Some(err);
            }
        }
    }

    print_records(&table_rows, &source, format);
    let stats = decoder.stats();
    if args.stats {
        print_stats(stats, &source, decoder.name(), format);
    }

    tracing::info!(
        source = %source,
        records = stats.records_decoded,
        errors = stats.decode_errors,
        resyncs = stats.resync_events,
        "decode finished"
    );

    match last_error {
        Some(err) if stats.records_decoded == 0 => Err(decode_error("no records decoded", err)),
        _ => Ok(SUCCESS),
    }
}

fn open_input(path: &Path) -> CliResult<Box<dyn Read>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(std::io::stdin().lock()));
    }
    let file = File::open(path).map_err(|err| io_error(&format!("open {}", path.display()), err))?;
    Ok(Box::new(file))
}
