use std::io::{self, Write};

use bytes::BytesMut;
use sensorpipe_frame::{encode_frame, FRAME_LEN};

use crate::cmd::SimulateArgs;
use crate::exit::{io_error, CliResult, SUCCESS};

/// Raw counts for frame `index`: a slow ramp on x, its mirror on y and a
/// constant quarter scale on z.
fn sample(index: usize) -> [i16; 3] {
    let ramp = ((index * 512) % 32768) as i16;
    [ramp, ramp.saturating_neg(), 8192]
}

pub fn run(args: SimulateArgs) -> CliResult<i32> {
    let mut out = io::stdout().lock();
    let written = write_frames(&args, &mut out)
        .and_then(|written| out.flush().map(|_| written))
        .map_err(|err| io_error("write failed", err))?;

    tracing::debug!(frames = args.count, bytes = written, "simulated frames written");
    Ok(SUCCESS)
}

/// Encode and write one frame at a time. Returns the number of bytes written.
fn write_frames<W: Write>(args: &SimulateArgs, out: &mut W) -> io::Result<u64> {
    let corrupt_every = args.corrupt_every.filter(|n| *n > 0);
    let mut frame = BytesMut::with_capacity(FRAME_LEN);
    let mut written = 0u64;

    for index in 0..args.count {
        frame.clear();
        encode_frame(args.frame_type.frame_type(index), sample(index), &mut frame);
        if corrupt_every.is_some_and(|every| (index + 1) % every == 0) {
            frame[FRAME_LEN - 1] ^= 0xFF;
        }
        out.write_all(&frame)?;
        written += FRAME_LEN as u64;
    }
    Ok(written)
}
