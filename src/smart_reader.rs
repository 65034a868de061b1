use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;

/// Path that stands for standard input.
pub const STDIN: &str = "-";

/// Opens a file (or stdin for `-`) and transparently peels off GZIP/BGZF
/// layers to expose the underlying text or binary stream.
pub fn open_input(path: &Path) -> io::Result<Box<dyn BufRead + Send>> {
    let mut reader: Box<dyn BufRead + Send> = if path == Path::new(STDIN) {
        Box::new(BufReader::new(io::stdin()))
    } else {
        Box::new(BufReader::new(File::open(path)?))
    };

    // Nested gzip layers peeled at most this many times.
    const MAX_DEPTH: usize = 4;

    for _ in 0..MAX_DEPTH {
        if !is_gzip(reader.fill_buf()?) {
            break;
        }
        tracing::debug!(path = %path.display(), "detected GZIP/BGZF layer");
        // MultiGzDecoder handles BGZF blocks and concatenated members.
        reader = Box::new(BufReader::new(MultiGzDecoder::new(reader)));
    }

    Ok(reader)
}

fn is_gzip(buf: &[u8]) -> bool {
    buf.len() >= 2 && buf[0] == 0x1f && buf[1] == 0x8b
}
