//! Byte-sampling row-count estimation.
//!
//! Planning a pipeline run needs row counts for progress totals, but the
//! fact files run to millions of lines — counting them would cost a full
//! read per file before the import even starts. Instead: read the header,
//! sample the first data lines, and extrapolate from the file size.

use std::{
  fs::File,
  io::{self, BufRead, BufReader},
  path::Path,
};

use crate::Result;

/// Initial sample size in data lines.
const SAMPLE_LINES: u64 = 100;
/// Extended sample size, used once the running extrapolation suggests the
/// file is large enough that 100 lines give a noisy average.
const LARGE_SAMPLE_LINES: u64 = 1000;
/// Extrapolated row count above which the sample is extended.
const LARGE_FILE_ROWS: u64 = 10_000;

/// Estimate the number of data rows in `path`.
///
/// Exact when the file ends within the sample; otherwise accurate to the
/// variance of line lengths (within a factor of two for realistic data).
/// Returns `None` when the file does not exist.
pub fn estimate_row_count(path: &Path) -> Result<Option<u64>> {
  let file = match File::open(path) {
    Ok(f) => f,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
    Err(e) => return Err(e.into()),
  };
  let file_size = file.metadata()?.len();
  let mut reader = BufReader::new(file);

  let mut line = String::new();
  let header_bytes = reader.read_line(&mut line)? as u64;
  if header_bytes == 0 {
    return Ok(Some(0));
  }

  let mut sampled_lines = 0u64;
  let mut sampled_bytes = 0u64;
  let mut cap = SAMPLE_LINES;

  loop {
    while sampled_lines < cap {
      line.clear();
      let n = reader.read_line(&mut line)? as u64;
      if n == 0 {
        // EOF inside the sample: the count is exact.
        return Ok(Some(sampled_lines));
      }
      sampled_lines += 1;
      sampled_bytes += n;
    }

    let estimate = extrapolate(file_size, header_bytes, sampled_bytes, sampled_lines);
    if cap == SAMPLE_LINES && estimate > LARGE_FILE_ROWS {
      cap = LARGE_SAMPLE_LINES;
      continue;
    }
    return Ok(Some(estimate));
  }
}

fn extrapolate(
  file_size: u64,
  header_bytes: u64,
  sampled_bytes: u64,
  sampled_lines: u64,
) -> u64 {
  let data_bytes = file_size.saturating_sub(header_bytes);
  let avg = sampled_bytes as f64 / sampled_lines as f64;
  (data_bytes as f64 / avg).ceil() as u64
}
