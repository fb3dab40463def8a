/// I/O helpers shared by the dataset readers and corpus writers.

use std::io::prelude::*;
use std::io::{BufReader, BufWriter};
use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use indicatif::{ProgressBar, ProgressStyle};

/// Create a byte-oriented progress bar for scanning a file.
pub fn make_progress() -> ProgressBar {
  let style = ProgressStyle::default_bar()
    .template("{prefix:16}: {bar:25} {bytes}/{total_bytes} (eta {eta})");
  let pb = ProgressBar::new(0);
  pb.set_style(style);
  pb
}

/// Whether a path names a gzip-compressed file.
pub fn is_gzip(path: &Path) -> bool {
  path.extension().map_or(false, |ext| ext == "gz")
}

/// Open an input file for line reading, decompressing if it is gzipped.
///
/// Progress is tracked on the compressed bytes, so the bar reaches its
/// length at end of file either way.
pub fn open_gzin(path: &Path, pb: &ProgressBar) -> Result<Box<dyn BufRead>> {
  let file = File::open(path).with_context(|| format!("cannot open {:?}", path))?;
  pb.set_length(file.metadata()?.len());
  let pbr = pb.wrap_read(file);
  if is_gzip(path) {
    Ok(Box::new(BufReader::new(MultiGzDecoder::new(pbr))))
  } else {
    Ok(Box::new(BufReader::new(pbr)))
  }
}

/// Write raw bytes to a new file.
pub fn write_bytes(path: &Path, data: &[u8]) -> Result<()> {
  std::fs::write(path, data).with_context(|| format!("cannot write {:?}", path))?;
  Ok(())
}

/// Write each item on its own `\n`-terminated line.
pub fn write_lines<I, S>(path: &Path, lines: I) -> Result<usize>
where
  I: IntoIterator<Item = S>,
  S: AsRef<str>,
{
  let file = File::create(path).with_context(|| format!("cannot create {:?}", path))?;
  let mut out = BufWriter::new(file);
  let mut n = 0;
  for line in lines {
    out.write_all(line.as_ref().as_bytes())?;
    out.write_all(b"\n")?;
    n += 1;
  }
  out.flush()?;
  Ok(n)
}

/// Count the lines in a text file.
pub fn count_lines(path: &Path) -> Result<usize> {
  let file = File::open(path).with_context(|| format!("cannot open {:?}", path))?;
  let read = BufReader::new(file);
  let mut n = 0;
  for line in read.lines() {
    line?;
    n += 1;
  }
  Ok(n)
}
