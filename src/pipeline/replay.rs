use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
    thread,
};

use crossbeam_channel::Sender;

use crate::{
    error::{Error, Result},
    types::ObservationFrame,
};

/// Anything that yields observation frames in capture order.
pub trait ObservationSource: Send + 'static {
    fn next_frame(&mut self) -> Result<Option<ObservationFrame>>;
}

/// Recorded observations, one JSON object per line.
pub struct JsonlReplay<R> {
    reader: R,
    line: usize,
    buf: String,
}

impl JsonlReplay<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        log::info!("replaying observations from {}", path.display());
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> JsonlReplay<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
        }
    }
}

impl<R: BufRead + Send + 'static> ObservationSource for JsonlReplay<R> {
    fn next_frame(&mut self) -> Result<Option<ObservationFrame>> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line += 1;

            let trimmed = self.buf.trim();
            if trimmed.is_empty() {
                continue;
            }

            return serde_json::from_str(trimmed)
                .map(Some)
                .map_err(|source| Error::Decode {
                    line: self.line,
                    source,
                });
        }
    }
}

/// Feed every frame from `source` into `frame_tx` until the source runs dry.
///
/// The thread returns how many frames it sent.
pub fn start_replay<S: ObservationSource>(
    mut source: S,
    frame_tx: Sender<ObservationFrame>,
) -> thread::JoinHandle<Result<u64>> {
    thread::spawn(move || {
        let mut sent = 0u64;
        loop {
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(err) => {
                    log::error!("observation source failed after {sent} frames: {err}");
                    return Err(err);
                }
            };

            if frame_tx.send(frame).is_err() {
                log::warn!("classifier worker gone, stopping replay");
                return Err(Error::Channel("observation frames"));
            }
            sent += 1;
        }
        log::debug!("replay finished, {sent} frames sent");
        Ok(sent)
    })
}
