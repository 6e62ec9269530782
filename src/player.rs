//! WAV file → volume scale → mono-to-stereo → I2S
//!
//! One call plays one file start to finish on the calling thread. The only
//! wait is inside the I2S write; there is no way to stop a file from outside
//! once it has started.

use crate::{
    i2s::{AudioOutput, I2sPort},
    storage::FilePath,
    volume::{Volume, VolumeControl},
    wav::{self, WavError},
};
use anyhow::{Context, Result};
use log::{debug, error, info, trace};
use std::{
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    path::Path,
    sync::mpsc::Receiver,
    time::Duration,
};

/// Capacity of the read buffer.
pub const READ_BUF_BYTES: usize = 1024;
/// Stereo frames converted per chunk; bytes beyond this in one read are dropped.
pub const MAX_FRAMES_PER_CHUNK: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackOptions {
    /// Bytes requested per read, capped at [`READ_BUF_BYTES`].
    pub read_chunk_bytes: usize,
    /// `None` waits on the peripheral forever.
    pub write_timeout: Option<Duration>,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            read_chunk_bytes: MAX_FRAMES_PER_CHUNK * 2,
            write_timeout: None,
        }
    }
}

/// What one playback did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Playback {
    pub bytes_read: u32,
    pub frames_written: usize,
    /// `false` when the source ran dry before the declared data size.
    pub complete: bool,
}

pub struct Player<P, V> {
    output: AudioOutput<P>,
    volume: V,
    options: PlaybackOptions,
}

impl<P: I2sPort, V: VolumeControl> Player<P, V> {
    pub fn new(output: AudioOutput<P>, volume: V) -> Self {
        Self::with_options(output, volume, PlaybackOptions::default())
    }

    pub fn with_options(output: AudioOutput<P>, volume: V, options: PlaybackOptions) -> Self {
        Self {
            output,
            volume,
            options,
        }
    }

    pub fn output(&self) -> &AudioOutput<P> {
        &self.output
    }

    pub fn into_output(self) -> AudioOutput<P> {
        self.output
    }

    /// Opens `path` and plays it. A missing file never touches the peripheral.
    pub fn play(&mut self, path: impl AsRef<Path>) -> Result<Playback> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                error!("Missing: {}", path.display());
                return Err(e).with_context(|| format!("open {}", path.display()));
            }
        };
        self.play_from(file, &path.display().to_string())
    }

    /// Parses the header of `src`, configures the output for its rate and
    /// streams the data chunk. `src` is dropped (closed) on return.
    pub fn play_from<R: Read + Seek>(&mut self, mut src: R, name: &str) -> Result<Playback> {
        let info = match wav::parse(&mut src) {
            Ok(info) => info,
            Err(e) => {
                log_rejected(&e, name);
                return Err(e).with_context(|| format!("parse {name}"));
            }
        };
        debug!(
            "{name}: {} Hz, {} B @ {}",
            info.sample_rate, info.data_size, info.data_offset
        );

        self.output.configure(info.sample_rate)?;
        src.seek(SeekFrom::Start(u64::from(info.data_offset)))?;

        let playback = self.stream(&mut src, info.data_size)?;
        info!(
            "{name}: {} frames{}",
            playback.frames_written,
            if playback.complete { "" } else { " (short file)" }
        );
        Ok(playback)
    }

    /// Streams up to `data_size` bytes of LE i16 mono PCM from `src`.
    ///
    /// Volume is sampled before every chunk. A read that ends mid-sample keeps
    /// the odd byte for the next chunk. An empty or failed read ends the
    /// stream without error; a failed write or volume read aborts it.
    pub fn stream<R: Read>(&mut self, src: &mut R, data_size: u32) -> Result<Playback> {
        let mut buf = [0u8; READ_BUF_BYTES];
        let mut frames = [0i16; MAX_FRAMES_PER_CHUNK * 2];
        let chunk = self.options.read_chunk_bytes.clamp(2, READ_BUF_BYTES);

        let mut left = data_size;
        let mut playback = Playback::default();
        // low byte of a sample split across two reads
        let mut carry: Option<u8> = None;

        while left > 0 {
            let volume = self.volume.read()?;

            let start = usize::from(carry.is_some());
            if let Some(low) = carry {
                buf[0] = low;
            }
            let want = (chunk - start).min(left as usize);
            let n = match src.read(&mut buf[start..start + want]) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("read stopped: {e}");
                    break;
                }
            };
            left -= n as u32;
            playback.bytes_read += n as u32;

            let filled = start + n;
            let count = upmix(&buf[..filled], volume, &mut frames);
            carry = (filled % 2 == 1 && count == filled / 2).then(|| buf[filled - 1]);
            trace!("chunk {n} B → {count} frames @ {:.2}", volume.fraction());
            if count == 0 {
                continue;
            }
            self.output
                .write(&frames[..count * 2], self.options.write_timeout)
                .context("I2S write")?;
            playback.frames_written += count;
        }

        playback.complete = left == 0;
        Ok(playback)
    }
}

/// Scales each LE i16 sample and writes it to both slots of a frame.
/// Returns the frame count, bounded by `out.len() / 2`; a trailing odd byte is left to the caller.
fn upmix(bytes: &[u8], volume: Volume, out: &mut [i16]) -> usize {
    let mut count = 0;
    for (pair, frame) in bytes.chunks_exact(2).zip(out.chunks_exact_mut(2)) {
        let s = volume.apply(i16::from_le_bytes([pair[0], pair[1]]));
        frame[0] = s; // L
        frame[1] = s; // R
        count += 1;
    }
    count
}

fn log_rejected(e: &WavError, name: &str) {
    match e {
        WavError::NotRiff => error!("Not RIFF: {name}"),
        WavError::NotWave => error!("Not WAVE: {name}"),
        WavError::Io(io) => error!("Read error {name}: {io}"),
        other => error!("Bad WAV fmt (need mono 16-bit PCM): {name}: {other}"),
    }
}

/// Playback worker: plays every path received, in order, until all senders
/// are gone. A file that fails is logged and skipped.
pub fn serve<P, V>(mut player: Player<P, V>, rx: Receiver<FilePath>) -> Player<P, V>
where
    P: I2sPort,
    V: VolumeControl,
{
    while let Ok(path) = rx.recv() {
        info!("audio_worker: {path}");
        if let Err(e) = player.play(path.as_str()) {
            error!("playback failed: {e:?}");
        }
    }
    player
}
