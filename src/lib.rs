//! WAV playback for the battleship board: flash file → volume pot → I2S DAC.
//!
//! Only mono 16-bit PCM is played. [`player::Player`] owns the I2S output and
//! the volume source; the device bindings live behind `target_os = "espidf"`.

pub mod i2s;
pub mod player;
pub mod storage;
pub mod volume;
pub mod wav;

#[cfg(test)]
mod util;

pub use i2s::{AudioOutput, I2sPort};
pub use player::{Playback, PlaybackOptions, Player};
pub use volume::{Volume, VolumeControl};
pub use wav::{WavError, WavInfo};
