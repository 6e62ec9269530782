use anyhow::Result;
use log::info;
use std::time::Duration;

/// DMA descriptors handed to the driver.
pub const DMA_BUFFER_COUNT: u32 = 8;
/// Frames per DMA descriptor.
pub const DMA_FRAMES_PER_BUFFER: u32 = 256;

/// The audio peripheral as seen by the player.
///
/// Output is always controller/TX, Philips standard slots, 16-bit stereo.
pub trait I2sPort {
    /// Tears down any installed driver and installs a fresh one at `sample_rate`.
    fn reinstall(&mut self, sample_rate: u32) -> Result<()>;

    /// Queues interleaved L/R frames. `None` blocks until the DMA queue takes
    /// every byte, so a wedged peripheral hangs the caller.
    fn write_frames(&mut self, frames: &[i16], timeout: Option<Duration>) -> Result<()>;
}

/// Owns the port and remembers which rate it was last set up for.
pub struct AudioOutput<P> {
    port: P,
    sample_rate: u32,
}

impl<P: I2sPort> AudioOutput<P> {
    pub fn new(port: P) -> Self {
        Self {
            port,
            sample_rate: 0,
        }
    }

    /// Rate the port currently runs at, `None` before the first successful configure.
    pub fn sample_rate(&self) -> Option<u32> {
        (self.sample_rate != 0).then_some(self.sample_rate)
    }

    /// No-op when `sample_rate` is already active; otherwise reinstalls the driver.
    pub fn configure(&mut self, sample_rate: u32) -> Result<()> {
        if sample_rate != 0 && sample_rate == self.sample_rate {
            return Ok(());
        }

        // old driver is gone after this point even if the install fails
        self.sample_rate = 0;
        self.port.reinstall(sample_rate)?;
        self.sample_rate = sample_rate;
        info!("I2S @ {sample_rate} Hz");
        Ok(())
    }

    pub fn write(&mut self, frames: &[i16], timeout: Option<Duration>) -> Result<()> {
        self.port.write_frames(frames, timeout)
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    pub fn into_inner(self) -> P {
        self.port
    }
}

#[cfg(target_os = "espidf")]
pub use esp::EspI2sPort;

#[cfg(target_os = "espidf")]
mod esp {
    use super::{I2sPort, DMA_BUFFER_COUNT, DMA_FRAMES_PER_BUFFER};
    use anyhow::{anyhow, Context, Result};
    use esp_idf_hal::{
        delay::TickType,
        gpio::{AnyIOPin, AnyOutputPin},
        i2s::{
            config::{
                Config as CoreCfg, DataBitWidth, SlotMode, StdClkConfig, StdConfig,
                StdGpioConfig, StdSlotConfig,
            },
            I2sDriver, I2sTx, I2S0,
        },
        peripheral::Peripheral,
    };
    use std::time::Duration;

    /// Zeros pushed into the DMA ring before the channel starts.
    const SILENCE: [u8; 1024] = [0; 1024];

    pub struct EspI2sPort {
        i2s: I2S0,
        bclk: AnyIOPin,
        ws: AnyIOPin,
        dout: AnyOutputPin,
        driver: Option<I2sDriver<'static, I2sTx>>,
    }

    impl EspI2sPort {
        /// Nothing is installed until the first `reinstall`.
        pub fn new(i2s: I2S0, bclk: AnyIOPin, ws: AnyIOPin, dout: AnyOutputPin) -> Self {
            Self {
                i2s,
                bclk,
                ws,
                dout,
                driver: None,
            }
        }
    }

    impl I2sPort for EspI2sPort {
        fn reinstall(&mut self, sample_rate: u32) -> Result<()> {
            // dropping the driver uninstalls it and frees the pins
            self.driver = None;

            let std_cfg = StdConfig::new(
                CoreCfg::default()
                    .dma_buffer_count(DMA_BUFFER_COUNT)
                    .frames_per_buffer(DMA_FRAMES_PER_BUFFER)
                    .auto_clear(true),
                StdClkConfig::from_sample_rate_hz(sample_rate), // PLL, no APLL
                StdSlotConfig::philips_slot_default(DataBitWidth::Bits16, SlotMode::Stereo),
                StdGpioConfig::default(),
            );

            // SAFETY: the only other handles to these peripherals lived in the
            // driver dropped above.
            let mut drv = unsafe {
                I2sDriver::new_std_tx(
                    self.i2s.clone_unchecked(),
                    &std_cfg,
                    self.bclk.clone_unchecked(),
                    self.dout.clone_unchecked(),
                    None::<AnyIOPin>,
                    self.ws.clone_unchecked(),
                )
            }
            .with_context(|| format!("I2S install @ {sample_rate} Hz"))?;

            drv.preload_data(&SILENCE)?;
            drv.tx_enable()?;
            self.driver = Some(drv);
            Ok(())
        }

        fn write_frames(&mut self, frames: &[i16], timeout: Option<Duration>) -> Result<()> {
            let drv = self
                .driver
                .as_mut()
                .ok_or_else(|| anyhow!("I2S not configured"))?;

            // SAFETY: i16 has no padding and the chip is little-endian, which is
            // the sample layout the DMA expects.
            let bytes = unsafe {
                core::slice::from_raw_parts(
                    frames.as_ptr().cast::<u8>(),
                    core::mem::size_of_val(frames),
                )
            };
            drv.write_all(bytes, TickType::from(timeout).ticks())?;
            Ok(())
        }
    }
}

#[cfg(test)]
pub(crate) use fake::RecordingPort;
