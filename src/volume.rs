//! Live volume from the potentiometer (12-bit ADC reading)

use anyhow::Result;

/// Full-scale reading of a 12-bit ADC.
pub const ADC_MAX: u16 = 4095;

/// Gain in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Volume(f32);

impl Volume {
    pub const MUTE: Volume = Volume(0.0);
    pub const FULL: Volume = Volume(1.0);

    /// Raw ADC value, 0 → mute, 4095 → full. Readings above full scale clip.
    pub fn from_raw(raw: u16) -> Self {
        Volume(f32::from(raw.min(ADC_MAX)) / f32::from(ADC_MAX))
    }

    pub fn from_fraction(fraction: f32) -> Self {
        if fraction.is_nan() {
            return Volume::MUTE;
        }
        Volume(fraction.clamp(0.0, 1.0))
    }

    pub fn fraction(self) -> f32 {
        self.0
    }

    /// `clamp(trunc(sample * gain))` to the i16 range.
    pub fn apply(self, sample: i16) -> i16 {
        let scaled = (f32::from(sample) * self.0) as i32;
        scaled.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
    }
}

/// Anything that can be sampled for the current volume.
pub trait VolumeControl {
    fn read(&mut self) -> Result<Volume>;
}

/// Fixed gain, no knob attached.
impl VolumeControl for Volume {
    fn read(&mut self) -> Result<Volume> {
        Ok(*self)
    }
}

impl<V: VolumeControl + ?Sized> VolumeControl for &mut V {
    fn read(&mut self) -> Result<Volume> {
        (**self).read()
    }
}

#[cfg(target_os = "espidf")]
pub use pot::PotVolume;

#[cfg(target_os = "espidf")]
mod pot {
    use super::{Volume, VolumeControl};
    use anyhow::{Context, Result};
    use esp_idf_hal::{
        adc::{
            attenuation::DB_11,
            oneshot::{config::AdcChannelConfig, AdcChannelDriver, AdcDriver},
            ADCPin, Resolution,
        },
        peripheral::Peripheral,
    };

    /// Potentiometer on a oneshot ADC channel. Raw counts, no calibration or smoothing.
    pub struct PotVolume<'d, P: ADCPin> {
        channel: AdcChannelDriver<'d, P, AdcDriver<'d, P::Adc>>,
    }

    impl<'d, P: ADCPin> PotVolume<'d, P> {
        pub fn new(
            adc: impl Peripheral<P = P::Adc> + 'd,
            pin: impl Peripheral<P = P> + 'd,
        ) -> Result<Self> {
            let adc = AdcDriver::new(adc).context("ADC driver")?;
            let cfg = AdcChannelConfig {
                attenuation: DB_11,
                resolution: Resolution::Resolution12Bit,
                ..Default::default()
            };
            let channel = AdcChannelDriver::new(adc, pin, &cfg).context("ADC channel")?;
            Ok(Self { channel })
        }
    }

    impl<P: ADCPin> VolumeControl for PotVolume<'_, P> {
        fn read(&mut self) -> Result<Volume> {
            let raw = self.channel.read_raw().context("volume pot read")?;
            Ok(Volume::from_raw(raw))
        }
    }
}
