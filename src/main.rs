// ===================== main.rs =====================
// Bring-up: logger, SPIFFS, I2S + volume pot, dedicated playback thread.
//  • I2S  BCLK=GPIO12  WS=GPIO13  DOUT=GPIO14
//  • volume pot on GPIO5 (ADC1, 12 bit)
//  • WAV files (mono, 16-bit PCM) under /spiffs

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    firmware::run()
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    eprintln!(
        "{} is ESP-IDF firmware; build it for an espidf target",
        env!("CARGO_PKG_NAME")
    );
}

#[cfg(target_os = "espidf")]
mod firmware {
    use anyhow::{Context, Result};
    use battleship_audio::{
        i2s::EspI2sPort, player, storage, volume::PotVolume, AudioOutput, Player,
    };
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_svc::{log::EspLogger, sys::link_patches};
    use log::{error, info};
    use std::{sync::mpsc, thread, time::Duration};

    /* ------------ parameters --------------------------------------------- */
    const BOOT_SOUND: &str = match option_env!("AUDIO_BOOT_SOUND") {
        Some(name) => name,
        None => "boot.wav",
    };
    const FORMAT_ON_MOUNT_FAIL: bool = true;
    const AUDIO_STACK: usize = 8 * 1024; // two 1 KB buffers + file handle
    /* --------------------------------------------------------------------- */

    pub fn run() -> Result<()> {
        link_patches();
        EspLogger::initialize_default();

        let per = Peripherals::take()?;

        // 1️⃣  flash filesystem – without it there is nothing to play
        if let Err(e) = storage::mount(FORMAT_ON_MOUNT_FAIL) {
            error!("SPIFFS mount failed (audio disabled): {e:?}");
            idle();
        }

        // 2️⃣  playback worker owns I2S + ADC for the rest of the run
        let (tx_audio, rx_audio) = mpsc::channel::<storage::FilePath>();
        let i2s0 = per.i2s0;
        let (bclk, ws, dout) = (per.pins.gpio12, per.pins.gpio13, per.pins.gpio14);
        let (adc1, pot) = (per.adc1, per.pins.gpio5);

        // worker reports whether the pot came up before anything is queued
        let (tx_ready, rx_ready) = mpsc::sync_channel::<bool>(1);

        thread::Builder::new()
            .name("audio_worker".into())
            .stack_size(AUDIO_STACK)
            .spawn(move || {
                let port = EspI2sPort::new(i2s0, bclk.into(), ws.into(), dout.into());
                let volume = match PotVolume::new(adc1, pot) {
                    Ok(v) => v,
                    Err(e) => {
                        error!("volume pot init: {e:?}");
                        let _ = tx_ready.send(false);
                        return;
                    }
                };
                let _ = tx_ready.send(true);
                player::serve(Player::new(AudioOutput::new(port), volume), rx_audio);
            })
            .context("spawn audio_worker")?;

        if !rx_ready.recv().unwrap_or(false) {
            error!("audio worker not running (audio disabled)");
            idle();
        }

        // 3️⃣  boot sound
        tx_audio.send(storage::path(BOOT_SOUND)?)?;
        info!("audio ready, queued {BOOT_SOUND}");

        idle();
    }

    fn idle() -> ! {
        loop {
            thread::sleep(Duration::from_secs(60));
        }
    }
}
