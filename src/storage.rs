//! Flash filesystem holding the sound files

use anyhow::{anyhow, Result};
use core::fmt::Write as _;
use heapless::String as HString;

/// VFS mount point of the SPIFFS partition.
pub const BASE_PATH: &str = "/spiffs";
pub const MAX_PATH: usize = 64;
/// Files SPIFFS may keep open at once.
pub const MAX_OPEN_FILES: usize = 4;

pub type FilePath = HString<MAX_PATH>;

/// `name` under the mount point, e.g. `boot.wav` → `/spiffs/boot.wav`.
pub fn path(name: &str) -> Result<FilePath> {
    let mut p = FilePath::new();
    write!(p, "{BASE_PATH}/{}", name.trim_start_matches('/'))
        .map_err(|_| anyhow!("path too long: {name}"))?;
    Ok(p)
}

/// Registers the default SPIFFS partition at [`BASE_PATH`].
///
/// With `format_if_mount_failed` an unformatted partition is wiped and
/// mounted empty instead of failing.
#[cfg(target_os = "espidf")]
pub fn mount(format_if_mount_failed: bool) -> Result<()> {
    use anyhow::Context;
    use esp_idf_svc::sys::{esp, esp_spiffs_info, esp_vfs_spiffs_conf_t, esp_vfs_spiffs_register};

    let conf = esp_vfs_spiffs_conf_t {
        base_path: c"/spiffs".as_ptr(),
        partition_label: core::ptr::null(),
        max_files: MAX_OPEN_FILES,
        format_if_mount_failed,
    };
    esp!(unsafe { esp_vfs_spiffs_register(&conf) }).context("SPIFFS mount")?;

    let (mut total, mut used) = (0usize, 0usize);
    if esp!(unsafe { esp_spiffs_info(core::ptr::null(), &mut total, &mut used) }).is_ok() {
        log::info!("SPIFFS @ {BASE_PATH}: {used}/{total} B used");
    }
    Ok(())
}
