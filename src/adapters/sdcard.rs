//! microSD card on SPI, mounted as FAT under [`SD_MOUNT_POINT`].
//!
//! The mounted volume backs the firmware download file, the event log and
//! the optional JSON configuration overlay.

use esp_idf_svc::fs::fatfs::Fatfs;
use esp_idf_svc::hal::gpio::{AnyIOPin, InputPin, OutputPin};
use esp_idf_svc::hal::peripheral::Peripheral;
use esp_idf_svc::hal::sd::spi::SdSpiHostDriver;
use esp_idf_svc::hal::sd::{SdCardConfiguration, SdCardDriver};
use esp_idf_svc::hal::spi::config::DriverConfig;
use esp_idf_svc::hal::spi::{Dma, SpiAnyPins, SpiDriver};
use esp_idf_svc::io::vfs::MountedFatfs;
use esp_idf_svc::sys::{ESP_OK, EspError, esp_vfs_fat_info};
use log::{info, warn};

use crate::pins::SD_MOUNT_POINT;
use crate::report::SdUsage;

/// Open files allowed at once on the volume.
const MAX_OPEN_FILES: usize = 4;

/// The mounted card; dropping it unmounts the volume.
pub type MountedCard<'d> = MountedFatfs<Fatfs<SdCardDriver<SdSpiHostDriver<'d, SpiDriver<'d>>>>>;

/// Bring up the SPI bus and mount the card.
pub fn mount<'d>(
    spi: impl Peripheral<P = impl SpiAnyPins> + 'd,
    sclk: impl Peripheral<P = impl OutputPin> + 'd,
    mosi: impl Peripheral<P = impl OutputPin> + 'd,
    miso: impl Peripheral<P = impl InputPin> + 'd,
    cs: impl Peripheral<P = impl OutputPin> + 'd,
) -> Result<MountedCard<'d>, EspError> {
    let spi = SpiDriver::new(
        spi,
        sclk,
        mosi,
        Some(miso),
        &DriverConfig::default().dma(Dma::Auto(4096)),
    )?;
    let host = SdSpiHostDriver::new(
        spi,
        Some(cs),
        AnyIOPin::none(),
        AnyIOPin::none(),
        AnyIOPin::none(),
        None,
    )?;
    let card = SdCardDriver::new_spi(host, &SdCardConfiguration::new())?;
    let mounted = MountedFatfs::mount(Fatfs::new_sdcard(0, card)?, SD_MOUNT_POINT, MAX_OPEN_FILES)?;
    info!("SD card mounted at {}", SD_MOUNT_POINT);
    Ok(mounted)
}

/// Used and total space of the mounted volume, in MiB.
pub fn usage() -> Option<SdUsage> {
    let mut total: u64 = 0;
    let mut free: u64 = 0;
    let path = std::ffi::CString::new(SD_MOUNT_POINT).ok()?;
    let ret = unsafe { esp_vfs_fat_info(path.as_ptr(), &mut total, &mut free) };
    if ret != ESP_OK {
        warn!("SD usage query failed: {}", ret);
        return None;
    }
    let total_mb = total / (1024 * 1024);
    Some(SdUsage {
        used_mb: total_mb - free / (1024 * 1024),
        total_mb,
    })
}
