//! GPIO / peripheral pin assignments for the SmartCam board
//! (ESP32-S3 + SIM7600 PCIe modem + OV-series camera + microSD).
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Cellular modem (SIM7600 on the PCIe slot)
// ---------------------------------------------------------------------------

/// Digital output: pulse HIGH to toggle the modem power key.
pub const MODEM_PWR_GPIO: i32 = 48;
/// UART TX towards the modem RX.
pub const MODEM_TX_GPIO: i32 = 45;
/// UART RX from the modem TX.
pub const MODEM_RX_GPIO: i32 = 46;
/// Status LED on the PCIe carrier.
pub const MODEM_LED_GPIO: i32 = 21;

/// Hardware UART used for the modem link.
pub const MODEM_UART_NUM: u8 = 1;
/// Bytes held by the driver's RX ring before the line assembler sees them.
pub const MODEM_UART_RX_BUFFER: usize = 4096;

// ---------------------------------------------------------------------------
// microSD (SPI)
// ---------------------------------------------------------------------------

pub const SD_MISO_GPIO: i32 = 40;
pub const SD_MOSI_GPIO: i32 = 38;
pub const SD_SCLK_GPIO: i32 = 39;
pub const SD_CS_GPIO: i32 = 47;

/// VFS mount point of the card.
pub const SD_MOUNT_POINT: &str = "/sdcard";

// ---------------------------------------------------------------------------
// Camera (DVP)
// ---------------------------------------------------------------------------

/// Not connected on this board.
pub const CAM_PWDN_GPIO: i32 = -1;
pub const CAM_RESET_GPIO: i32 = -1;
pub const CAM_XCLK_GPIO: i32 = 14;
/// SCCB data.
pub const CAM_SIOD_GPIO: i32 = 4;
/// SCCB clock.
pub const CAM_SIOC_GPIO: i32 = 5;

pub const CAM_Y9_GPIO: i32 = 15;
pub const CAM_Y8_GPIO: i32 = 16;
pub const CAM_Y7_GPIO: i32 = 17;
pub const CAM_Y6_GPIO: i32 = 12;
pub const CAM_Y5_GPIO: i32 = 10;
pub const CAM_Y4_GPIO: i32 = 8;
pub const CAM_Y3_GPIO: i32 = 9;
pub const CAM_Y2_GPIO: i32 = 11;
pub const CAM_VSYNC_GPIO: i32 = 6;
pub const CAM_HREF_GPIO: i32 = 7;
pub const CAM_PCLK_GPIO: i32 = 13;

/// IR illuminator for night shots.
pub const CAM_IR_GPIO: i32 = 18;

/// XCLK frequency fed to the sensor.
pub const CAM_XCLK_FREQ_HZ: i32 = 20_000_000;

// ---------------------------------------------------------------------------
// Misc
// ---------------------------------------------------------------------------

/// BOOT button (active LOW).
pub const BUTTON_GPIO: i32 = 0;
/// Board power latch.
pub const POWER_ON_GPIO: i32 = 1;

pub const DEBUG_UART_RX_GPIO: i32 = 44;
pub const DEBUG_UART_TX_GPIO: i32 = 43;
