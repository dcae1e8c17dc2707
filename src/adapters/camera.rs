//! OV-series camera through the `esp32-camera` component.
//!
//! Frames are JPEG.  With PSRAM the driver runs at QHD with two frame
//! buffers; without it, SVGA with a single buffer in DRAM.

use esp_idf_svc::sys::camera;
use esp_idf_svc::sys::{
    EspError, MALLOC_CAP_SPIRAM, esp, heap_caps_get_total_size, ledc_channel_t_LEDC_CHANNEL_0,
    ledc_timer_t_LEDC_TIMER_0,
};
use log::{info, warn};

use crate::app::ports::PhotoSource;
use crate::pins;

pub struct Camera {
    _private: (),
}

impl Camera {
    /// Initialise the sensor.  Call once.
    pub fn init() -> Result<Self, EspError> {
        let psram = unsafe { heap_caps_get_total_size(MALLOC_CAP_SPIRAM) } > 0;
        let (frame_size, jpeg_quality, fb_count, fb_location) = if psram {
            (
                camera::framesize_t_FRAMESIZE_QHD,
                10,
                2,
                camera::camera_fb_location_t_CAMERA_FB_IN_PSRAM,
            )
        } else {
            (
                camera::framesize_t_FRAMESIZE_SVGA,
                12,
                1,
                camera::camera_fb_location_t_CAMERA_FB_IN_DRAM,
            )
        };

        let config = camera::camera_config_t {
            pin_pwdn: pins::CAM_PWDN_GPIO,
            pin_reset: pins::CAM_RESET_GPIO,
            pin_xclk: pins::CAM_XCLK_GPIO,
            __bindgen_anon_1: camera::camera_config_t__bindgen_ty_1 {
                pin_sccb_sda: pins::CAM_SIOD_GPIO,
            },
            __bindgen_anon_2: camera::camera_config_t__bindgen_ty_2 {
                pin_sccb_scl: pins::CAM_SIOC_GPIO,
            },
            pin_d7: pins::CAM_Y9_GPIO,
            pin_d6: pins::CAM_Y8_GPIO,
            pin_d5: pins::CAM_Y7_GPIO,
            pin_d4: pins::CAM_Y6_GPIO,
            pin_d3: pins::CAM_Y5_GPIO,
            pin_d2: pins::CAM_Y4_GPIO,
            pin_d1: pins::CAM_Y3_GPIO,
            pin_d0: pins::CAM_Y2_GPIO,
            pin_vsync: pins::CAM_VSYNC_GPIO,
            pin_href: pins::CAM_HREF_GPIO,
            pin_pclk: pins::CAM_PCLK_GPIO,
            xclk_freq_hz: pins::CAM_XCLK_FREQ_HZ,
            ledc_timer: ledc_timer_t_LEDC_TIMER_0,
            ledc_channel: ledc_channel_t_LEDC_CHANNEL_0,
            pixel_format: camera::pixformat_t_PIXFORMAT_JPEG,
            frame_size,
            jpeg_quality,
            fb_count,
            fb_location,
            grab_mode: camera::camera_grab_mode_t_CAMERA_GRAB_LATEST,
            ..Default::default()
        };

        esp!(unsafe { camera::esp_camera_init(&config) })?;
        info!("Camera ready (psram={})", psram);
        Ok(Self { _private: () })
    }
}

impl PhotoSource for Camera {
    fn capture(&mut self) -> Option<Vec<u8>> {
        let fb = unsafe { camera::esp_camera_fb_get() };
        if fb.is_null() {
            warn!("Camera: no frame buffer");
            return None;
        }
        // SAFETY: `fb` is valid until returned to the driver below.
        let frame = unsafe {
            let fb = &*fb;
            core::slice::from_raw_parts(fb.buf, fb.len).to_vec()
        };
        unsafe { camera::esp_camera_fb_return(fb) };
        Some(frame)
    }
}
