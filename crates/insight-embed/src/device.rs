//! Compute device for the candle models.

use candle_core::Device;
use tracing::info;

/// Metal when compiled in and available; `APP_DEVICE=cpu` forces the CPU.
pub fn select_device() -> Device {
    let force_cpu = std::env::var("APP_DEVICE").map(|v| v.eq_ignore_ascii_case("cpu")).unwrap_or(false);
    if !force_cpu {
        #[cfg(feature = "metal")]
        match Device::new_metal(0) {
            Ok(dev) => {
                info!("device: metal");
                return dev;
            }
            Err(e) => tracing::warn!(error = %e, "metal unavailable; using cpu"),
        }
    }
    info!("device: cpu");
    Device::Cpu
}
