//! Text generation capability.
//!
//! `T5Generator` runs a flan-t5 model through candle with beam search or
//! seeded sampling. `FakeGenerator` is an extractive stand-in for tests and
//! development; set `APP_USE_FAKE_GENERATION=1` to select it from
//! `get_default_generator`.

use anyhow::Result;
use tracing::warn;

use insight_core::config::GenerationSettings;
use insight_core::Generator;

pub mod decode;
pub mod fake;
pub mod t5;

pub use fake::FakeGenerator;
pub use t5::T5Generator;

pub fn get_default_generator(settings: &GenerationSettings) -> Result<Box<dyn Generator>> {
    let use_fake = std::env::var("APP_USE_FAKE_GENERATION").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
    if use_fake || settings.use_fake {
        warn!("using FakeGenerator");
        return Ok(Box::new(FakeGenerator::new(settings.context_window_tokens)));
    }
    Ok(Box::new(T5Generator::from_settings(settings)?))
}
