pub use log::{trace, debug, info, warn, error, LevelFilter};

pub fn initialize(level: LevelFilter) -> Result<(), anyhow::Error> {
    env_logger::builder()
        .filter_level(level)
        .filter_module("winit", log::LevelFilter::Warn)
        .filter_module("calloop", log::LevelFilter::Error)
        .filter_module("sctk", log::LevelFilter::Error)
        .parse_default_env()
        .try_init()?;

    Ok(())
}
