use aura_core::cli::EngineArgs;
use aura_core::log::LevelFilter;

use crate::main_loop::EngineLoop;

mod engine;
mod main_loop;
mod scene;

pub use engine::Engine;

pub use paste::paste;

macro_rules! module_facade {
    ($name:ident) => {
        $crate::paste! {
            pub mod $name {
                pub use [<aura_ $name>]::*;
            }
        }
    };
}

module_facade!(core);
module_facade!(rhi);

/// Launch the main engine loop.
pub fn launch(args: EngineArgs) -> Result<(), anyhow::Error> {
    aura_core::log::initialize(LevelFilter::from(args.log_level))?;

    let main_loop = EngineLoop::new(args)?;
    main_loop.run()?;

    Ok(())
}
