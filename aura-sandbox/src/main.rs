use aura::core::cli::EngineArgs;

fn main() -> anyhow::Result<()> {
    let args = EngineArgs::parse_args();

    aura::launch(args).inspect_err(|e| log::error!("Aura engine loop failed: {e:#}"))
}
