use anyhow::Result;

/// Inicializa el subscriber global de `tracing`.
///
/// Pensado para binarios que incrustan el motor; los hosts que ya tienen su
/// propio subscriber simplemente no llaman a esta función.
pub fn init_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("storm_audio=debug".parse()?),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("No se pudo inicializar logging: {}", e))?;

    Ok(())
}
