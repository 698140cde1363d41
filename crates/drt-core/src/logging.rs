use crate::{errors::Error, Result};

/// Initialize tracing for a drt binary.
///
/// Logs go to stderr; stdout is reserved for prompts and command output.
pub fn init(service_name: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    // Default: info for our crates, warn for everything else.
    // Can be overridden with `RUST_LOG`.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,drt=info,drt_core=info,drt_transport=info,drt_oauth=info,{service_name}=info"
        ))
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| Error::External(format!("failed to initialize logging: {e}")))?;

    Ok(())
}
