pub mod decode;
pub mod distances;
pub mod encode;
pub mod info;

use descrint::{Engine, EngineConfig};

use crate::error::CliError;

/// Builds an engine from the configured defaults, with command line values
/// taking precedence.
pub(crate) fn engine_for(
    config: &EngineConfig,
    dimension: Option<usize>,
    depth: Option<usize>,
) -> Result<Engine, CliError> {
    let mut config = config.clone();
    if let Some(dimension) = dimension {
        config.dimension = dimension;
    }
    if let Some(depth) = depth {
        config.depth = depth;
    }
    Ok(Engine::from_config(&config)?)
}
