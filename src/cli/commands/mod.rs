//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod chaos;
pub mod completions;
pub mod matching;
pub mod normalize;
pub mod version;

use crate::cli::args::{Cli, Commands};
use crate::error::ApiMockError;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub fn dispatch(cli: Cli) -> Result<(), ApiMockError> {
    match cli.command {
        Commands::Normalize(args) => normalize::run(&args),
        Commands::Match(args) => matching::run(&args),
        Commands::Chaos(args) => chaos::run(&args),
        Commands::Completions(args) => {
            completions::run(&args);
            Ok(())
        }
        Commands::Version(args) => {
            version::run(&args);
            Ok(())
        }
    }
}
