pub mod analyzer;
pub mod encoder;
pub mod executor;
pub mod metrics;
pub mod providers;

pub use analyzer::DocumentAnalyzer;
pub use encoder::DocumentEncoder;
pub use executor::{CommandError, CommandExecutor};
pub use self::metrics::{get_metrics, init_metrics};
