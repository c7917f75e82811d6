pub mod lines_provider;

pub use lines_provider::{parse_provider_lines, LinesProviderClient};
