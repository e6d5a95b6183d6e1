//! CLI domain: parse, route, output, and presentation only.
//! Store inspection for a configured workspace; generation stays in library code
//! because setups are registered by the embedding program.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands};
pub use presentation::{format_config, format_record_list_json, format_record_list_text};
pub use route::RunContext;
