//! CLI subcommand implementations for the `slipscan` binary.

pub mod doctor;
pub mod extract_cmd;
pub mod output;
pub mod profiles_cmd;
pub mod scrape_cmd;
