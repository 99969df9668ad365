//! Command-line interface.
//!
//! The run takes no arguments; everything is configured through files in
//! the base directory and the environment. Parsing still provides
//! `--help` and `--version`.

use clap::Parser;

/// Build today's technology briefing from the configured feeds.
///
/// Environment:
///
/// - `GEMINI_API_KEY` (required)
/// - `GEMINI_MODEL`, `DISPLAY_LANGUAGE` (optional)
/// - `MORNING_SENSING_HOME`: base directory, defaults to the working directory
/// - `RUST_LOG`: log filter, defaults to `info`
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn parses_without_arguments() {
        let cli = Cli::try_parse_from(["morning_sensing"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn rejects_unknown_arguments() {
        assert!(Cli::try_parse_from(["morning_sensing", "--json-output-dir", "./json"]).is_err());
    }

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }
}
