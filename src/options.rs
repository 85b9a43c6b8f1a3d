//! Command-line parsing for the `bnsim` and `bnsim-web` binaries.

use clap::{Arg, ArgAction, Command};
use std::error::Error;

fn make_sim_parser() -> clap::Command {
    Command::new("bnsim")
        .version("v0.1.0")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Net configuration (JSON)")
                .required(true),
        )
        .arg(
            Arg::new("schema")
                .long("schema")
                .value_name("FILE")
                .help("Place-type schema (JSON); built-in types when omitted"),
        )
        .arg(
            Arg::new("steps")
                .short('n')
                .long("steps")
                .value_name("N")
                .help("Fire at most N transitions; runs to quiescence when omitted")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("seed")
                .short('s')
                .long("seed")
                .value_name("SEED")
                .help("Fixed RNG seed for reproducible outcome rolls")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("inject")
                .short('i')
                .long("inject")
                .value_name("PLACE")
                .help("Inject one empty token at PLACE before running (repeatable)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Write the final distribution and event log as JSON"),
        )
}

#[derive(Debug, Default)]
pub struct Options {
    pub config: String,
    pub schema: Option<String>,
    pub steps: Option<u64>,
    pub seed: Option<u64>,
    pub inject: Vec<String>,
    pub output: Option<String>,
}

impl Options {
    pub fn parse_from_args<I, T>(args: I) -> Result<Self, Box<dyn Error>>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = make_sim_parser().try_get_matches_from(args)?;
        Ok(Options {
            config: matches.get_one::<String>("config").unwrap().to_string(),
            schema: matches.get_one::<String>("schema").cloned(),
            steps: matches.get_one::<u64>("steps").copied(),
            seed: matches.get_one::<u64>("seed").copied(),
            inject: matches
                .get_many::<String>("inject")
                .map(|values| values.cloned().collect())
                .unwrap_or_default(),
            output: matches.get_one::<String>("output").cloned(),
        })
    }
}

fn make_web_parser() -> clap::Command {
    Command::new("bnsim-web")
        .version("v0.1.0")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Net configuration (JSON)")
                .required(true),
        )
        .arg(
            Arg::new("schema")
                .long("schema")
                .value_name("FILE")
                .help("Place-type schema (JSON); built-in types when omitted"),
        )
        .arg(
            Arg::new("settings")
                .long("settings")
                .value_name("FILE")
                .help("Server settings (TOML); defaults apply when omitted")
                .default_value("bnsim.toml"),
        )
}

#[derive(Debug, Default)]
pub struct WebOptions {
    pub config: String,
    pub schema: Option<String>,
    pub settings: String,
}

impl WebOptions {
    pub fn parse_from_args<I, T>(args: I) -> Result<Self, Box<dyn Error>>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = make_web_parser().try_get_matches_from(args)?;
        Ok(WebOptions {
            config: matches.get_one::<String>("config").unwrap().to_string(),
            schema: matches.get_one::<String>("schema").cloned(),
            settings: matches.get_one::<String>("settings").unwrap().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_is_an_error() {
        let options = Options::parse_from_args(["bnsim", "-n", "5"]);
        assert!(options.is_err());
    }

    #[test]
    fn repeated_inject_flags_accumulate() {
        let options = Options::parse_from_args([
            "bnsim", "-c", "net.json", "-i", "entry", "-i", "entry", "-s", "7",
        ])
        .unwrap();
        assert_eq!(options.config, "net.json");
        assert_eq!(options.inject, vec!["entry", "entry"]);
        assert_eq!(options.seed, Some(7));
        assert!(options.steps.is_none());
    }

    #[test]
    fn bad_step_count_is_an_error() {
        let options = Options::parse_from_args(["bnsim", "-c", "net.json", "-n", "lots"]);
        assert!(options.is_err());
    }

    #[test]
    fn web_settings_default_path() {
        let options = WebOptions::parse_from_args(["bnsim-web", "-c", "net.json"]).unwrap();
        assert_eq!(options.settings, "bnsim.toml");
        assert!(options.schema.is_none());
    }
}
