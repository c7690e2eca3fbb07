use clap::{Parser, Subcommand};
use log::LevelFilter;
use crate::errors::ConfigurationError;
use crate::request::Procedure;

/// Command-line args for the group settings client
#[derive(Parser, Debug, PartialEq, Clone)]
#[command(
    name = "group_settings_cli",
    version,
    about = "send commands to the lightworks_client_service"
)]
pub struct CLIArgs {
    /// Log Level
    #[arg(short = 'l', long = "log_level", default_value = "INFO", global = true)]
    pub log_level: LevelFilter,

    /// Backend auth endpoint
    #[arg(long = "backend-uri", env = "GSCLI_BACKEND_URI", global = true)]
    pub backend_uri: Option<String>,

    /// Router endpoint (ws:// or wss://)
    #[arg(long = "router-uri", env = "GSCLI_ROUTER_URI", global = true)]
    pub router_uri: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Clone)]
pub enum Command {
    /// set settings for a given group
    #[command(
        name = "setSettings",
        override_usage = "group_settings_cli setSettings <group_id> <active_level> <vacancy_enabled> <inactive_level> <vacancy_delay_sec>"
    )]
    SetSettings {
        #[arg(value_name = "ARGS", allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// retrieve settings for a given group
    #[command(name = "getSettings", override_usage = "group_settings_cli getSettings <group_id>")]
    GetSettings {
        #[arg(value_name = "ARGS", allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// retrieve entire settings map for a given site
    #[command(name = "getSettingsMap", override_usage = "group_settings_cli getSettingsMap <group_id>")]
    GetSettingsMap {
        #[arg(value_name = "ARGS", allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

impl Command {
    pub fn procedure(&self) -> Procedure {
        match self {
            Command::SetSettings { .. } => Procedure::SetSettings,
            Command::GetSettings { .. } => Procedure::GetSettings,
            Command::GetSettingsMap { .. } => Procedure::GetSettingsMap,
        }
    }

    /// Positional arguments in the order given.
    pub fn args(&self) -> &[String] {
        match self {
            Command::SetSettings { args } | Command::GetSettings { args } | Command::GetSettingsMap { args } => args,
        }
    }
}

/// Backend and router addresses, checked before anything touches the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub backend_uri: String,
    pub router_uri: String,
}

impl Endpoints {
    pub fn from_args(cli_args: &CLIArgs) -> Result<Self, ConfigurationError> {
        let pick = |value: &Option<String>, var: &'static str| {
            value.clone().filter(|v| !v.is_empty()).ok_or(ConfigurationError::Missing(var))
        };
        Ok(Self {
            backend_uri: pick(&cli_args.backend_uri, "GSCLI_BACKEND_URI")?,
            router_uri: pick(&cli_args.router_uri, "GSCLI_ROUTER_URI")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> CLIArgs {
        let mut full = vec!["group_settings_cli", "--backend-uri", "https://b", "--router-uri", "wss://r"];
        full.extend_from_slice(argv);
        CLIArgs::try_parse_from(full).unwrap()
    }

    #[test]
    fn set_settings_collects_positionals() {
        let args = parse(&["setSettings", "g1", "3", "true", "1", "30"]);
        assert_eq!(args.command.procedure(), Procedure::SetSettings);
        assert_eq!(args.command.args(), ["g1", "3", "true", "1", "30"]);
        assert_eq!(args.log_level, LevelFilter::Info);
    }

    #[test]
    fn get_commands_accept_missing_and_extra_arguments() {
        let args = parse(&["getSettings"]);
        assert!(args.command.args().is_empty());
        let args = parse(&["getSettingsMap", "site", "extra"]);
        assert_eq!(args.command.procedure(), Procedure::GetSettingsMap);
        assert_eq!(args.command.args().len(), 2);
    }

    #[test]
    fn log_level_is_case_insensitive() {
        let args = parse(&["-l", "debug", "getSettings", "g1"]);
        assert_eq!(args.log_level, LevelFilter::Debug);
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(CLIArgs::try_parse_from(["group_settings_cli", "deleteSettings", "g1"]).is_err());
    }

    #[test]
    fn endpoints_require_both_uris() {
        let mut args = parse(&["getSettings", "g1"]);
        assert_eq!(
            Endpoints::from_args(&args).unwrap(),
            Endpoints { backend_uri: "https://b".into(), router_uri: "wss://r".into() }
        );
        args.router_uri = None;
        assert!(matches!(
            Endpoints::from_args(&args),
            Err(ConfigurationError::Missing("GSCLI_ROUTER_URI"))
        ));
        args.backend_uri = Some(String::new());
        assert!(matches!(
            Endpoints::from_args(&args),
            Err(ConfigurationError::Missing("GSCLI_BACKEND_URI"))
        ));
    }
}
