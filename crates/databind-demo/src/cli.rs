#![forbid(unsafe_code)]

//! Command-line argument parsing for the person form demo.
//!
//! Parses args manually. Supports environment variable overrides via the
//! `DATABIND_DEMO_*` prefix; explicit flags win over the environment.

use std::env;
use std::process;

use databind_core::TextTrigger;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const HELP_TEXT: &str = "\
databind demo: a person form bound to a plain model

The form starts empty and pushes its fields into the model when it opens,
so the model's starting name is cleared. Quitting without edits prints an
empty name.

USAGE:
    databind-demo [OPTIONS]

OPTIONS:
    --script=PATH        Read UI events from PATH instead of stdin
    --trigger=WHEN       When the name field updates the model: 'modify' or
                         'focus-out' (default: modify)
    --log=FILTER         tracing filter, e.g. 'debug' or 'databind_core=trace'
                         (default: warn)
    --help, -h           Show this help message
    --version, -V        Show version

SCRIPT COMMANDS (one per line, '#' starts a comment):
    name TEXT            Replace the name field's text
    type TEXT            Type TEXT into the name field, one key at a time
    backspace            Delete the last character of the name field
    blur                 Move focus out of the name field
    gender CHOICE        Select Male, Female or Unknown
    show                 Print the form and the model
    quit                 Close the form

ENVIRONMENT VARIABLES:
    DATABIND_DEMO_SCRIPT     Override --script
    DATABIND_DEMO_TRIGGER    Override --trigger
    DATABIND_DEMO_LOG        Override --log";

/// Parsed command-line options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opts {
    /// Event script path; `None` reads stdin.
    pub script: Option<String>,
    /// Event that commits the name field into the model.
    pub trigger: TextTrigger,
    /// `tracing` filter directive.
    pub log_filter: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ParseError {
    Help,
    Version,
    InvalidValue { flag: &'static str, value: String },
    UnknownArg(String),
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            script: None,
            trigger: TextTrigger::Modify,
            log_filter: "warn".into(),
        }
    }
}

fn parse_trigger(val: &str) -> Option<TextTrigger> {
    match val.trim().to_ascii_lowercase().as_str() {
        "modify" => Some(TextTrigger::Modify),
        "focus-out" | "focusout" => Some(TextTrigger::FocusOut),
        _ => None,
    }
}

impl Opts {
    /// Parse command-line arguments and environment variables.
    ///
    /// Environment variables take precedence over defaults but are overridden
    /// by explicit command-line flags.
    pub fn parse() -> Self {
        match Self::parse_from_env_and_args(env::args().skip(1), |key| env::var(key).ok()) {
            Ok(opts) => opts,
            Err(ParseError::Help) => {
                println!("{HELP_TEXT}");
                process::exit(0);
            }
            Err(ParseError::Version) => {
                println!("databind-demo {VERSION}");
                process::exit(0);
            }
            Err(ParseError::InvalidValue { flag, value }) => {
                eprintln!("Invalid {flag} value: {value}");
                process::exit(1);
            }
            Err(ParseError::UnknownArg(arg)) => {
                eprintln!("Unknown argument: {arg}");
                eprintln!("Run with --help for usage information.");
                process::exit(1);
            }
        }
    }

    fn parse_from_env_and_args<I, S, F>(args: I, get_env: F) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Fn(&str) -> Option<String>,
    {
        let mut opts = Self::default();

        // Apply environment variable defaults first
        if let Some(val) = get_env("DATABIND_DEMO_SCRIPT")
            && !val.trim().is_empty()
        {
            opts.script = Some(val);
        }
        if let Some(val) = get_env("DATABIND_DEMO_TRIGGER")
            && let Some(trigger) = parse_trigger(&val)
        {
            opts.trigger = trigger;
        }
        if let Some(val) = get_env("DATABIND_DEMO_LOG")
            && !val.trim().is_empty()
        {
            opts.log_filter = val;
        }

        // Parse command-line args (override env vars)
        for arg in args {
            match arg.as_ref() {
                "--help" | "-h" => return Err(ParseError::Help),
                "--version" | "-V" => return Err(ParseError::Version),
                other => {
                    if let Some(val) = other.strip_prefix("--script=") {
                        opts.script = Some(val.to_string());
                    } else if let Some(val) = other.strip_prefix("--trigger=") {
                        match parse_trigger(val) {
                            Some(trigger) => opts.trigger = trigger,
                            None => {
                                return Err(ParseError::InvalidValue {
                                    flag: "--trigger",
                                    value: val.to_string(),
                                });
                            }
                        }
                    } else if let Some(val) = other.strip_prefix("--log=") {
                        opts.log_filter = val.to_string();
                    } else {
                        return Err(ParseError::UnknownArg(other.to_string()));
                    }
                }
            }
        }

        Ok(opts)
    }
}
