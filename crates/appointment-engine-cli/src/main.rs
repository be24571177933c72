//! `appt`: JSON in, JSON out front end for appointment-engine.
//!
//! Every input argument accepts a file path, `-` for stdin, or a literal JSON
//! document. Results are pretty-printed JSON on stdout; diagnostics go to
//! stderr through `tracing` (`RUST_LOG=debug` for engine detail).

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use appointment_engine::calendar::{parse_end_date, parse_rfc3339, parse_timezone};
use appointment_engine::ical::{format_rrule, parse_rrule};
use appointment_engine::{
    check_conflicts, check_series, expand_with_options, suggest_next_slot, validate_rule_with_limits,
    AppointmentInstance, ConflictScope, EngineConfig, RecurrenceRule,
};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::json;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "appt", version, about = "Recurrence expansion and conflict checks for appointments")]
struct Cli {
    /// Engine configuration (JSON file)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// IANA timezone for wall-clock rules; overrides the config file
    #[arg(long, global = true)]
    tz: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Expand a recurring appointment into its additional instances
    Expand {
        /// Seed appointment (path, '-' or JSON)
        #[arg(long)]
        seed: String,

        #[command(flatten)]
        rule: RuleInput,

        /// Existing appointments to check every generated instance against
        #[arg(long)]
        existing: Option<String>,

        /// Ignore existing appointments of this series when checking
        #[arg(long, requires = "existing")]
        exclude_series: Option<String>,
    },

    /// Validate a recurrence rule for a series starting at --start
    Validate {
        /// First appointment start (RFC 3339)
        #[arg(long)]
        start: String,

        #[command(flatten)]
        rule: RuleInput,
    },

    /// Check one candidate appointment against existing bookings
    Conflicts {
        /// Candidate appointment (path, '-' or JSON)
        #[arg(long)]
        candidate: String,

        /// Existing appointments (path, '-' or JSON array)
        #[arg(long)]
        existing: String,

        /// Id of the candidate's stored version, ignored during the check
        #[arg(long)]
        exclude: Option<String>,

        /// Resource that makes an overlap a conflict; overrides the config file
        #[arg(long, value_enum)]
        scope: Option<ScopeArg>,

        /// Exit with status 2 when a conflict is found
        #[arg(long)]
        fail_on_conflict: bool,
    },

    /// Propose the next free slot for a therapist
    Suggest {
        /// Requested start (RFC 3339)
        #[arg(long)]
        start: String,

        /// Appointment length in minutes
        #[arg(long)]
        duration: i64,

        #[arg(long)]
        therapist: String,

        /// Existing appointments (path, '-' or JSON array)
        #[arg(long)]
        existing: Option<String>,
    },

    /// Convert between RRULE strings and rule JSON
    Rrule {
        #[command(subcommand)]
        action: RruleAction,
    },
}

#[derive(Subcommand)]
enum RruleAction {
    /// RRULE string -> rule JSON
    Parse { value: String },
    /// Rule JSON (path, '-' or JSON) -> RRULE string
    Format { rule: String },
}

#[derive(Args)]
struct RuleInput {
    /// Recurrence rule (path, '-' or JSON)
    #[arg(long, conflicts_with = "rrule", required_unless_present = "rrule")]
    rule: Option<String>,

    /// Recurrence rule as an RFC 5545 RRULE value
    #[arg(long)]
    rrule: Option<String>,

    /// End boundary (RFC 3339, or YYYY-MM-DD for the end of that day); overrides the rule
    #[arg(long)]
    until: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ScopeArg {
    Therapist,
    Patient,
    Either,
}

impl From<ScopeArg> for ConflictScope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::Therapist => ConflictScope::Therapist,
            ScopeArg::Patient => ConflictScope::Patient,
            ScopeArg::Either => ConflictScope::Either,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(&cli)?;
    debug!(timezone = %config.timezone, "loaded engine configuration");

    match cli.command {
        Command::Expand {
            seed,
            rule,
            existing,
            exclude_series,
        } => {
            let seed: AppointmentInstance = read_json(&seed).context("reading seed appointment")?;
            let rule = rule.resolve(&config)?;
            let expansion = expand_with_options(&seed, &rule, &config.expand_options())?;

            let mut output = json!({
                "instances": expansion.instances,
                "truncated": expansion.truncated,
            });
            if let Some(existing) = existing {
                let existing: Vec<AppointmentInstance> =
                    read_json(&existing).context("reading existing appointments")?;
                let conflicts = check_series(
                    &expansion.instances,
                    &existing,
                    exclude_series.as_deref(),
                    config.conflict_scope,
                );
                output["conflicts"] = serde_json::to_value(conflicts)?;
            }
            print_json(&output)?;
            Ok(ExitCode::SUCCESS)
        }

        Command::Validate { start, rule } => {
            let start = parse_rfc3339(&start)?;
            let rule = rule.resolve(&config)?;
            let validation = validate_rule_with_limits(start, &rule, &config.expansion)?;
            print_json(&validation)?;
            Ok(if validation.is_valid {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }

        Command::Conflicts {
            candidate,
            existing,
            exclude,
            scope,
            fail_on_conflict,
        } => {
            let candidate: AppointmentInstance = read_json(&candidate).context("reading candidate")?;
            let existing: Vec<AppointmentInstance> =
                read_json(&existing).context("reading existing appointments")?;
            let mut options = config.conflict_options();
            if let Some(scope) = scope {
                options.scope = scope.into();
            }
            let report = check_conflicts(&candidate, &existing, exclude.as_deref(), &options)?;
            print_json(&report)?;
            Ok(if report.has_conflict && fail_on_conflict {
                ExitCode::from(2)
            } else {
                ExitCode::SUCCESS
            })
        }

        Command::Suggest {
            start,
            duration,
            therapist,
            existing,
        } => {
            let start: DateTime<Utc> = parse_rfc3339(&start)?;
            let existing: Vec<AppointmentInstance> = match existing {
                Some(existing) => read_json(&existing).context("reading existing appointments")?,
                None => Vec::new(),
            };
            let suggestion =
                suggest_next_slot(start, duration, &therapist, &existing, &config.slot_options());
            let output = match suggestion {
                Some(s) => json!({
                    "time": s.time,
                    "reason": s.reason,
                    "description": s.reason.to_string(),
                }),
                None => json!(null),
            };
            print_json(&output)?;
            Ok(ExitCode::SUCCESS)
        }

        Command::Rrule { action } => {
            match action {
                RruleAction::Parse { value } => print_json(&parse_rrule(&value)?)?,
                RruleAction::Format { rule } => {
                    let rule: RecurrenceRule = read_json(&rule).context("reading rule")?;
                    println!("{}", format_rrule(&rule));
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

impl RuleInput {
    fn resolve(&self, config: &EngineConfig) -> Result<RecurrenceRule> {
        let mut rule = match (&self.rule, &self.rrule) {
            (Some(rule), _) => read_json::<RecurrenceRule>(rule).context("reading recurrence rule")?,
            (None, Some(rrule)) => parse_rrule(rrule)?,
            (None, None) => bail!("either --rule or --rrule is required"),
        };
        if let Some(until) = &self.until {
            rule.end_date = Some(parse_end_date(until, &config.timezone)?);
        }
        Ok(rule)
    }
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            EngineConfig::from_json_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    if let Some(tz) = &cli.tz {
        config.timezone = parse_timezone(tz)?;
    }
    Ok(config)
}

/// Read a path, `-` (stdin) or an inline JSON document.
fn read_input(arg: &str) -> Result<String> {
    let trimmed = arg.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Ok(arg.to_string());
    }
    if arg == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).context("reading stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(arg).with_context(|| format!("reading {arg}"))
}

fn read_json<T: serde::de::DeserializeOwned>(arg: &str) -> Result<T> {
    let text = read_input(arg)?;
    serde_json::from_str(&text).context("invalid JSON")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
