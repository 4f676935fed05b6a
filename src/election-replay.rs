//! Replay a scripted election against a fresh in-memory system.
//! Each step can pin the clock and state which error, if any, it expects,
//! so a scenario doubles as an executable description of the rules.

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use clap::{Arg, ArgAction, ArgMatches, Command};
use log::{info, LevelFilter};
use serde::Deserialize;

use election_registry::{
    clock::{ManualClock, Timestamp},
    logging,
    model::{
        candidate::CandidateId, event::LoggingSink, identity::Identity,
        results::ElectionResults, voter::VoterHash,
    },
    Config, ElectionSystem, ErrorKind,
};

const PROGRAM_NAME: &str = "election-replay";

const ABOUT_TEXT: &str = "Replay an election scenario and check every step behaves as expected.

EXIT CODES:
     0: Every step behaved as expected.
     1: The scenario could not be read or configured.
   255: Ran successfully, but a step did not behave as expected.";

const SCENARIO_PATH: &str = "SCENARIO_PATH";

const SCENARIO_PATH_HELP: &str = "The path to a JSON scenario: an optional `config`\n\
and a list of `steps`, each with an `op`, an optional clock time `at`,\n\
and an optional expected error kind `expect`";

const QUIET: &str = "quiet";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .arg(
            Arg::new(SCENARIO_PATH)
                .help(SCENARIO_PATH_HELP)
                .action(ArgAction::Set)
                .required(true),
        )
        .arg(
            Arg::new(QUIET)
                .short('q')
                .long(QUIET)
                .help("Only log warnings and errors")
                .action(ArgAction::SetTrue),
        )
}

/// Errors that this program may produce.
#[derive(Debug, Eq, PartialEq)]
enum Error {
    /// IO error described by the inner message.
    IO(String),
    /// Failed to decode the scenario.
    Format(String),
    /// The configuration could not be loaded, or the system could not be built.
    Config(String),
    /// A step did not behave as the scenario said it would.
    Unexpected {
        step: usize,
        expected: Option<ErrorKind>,
        actual: Option<ErrorKind>,
    },
}

/// A scripted election.
#[derive(Debug, Deserialize)]
struct Scenario {
    /// Falls back to `Election.toml` and the environment.
    #[serde(default)]
    config: Option<Config>,
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
struct Step {
    /// Move the clock here before running the operation.
    #[serde(default)]
    at: Option<Timestamp>,
    #[serde(flatten)]
    op: Op,
    /// The kind of error the operation should fail with, if any.
    #[serde(default)]
    expect: Option<ErrorKind>,
}

/// Operations a step can run. Voters are named by their real-world identifier
/// and hashed with the configured secret; the identifier itself never reaches
/// the registry. Privileged operations run as the configured administrator
/// unless a `caller` is given.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Op {
    Register {
        voter: String,
        #[serde(default)]
        caller: Option<Identity>,
        #[serde(default)]
        holder: Option<Identity>,
    },
    MarkVoted {
        voter: String,
        #[serde(default)]
        caller: Option<Identity>,
    },
    AddCandidate {
        name: String,
        #[serde(default)]
        party: String,
        #[serde(default)]
        caller: Option<Identity>,
    },
    StartElection {
        start_time: Timestamp,
        end_time: Timestamp,
        #[serde(default)]
        caller: Option<Identity>,
    },
    CastVote {
        voter: String,
        candidate_id: CandidateId,
    },
    EndElection {
        #[serde(default)]
        caller: Option<Identity>,
    },
    DeclareResults {
        #[serde(default)]
        caller: Option<Identity>,
    },
    GetResults,
}

/// What a successful replay produced.
#[derive(Debug, Eq, PartialEq)]
struct Replay {
    /// One line per step.
    outcomes: Vec<String>,
    /// Present if the results were declared by the end.
    results: Option<ElectionResults>,
}

/// The holder address used when a step doesn't name one.
fn default_holder(voter_hash: &VoterHash) -> Identity {
    Identity::new(format!("holder:{voter_hash}"))
}

/// Run one step against the system.
fn apply(system: &ElectionSystem, config: &Config, op: &Op) -> election_registry::Result<String> {
    let admin = config.administrator();
    let hash = |voter: &str| VoterHash::from_identifier(voter, config);
    match op {
        Op::Register {
            voter,
            caller,
            holder,
        } => {
            let voter_hash = hash(voter.as_str());
            let holder = holder
                .clone()
                .unwrap_or_else(|| default_holder(&voter_hash));
            system
                .registry()
                .register(caller.as_ref().unwrap_or(admin), voter_hash, holder)?;
            Ok(format!("registered {voter}"))
        }
        Op::MarkVoted { voter, caller } => {
            system
                .registry()
                .mark_voted(caller.as_ref().unwrap_or(admin), hash(voter.as_str()))?;
            Ok(format!("marked {voter} as voted"))
        }
        Op::AddCandidate {
            name,
            party,
            caller,
        } => {
            let id = system.controller().add_candidate(
                caller.as_ref().unwrap_or(admin),
                name.as_str(),
                party.as_str(),
            )?;
            Ok(format!("added candidate {id}: {name}"))
        }
        Op::StartElection {
            start_time,
            end_time,
            caller,
        } => {
            system.controller().start_election(
                caller.as_ref().unwrap_or(admin),
                *start_time,
                *end_time,
            )?;
            Ok(format!("voting open over [{start_time}, {end_time}]"))
        }
        Op::CastVote {
            voter,
            candidate_id,
        } => {
            system.controller().cast_vote(hash(voter.as_str()), *candidate_id)?;
            Ok(format!("{voter} voted for candidate {candidate_id}"))
        }
        Op::EndElection { caller } => {
            system
                .controller()
                .end_election(caller.as_ref().unwrap_or(admin))?;
            Ok("election ended".to_string())
        }
        Op::DeclareResults { caller } => {
            system
                .controller()
                .declare_results(caller.as_ref().unwrap_or(admin))?;
            Ok("results declared".to_string())
        }
        Op::GetResults => {
            let results = system.controller().get_results()?;
            Ok(format!(
                "results: {:?} -> {:?}",
                results.candidate_ids, results.vote_counts
            ))
        }
    }
}

/// Run the scenario at `path`.
fn replay(path: &str) -> Result<Replay, Error> {
    // Load the file.
    let file = BufReader::new(File::open(path).map_err(|e| Error::IO(e.to_string()))?);
    let scenario: Scenario =
        serde_json::from_reader(file).map_err(|e| Error::Format(e.to_string()))?;

    // Build the system.
    let config = match scenario.config {
        Some(config) => config,
        None => Config::load().map_err(|e| Error::Config(e.to_string()))?,
    };
    let clock = ManualClock::default();
    let system = ElectionSystem::new(&config, Arc::new(clock.clone()), Arc::new(LoggingSink))
        .map_err(|e| Error::Config(e.to_string()))?;
    info!("Replaying {} steps from {path}", scenario.steps.len());

    // Run each step, checking it succeeds or fails as expected.
    let mut outcomes = Vec::with_capacity(scenario.steps.len());
    for (step, Step { at, op, expect }) in scenario.steps.iter().enumerate() {
        if let Some(at) = at {
            clock.set(*at);
        }
        let outcome = apply(&system, &config, op);
        let actual = outcome.as_ref().err().map(|e| e.kind());
        if actual != *expect {
            return Err(Error::Unexpected {
                step,
                expected: *expect,
                actual,
            });
        }
        outcomes.push(match outcome {
            Ok(description) => format!("#{step}: {description}"),
            Err(err) => format!("#{step}: rejected as expected: {err}"),
        });
    }

    Ok(Replay {
        outcomes,
        results: system.controller().get_results().ok(),
    })
}

fn describe(kind: Option<ErrorKind>) -> String {
    match kind {
        Some(kind) => format!("an error of kind {kind:?}"),
        None => "success".to_string(),
    }
}

/// Run the replay, report the outcome, and return the exit code.
fn run(args: &ArgMatches) -> u8 {
    let path: &String = args.get_one(SCENARIO_PATH).unwrap(); // Required argument is guaranteed to be present.
    match replay(path) {
        Ok(replay) => {
            for outcome in &replay.outcomes {
                println!("{outcome}");
            }
            if let Some(results) = replay.results {
                println!("Results:");
                for (id, count) in results.candidate_ids.iter().zip(&results.vote_counts) {
                    println!("  candidate {id}: {count} vote{}", if *count != 1 { "s" } else { "" });
                }
                println!("Winners: {:?}", results.winners());
            }
            println!("Replay succeeded.");
            0
        }
        Err(Error::IO(msg)) => {
            println!("IO error: {msg}");
            1
        }
        Err(Error::Format(msg)) => {
            println!("Invalid scenario: {msg}");
            1
        }
        Err(Error::Config(msg)) => {
            println!("Configuration error: {msg}");
            1
        }
        Err(Error::Unexpected {
            step,
            expected,
            actual,
        }) => {
            println!(
                "Replay failed: step #{step} expected {} but got {}.",
                describe(expected),
                describe(actual)
            );
            255
        }
    }
}

/// Set up logging from `log4rs.yaml`, or straight to the console if it can't be read.
fn init_logging(quiet: bool) {
    let level = if quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };
    if log4rs::init_file("log4rs.yaml", log4rs_dynamic_filters::default_deserializers()).is_ok() {
        log4rs_dynamic_filters::DynamicLevelFilter::set("election_registry", level);
    } else if let Err(err) = logging::init_console(level) {
        eprintln!("Failed to initialise logging: {err}");
    }
}

fn main() {
    let args = cli().get_matches();
    init_logging(args.get_flag(QUIET));
    let exit_code = run(&args);
    std::process::exit(exit_code.into())
}
