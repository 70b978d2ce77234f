//! The noesis command-line interface.
//!
//! Exit codes: 0 success, 1 logical failure (unprovable / no bindings),
//! 2 user error, 3 resource exhaustion, 4 internal invariant violation.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::debug;

use noesis::{
    default_limits, read_snapshot, write_snapshot, Hints, ModalSystem, ProofStatus, Semantics,
    Session, SessionError, Strategy, DEFAULT_CONTEXT,
};

#[derive(Parser)]
#[command(name = "noesis", version, about = "symbolic cognition kernel")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a formula and print its canonical serialized form.
    Parse {
        formula: String,
    },
    /// Type-check a formula and print its type.
    Typecheck {
        formula: String,
    },
    /// Prove a goal from asserted axioms.
    Prove {
        goal: String,
        /// Axioms, each asserted into the default context.
        #[arg(long = "axiom")]
        axioms: Vec<String>,
        /// Restore the knowledge base from a snapshot first.
        #[arg(long)]
        kb: Option<String>,
        /// Modal system for tableau goals.
        #[arg(long)]
        system: Option<String>,
        /// Force a strategy: resolution, tableau, argumentation.
        #[arg(long)]
        strategy: Option<String>,
        /// Defeasible semantics: grounded, preferred.
        #[arg(long)]
        semantics: Option<String>,
        /// Wall-clock budget in milliseconds.
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Emit the proof object as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Run a shallow query against the store.
    Query {
        pattern: String,
        #[arg(long = "axiom")]
        axioms: Vec<String>,
        #[arg(long)]
        kb: Option<String>,
    },
    /// Assert statements and write a snapshot.
    Snapshot {
        /// File of statements, one per line (`-` for stdin).
        input: String,
        /// Snapshot file to write.
        #[arg(long, short)]
        out: String,
    },
    /// Load a snapshot and print a summary.
    Restore {
        snapshot: String,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            match e {
                SessionError::Engine(noesis::EngineError::InvariantViolation(_))
                | SessionError::Store(noesis::StoreError::InvariantViolation(_)) => {
                    ExitCode::from(4)
                }
                _ => ExitCode::from(2),
            }
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, SessionError> {
    match cli.command {
        Command::Parse { formula } => {
            let mut session = Session::new();
            let t = session.parse(&formula)?;
            println!("{}", session.print(t));
            Ok(ExitCode::SUCCESS)
        }
        Command::Typecheck { formula } => {
            let mut session = Session::new();
            let t = session.parse(&formula)?;
            let ty = session.terms.ty(t).clone();
            println!("{}", noesis_language::print_type(&session.terms, &ty));
            Ok(ExitCode::SUCCESS)
        }
        Command::Prove {
            goal,
            axioms,
            kb,
            system,
            strategy,
            semantics,
            timeout_ms,
            json,
        } => {
            let mut session = load_session(kb.as_deref())?;
            for axiom in &axioms {
                session.assert(axiom)?;
            }
            let hints = Hints {
                strategy: strategy.as_deref().map(parse_strategy).transpose()?,
                modal_system: system.as_deref().map(parse_system).transpose()?,
                semantics: semantics.as_deref().map(parse_semantics).transpose()?,
            };
            let mut limits = default_limits();
            if let Some(ms) = timeout_ms {
                limits.time_ms = ms;
            }
            debug!("proving '{}' with {:?}", goal, hints);
            let po = session.prove_with(&goal, &[DEFAULT_CONTEXT], &hints, Some(limits))?;
            if json {
                println!("{}", proof_json(&mut session, &po));
            } else {
                print!("{}", session.render_proof(&po));
            }
            Ok(match po.status {
                ProofStatus::Proved | ProofStatus::Contradiction => ExitCode::SUCCESS,
                ProofStatus::ResourceExhausted(_) => ExitCode::from(3),
                _ => ExitCode::from(1),
            })
        }
        Command::Query { pattern, axioms, kb } => {
            let mut session = load_session(kb.as_deref())?;
            for axiom in &axioms {
                session.assert(axiom)?;
            }
            let results = session.query(&pattern)?;
            for binding in &results {
                let mut entries: Vec<String> = binding
                    .iter()
                    .map(|(var, term)| {
                        let name = session
                            .terms
                            .var_term(*var)
                            .map(|vt| session.print(vt))
                            .unwrap_or_else(|| format!("?#{}", var.0));
                        let rendered = session.print(*term);
                        format!("{} -> {}", name, rendered)
                    })
                    .collect();
                entries.sort();
                println!("{{{}}}", entries.join(", "));
            }
            if results.is_empty() {
                Ok(ExitCode::from(1))
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
        Command::Snapshot { input, out } => {
            let mut session = Session::new();
            let text = if input == "-" {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .map_err(|e| SessionError::Io(e.to_string()))?;
                buf
            } else {
                std::fs::read_to_string(&input).map_err(|e| SessionError::Io(e.to_string()))?
            };
            for line in text.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with(';') {
                    continue;
                }
                session.assert(line)?;
            }
            let file = File::create(&out).map_err(|e| SessionError::Io(e.to_string()))?;
            let mut writer = BufWriter::new(file);
            write_snapshot(&mut session, &mut writer)?;
            println!("snapshot written to {}", out);
            Ok(ExitCode::SUCCESS)
        }
        Command::Restore { snapshot } => {
            let session = load_session(Some(&snapshot))?;
            let contexts = session.kb.contexts_in_order();
            println!("restored {} contexts:", contexts.len());
            for (name, parent, kind) in contexts {
                match parent {
                    Some(p) => println!("  {} (parent {}, {:?})", name, p, kind),
                    None => println!("  {} ({:?})", name, kind),
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_session(kb: Option<&str>) -> Result<Session, SessionError> {
    match kb {
        Some(path) => {
            let file = File::open(path).map_err(|e| SessionError::Io(e.to_string()))?;
            read_snapshot(&mut BufReader::new(file))
        }
        None => Ok(Session::new()),
    }
}

fn parse_system(name: &str) -> Result<ModalSystem, SessionError> {
    match name.to_ascii_lowercase().as_str() {
        "k" => Ok(ModalSystem::K),
        "t" => Ok(ModalSystem::T),
        "b" => Ok(ModalSystem::B),
        "s4" => Ok(ModalSystem::S4),
        "s5" => Ok(ModalSystem::S5),
        other => Err(SessionError::Io(format!("unknown modal system '{}'", other))),
    }
}

fn parse_strategy(name: &str) -> Result<Strategy, SessionError> {
    match name.to_ascii_lowercase().as_str() {
        "resolution" => Ok(Strategy::Resolution),
        "tableau" => Ok(Strategy::Tableau),
        "argumentation" => Ok(Strategy::Argumentation),
        other => Err(SessionError::Io(format!("unknown strategy '{}'", other))),
    }
}

fn parse_semantics(name: &str) -> Result<Semantics, SessionError> {
    match name.to_ascii_lowercase().as_str() {
        "grounded" => Ok(Semantics::Grounded),
        "preferred" => Ok(Semantics::Preferred),
        other => Err(SessionError::Io(format!("unknown semantics '{}'", other))),
    }
}

fn proof_json(session: &mut Session, po: &noesis::ProofObject) -> String {
    let mut bindings = serde_json::Map::new();
    for (var, term) in &po.bindings {
        let name = session
            .terms
            .var_term(*var)
            .map(|vt| session.print(vt))
            .unwrap_or_else(|| format!("?#{}", var.0));
        bindings.insert(name, serde_json::Value::String(session.print(*term)));
    }
    let steps: Vec<serde_json::Value> = po
        .proof_steps
        .iter()
        .map(|s| {
            serde_json::json!({
                "rule": s.rule,
                "premises": s.premises,
                "conclusion": session.print(s.conclusion),
            })
        })
        .collect();
    let value = serde_json::json!({
        "goal_achieved": po.goal_achieved,
        "status": format!("{:?}", po.status),
        "engine": format!("{:?}", po.engine),
        "conclusion": po.conclusion.map(|c| session.print(c)),
        "bindings": bindings,
        "proof_steps": steps,
        "time_ms": po.time_ms,
        "resources": po.resources_consumed,
        "message": po.message,
    });
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
}
