//! `loom-link` — charger, canonicaliser et empaqueter des assemblies Loom
//!
//! Exemples :
//!   loom-link load Game.loomlib -L libs --json
//!   loom-link canon Game.loomlib -o Game.loomlib
//!   loom-link bundle Game.loomlib -L libs            # → Game.loom
//!   LOOM_LIBRARY_PATH=libs:vendor loom-link load Game.loom
//!
//! Ici : parsing d'arguments, traces, et délégation à `loom_cli` (lib).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};

use loom_cli as cli;
use loom_core::BytecodeMode;

// ──────────────────────────── CLI (clap) ────────────────────────────

#[derive(Debug, Parser)]
#[command(name = "loom-link", version, about = "Linker d'assemblies Loom", long_about = None)]
struct Opt {
    /// Augmente la verbosité (-v, -vv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    /// N'affiche que les erreurs
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue, global = true)]
    quiet: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Args)]
struct LinkArgs {
    /// Dossier de bibliothèques (*.loomlib), répétable ; consulté avant LOOM_LIBRARY_PATH
    #[arg(short = 'L', long = "lib-path")]
    lib_path: Vec<PathBuf>,

    /// Ignore LOOM_LIBRARY_PATH
    #[arg(long = "no-env", action = ArgAction::SetTrue)]
    no_env: bool,

    /// Document servi pour l'assembly `System`
    #[arg(long)]
    system: Option<PathBuf>,

    /// Exige du bytecode JIT
    #[arg(long, conflicts_with = "interpreted")]
    jit: bool,

    /// Exige du bytecode interprété
    #[arg(long)]
    interpreted: bool,
}

impl LinkArgs {
    fn options(self) -> cli::LinkOptions {
        let mode = if self.jit {
            BytecodeMode::Jit
        } else if self.interpreted {
            BytecodeMode::Interpreted
        } else {
            BytecodeMode::native()
        };
        cli::LinkOptions { library_paths: self.lib_path, use_env: !self.no_env, system: self.system, mode }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Charger et lier une assembly, puis résumer le graphe
    Load {
        /// Assembly (.loomlib ou .loom)
        input: PathBuf,
        /// Résumé JSON sur stdout
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        link: LinkArgs,
    },

    /// Réécrire une assembly sous forme canonique
    Canon {
        /// Assembly source
        input: PathBuf,
        /// Fichier de sortie (stdout si omis)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        link: LinkArgs,
    },

    /// Empaqueter une racine et ses bibliothèques en exécutable
    Bundle {
        /// Assembly racine
        root: PathBuf,
        /// Exécutable produit (défaut : même nom + .loom)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        link: LinkArgs,
    },

    /// Générer un uid d'assembly
    Uid,
}

// ──────────────────────────── main ────────────────────────────

fn main() -> ExitCode {
    if let Err(e) = real_main() {
        eprintln!("{}", error_line(&e));
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

/// Erreur et toute sa chaîne de causes sur une ligne.
fn error_line(e: &anyhow::Error) -> String { format!("❌ {e:#}") }

fn real_main() -> Result<()> {
    let opt = Opt::parse();
    cli::init_logger(opt.verbose, opt.quiet);

    match opt.cmd {
        Command::Load { input, json, link } => {
            let summary = cli::load_file(&input, &link.options())?.summary();
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                cli::print_summary(&summary);
            }
        },
        Command::Canon { input, output, link } => {
            let text = cli::canonicalize_file(&input, output.as_deref(), &link.options())?;
            if output.is_none() {
                println!("{text}");
            }
        },
        Command::Bundle { root, output, link } => {
            let output = output.unwrap_or_else(|| cli::default_executable_path(&root));
            cli::bundle_file(&root, &output, &link.options())?;
            cli::status_ok("écrit", &output.to_string_lossy());
        },
        Command::Uid => println!("{}", cli::generate_uid()),
    }
    Ok(())
}
