//! loom-cli — bibliothèque interne du binaire `loom-link`
//!
//! Le parsing d'arguments reste dans `main.rs` ; ici :
//! - construction du [`LoadContext`] (env `LOOM_LIBRARY_PATH`, `-L`, bootstrap `System`)
//! - chargement/lien d'un fichier et résumé du graphe obtenu
//! - réécriture canonique (`canon`) et empaquetage d'exécutable (`bundle`)
//! - traces (`tracing-subscriber`) et couleurs (`feature = "color"`)

#![deny(unused_must_use)]

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

use loom_assembly::{
    link_executable, AssemblyReader, AssemblyWriter, EmbeddedSystem, InMemoryRegistry, LoadContext,
    TypeTableCodec,
};
use loom_core::{AssemblyRef, BytecodeMode, RandomUid, UidProvider, EXECUTABLE_EXTENSION};

#[cfg(feature = "color")]
use owo_colors::OwoColorize;

// ───────────────────────────── Options ─────────────────────────────

/// Réglages communs aux commandes qui chargent des assemblies.
#[derive(Clone, Debug)]
pub struct LinkOptions {
    /// Dossiers `-L`, consultés avant ceux de `LOOM_LIBRARY_PATH`.
    pub library_paths: Vec<PathBuf>,
    /// Lire aussi `LOOM_LIBRARY_PATH`.
    pub use_env: bool,
    /// Document servi pour `System` à la place des fichiers.
    pub system: Option<PathBuf>,
    /// Mode de bytecode exigé.
    pub mode: BytecodeMode,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self { library_paths: Vec::new(), use_env: true, system: None, mode: BytecodeMode::native() }
    }
}

impl LinkOptions {
    /// Contexte de chargement correspondant.
    pub fn context(&self) -> Result<LoadContext> {
        let mut ctx = LoadContext::new();
        for dir in &self.library_paths {
            ctx.add_library_path(dir);
        }
        if self.use_env {
            for dir in LoadContext::from_env().search_path() {
                ctx.add_library_path(dir);
            }
        }
        if let Some(path) = &self.system {
            let text = read_text(path)?;
            ctx = ctx.with_bootstrap(EmbeddedSystem::new(text));
        }
        Ok(ctx)
    }
}

// ───────────────────────────── Chargement ─────────────────────────────

/// Assembly racine liée et registre de tout ce qui a été chargé.
#[derive(Debug)]
pub struct Loaded {
    /// Racine.
    pub root: AssemblyRef,
    /// Registre, dans l'ordre d'enregistrement.
    pub registry: InMemoryRegistry,
}

/// Résumé affichable d'un chargement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub name: String,
    pub uid: String,
    pub version: String,
    pub mode: BytecodeMode,
    pub executable: bool,
    pub references: Vec<String>,
    pub modules: usize,
    pub types: usize,
    /// Assemblies du registre, racine comprise.
    pub loaded: Vec<String>,
}

impl Loaded {
    /// Résumé de la racine et du registre.
    pub fn summary(&self) -> Summary {
        let root = self.root.borrow();
        Summary {
            name: root.name().to_owned(),
            uid: root.uid().to_owned(),
            version: root.version().to_owned(),
            mode: root.bytecode_mode(),
            executable: root.is_executable(),
            references: root.references().to_vec(),
            modules: root.modules().len(),
            types: root.type_count(),
            loaded: self.registry.iter().map(|a| a.borrow().name().to_owned()).collect(),
        }
    }
}

/// Charge et lie `path`.
pub fn load_file(path: &Path, opts: &LinkOptions) -> Result<Loaded> {
    let text = read_text(path)?;
    let mut ctx = opts.context()?;
    let mut registry = InMemoryRegistry::new();
    let root = AssemblyReader::new(opts.mode)
        .load_from(&text, &display(path), &mut ctx, &mut registry, &mut TypeTableCodec)
        .with_context(|| format!("lien de {}", display(path)))?;
    Ok(Loaded { root, registry })
}

/// Recharge `input` et le réécrit sous forme canonique (uid attribué si absent).
///
/// Un exécutable est refusé : ses charges embarquées ne survivent pas au chargement.
pub fn canonicalize_file(input: &Path, output: Option<&Path>, opts: &LinkOptions) -> Result<String> {
    let loaded = load_file(input, opts)?;
    let root = loaded.root.borrow();
    if root.is_executable() {
        bail!("{} est un exécutable ; réempaqueter depuis la racine avec `bundle`", display(input));
    }
    let writer = AssemblyWriter::new(opts.mode);
    let text = writer.write_to_string(&root, &TypeTableCodec)?;
    if let Some(out) = output {
        write_atomic(out, |tmp| Ok(writer.write_to_file(&root, &TypeTableCodec, tmp)?))?;
        info!(assembly = root.name(), output = %crate::display(out), "assembly canonique écrite");
    }
    Ok(text)
}

/// Empaquette la racine `root` en exécutable `output`.
pub fn bundle_file(root: &Path, output: &Path, opts: &LinkOptions) -> Result<()> {
    let text = read_text(root)?;
    let ctx = opts.context()?;
    let exe = link_executable(&text, &ctx).with_context(|| format!("empaquetage de {}", display(root)))?;
    write_atomic(output, |tmp| write_text(tmp, &exe))?;
    info!(root = %crate::display(root), output = %crate::display(output), "exécutable écrit");
    Ok(())
}

/// `Main.loomlib` → `Main.loom`.
pub fn default_executable_path(root: &Path) -> PathBuf { root.with_extension(EXECUTABLE_EXTENSION) }

/// Nouvel uid canonique.
pub fn generate_uid() -> String { RandomUid.generate() }

// ───────────────────────────── Initialisation ─────────────────────────────

/// Installe le subscriber `tracing` ; `RUST_LOG` l'emporte sur la verbosité.
pub fn init_logger(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).try_init();
}

// ───────────────────────────── Utilitaires E/S ─────────────────────────────

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("ouverture: {}", display(path)))
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    let file = File::create(path).with_context(|| format!("création: {}", display(path)))?;
    let mut w = BufWriter::new(file);
    w.write_all(text.as_bytes())?;
    w.flush()?;
    Ok(())
}

/// `write` remplit un fichier temporaire voisin, renommé ensuite en `path`.
fn write_atomic(path: &Path, write: impl FnOnce(&Path) -> Result<()>) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if p.as_os_str().is_empty() => Path::new("."),
        Some(p) => p,
        None => return Err(anyhow!("chemin de sortie sans parent: {}", display(path))),
    };
    let tmp = unique_tmp_path(parent, path.file_name().unwrap_or_default());
    if let Err(e) = write(&tmp) {
        if let Err(cleanup) = fs::remove_file(&tmp) {
            debug!(tmp = %crate::display(&tmp), error = %cleanup, "temporaire non supprimé");
        }
        return Err(e);
    }
    if path.exists() {
        // Windows : rename sur cible existante peut échouer
        if let Err(e) = fs::remove_file(path) {
            debug!(path = %crate::display(path), error = %e, "cible non supprimée avant renommage");
        }
    }
    fs::rename(&tmp, path).with_context(|| format!("écriture: {}", display(path)))
}

fn unique_tmp_path(dir: &Path, base: &std::ffi::OsStr) -> PathBuf {
    let mut i = 0u32;
    loop {
        let candidate = dir.join(format!("{}.tmp{}", base.to_string_lossy(), i));
        if !candidate.exists() {
            return candidate;
        }
        i = i.wrapping_add(1);
    }
}

fn display(p: &Path) -> String { p.to_string_lossy().to_string() }

// ───────────────────────────── Sorties jolies ─────────────────────────────

/// Affiche un résumé lisible sur stdout.
pub fn print_summary(summary: &Summary) {
    let kind = if summary.executable { "exécutable" } else { "bibliothèque" };
    status_ok("lié", &format!("{} {} ({kind}, bytecode {})", summary.name, summary.version, summary.mode));
    println!("  uid        : {}", summary.uid);
    println!("  références : {}", if summary.references.is_empty() { "-".to_owned() } else { summary.references.join(", ") });
    println!("  modules    : {} ({} types)", summary.modules, summary.types);
    println!("  chargées   : {}", summary.loaded.join(", "));
}

/// Ligne de statut verte sur stderr.
pub fn status_ok(tag: &str, msg: &str) {
    #[cfg(feature = "color")]
    {
        eprintln!("{} {}", tag.green().bold(), msg);
    }
    #[cfg(not(feature = "color"))]
    {
        eprintln!("{tag} {msg}");
    }
}

// ───────────────────────────── Tests ─────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn lib(name: &str, refs: &[&str]) -> String {
        json!({
            "type": "ASSEMBLY", "name": name, "version": "1.0", "uid": "", "loomconfig": "{}",
            "jit": false, "references": refs.iter().map(|r| json!({"name": r})).collect::<Vec<_>>(),
            "modules": [{"type": "MODULE", "name": name, "types": [{"name": "Main", "package": name.to_lowercase()}]}]
        })
        .to_string()
    }

    fn opts(dir: &Path) -> LinkOptions {
        LinkOptions {
            library_paths: vec![dir.to_path_buf()],
            use_env: false,
            system: None,
            mode: BytecodeMode::Interpreted,
        }
    }

    #[test]
    fn load_summarizes_graph() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("UI.loomlib"), lib("UI", &[])).unwrap();
        let main = dir.path().join("Main.loomlib");
        fs::write(&main, lib("Main", &["UI"])).unwrap();

        let s = load_file(&main, &opts(dir.path())).unwrap().summary();
        assert_eq!(s.name, "Main");
        assert_eq!(s.references, ["UI"]);
        assert_eq!(s.loaded, ["Main", "UI"]);
        assert_eq!((s.modules, s.types), (1, 1));
        assert!(!s.executable);
        assert_eq!(serde_json::to_value(&s).unwrap()["mode"], "interpreted");
    }

    #[test]
    fn system_override_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let system = dir.path().join("boot.json");
        fs::write(&system, lib("System", &[])).unwrap();
        let main = dir.path().join("Main.loomlib");
        fs::write(&main, lib("Main", &["System"])).unwrap();

        let mut o = opts(dir.path());
        o.library_paths.clear();
        o.system = Some(system);
        assert_eq!(load_file(&main, &o).unwrap().summary().loaded, ["Main", "System"]);
    }

    #[test]
    fn bundle_then_load_without_library_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("UI.loomlib"), lib("UI", &["Gfx"])).unwrap();
        fs::write(dir.path().join("Gfx.loomlib"), lib("Gfx", &[])).unwrap();
        let root = dir.path().join("Main.loomlib");
        fs::write(&root, lib("Main", &["UI"])).unwrap();

        let out = default_executable_path(&root);
        bundle_file(&root, &out, &opts(dir.path())).unwrap();
        assert_eq!(out.file_name().unwrap(), "Main.loom");

        let empty = tempfile::tempdir().unwrap();
        let s = load_file(&out, &opts(empty.path())).unwrap().summary();
        assert!(s.executable);
        assert_eq!(s.loaded, ["Main", "UI", "Gfx"]);
    }

    #[test]
    fn canon_assigns_uid_and_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("Main.loomlib");
        fs::write(&input, lib("Main", &[])).unwrap();
        let output = dir.path().join("Main.canon.loomlib");

        let first = canonicalize_file(&input, Some(&output), &opts(dir.path())).unwrap();
        let v: Value = serde_json::from_str(&first).unwrap();
        assert!(loom_core::is_canonical_uid(v["uid"].as_str().unwrap()));

        let second = canonicalize_file(&output, None, &opts(dir.path())).unwrap();
        assert_eq!(first, second);
        assert_eq!(fs::read_to_string(&output).unwrap(), first);
    }

    #[test]
    fn canon_rejects_executables() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("Main.loomlib");
        fs::write(&root, lib("Main", &[])).unwrap();
        let exe = dir.path().join("Main.loom");
        bundle_file(&root, &exe, &opts(dir.path())).unwrap();

        let err = canonicalize_file(&exe, None, &opts(dir.path())).unwrap_err();
        assert!(err.to_string().contains("exécutable"));
    }

    #[test]
    fn link_errors_keep_their_cause() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("Main.loomlib");
        fs::write(&main, lib("Main", &["Ghost"])).unwrap();

        let err = load_file(&main, &opts(dir.path())).unwrap_err();
        let cause = err.downcast_ref::<loom_core::LinkError>().unwrap();
        assert_eq!(cause.kind(), loom_core::ErrorKind::UnresolvedReference);
    }

    #[test]
    fn canon_reports_write_errors() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("Main.loomlib");
        fs::write(&input, lib("Main", &[])).unwrap();
        let output = dir.path().join("absent").join("Main.loomlib");

        let err = canonicalize_file(&input, Some(&output), &opts(dir.path())).unwrap_err();
        let cause = err.downcast_ref::<loom_core::LinkError>().unwrap();
        assert_eq!(cause.kind(), loom_core::ErrorKind::Write);
        assert!(!output.exists());
    }

    #[test]
    fn atomic_write_replaces_existing_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("Main.loom");
        fs::write(&target, "ancien").unwrap();
        write_atomic(&target, |tmp| write_text(tmp, "nouveau")).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "nouveau");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn uid_is_canonical() {
        assert!(loom_core::is_canonical_uid(&generate_uid()));
    }
}
