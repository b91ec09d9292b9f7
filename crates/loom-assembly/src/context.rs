//! Contexte d'un chargement : chemin de recherche, bundle de l'exécutable, bootstrap.
//!
//! Le chemin de recherche est configuré une fois et reste stable d'une
//! session à l'autre. Le bundle ne vit que le temps du chargement
//! transitif d'un exécutable : il est vide avant, et vidé après.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use loom_core::{LinkError, LinkResult, LIBRARY_EXTENSION, SYSTEM_ASSEMBLY};

/// Variable d'environnement listant des dossiers de bibliothèques.
pub const LIBRARY_PATH_ENV: &str = "LOOM_LIBRARY_PATH";

/* ─────────────────────────── Bootstrap ─────────────────────────── */

/// Fournit directement le document de certaines assemblies bien connues.
pub trait BootstrapProvider {
    /// Texte de l'assembly `name`, si ce fournisseur la connaît.
    fn document(&self, name: &str) -> Option<String>;
}

/// Assembly `System` embarquée (builds qui gardent le compilateur).
#[derive(Debug, Clone)]
pub struct EmbeddedSystem {
    text: String,
}

impl EmbeddedSystem {
    /// Embarque le texte de `System`.
    pub fn new(text: impl Into<String>) -> Self { Self { text: text.into() } }
}

impl BootstrapProvider for EmbeddedSystem {
    fn document(&self, name: &str) -> Option<String> {
        (name == SYSTEM_ASSEMBLY).then(|| self.text.clone())
    }
}

/* ─────────────────────────── Contexte ─────────────────────────── */

/// État mutable d'une session de chargement.
#[derive(Default)]
pub struct LoadContext {
    search_path: Vec<PathBuf>,
    bundled: HashMap<String, String>,
    bootstrap: Option<Box<dyn BootstrapProvider>>,
}

impl fmt::Debug for LoadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut bundled: Vec<&str> = self.bundled.keys().map(String::as_str).collect();
        bundled.sort_unstable();
        f.debug_struct("LoadContext")
            .field("search_path", &self.search_path)
            .field("bundled", &bundled)
            .field("bootstrap", &self.bootstrap.is_some())
            .finish()
    }
}

impl LoadContext {
    /// Contexte vide.
    pub fn new() -> Self { Self::default() }

    /// Contexte dont le chemin de recherche vient de `LOOM_LIBRARY_PATH`.
    pub fn from_env() -> Self {
        let mut ctx = Self::new();
        if let Some(paths) = env::var_os(LIBRARY_PATH_ENV) {
            for dir in env::split_paths(&paths).filter(|p| !p.as_os_str().is_empty()) {
                ctx.add_library_path(dir);
            }
        }
        ctx
    }

    /// Installe un fournisseur de bootstrap.
    #[must_use]
    pub fn with_bootstrap(mut self, provider: impl BootstrapProvider + 'static) -> Self {
        self.bootstrap = Some(Box::new(provider));
        self
    }

    /// Ajoute un dossier en fin de chemin de recherche.
    pub fn add_library_path(&mut self, dir: impl Into<PathBuf>) { self.search_path.push(dir.into()); }

    /// Chemin de recherche, dans l'ordre de consultation.
    pub fn search_path(&self) -> &[PathBuf] { &self.search_path }

    /// Document fourni par le bootstrap, s'il y en a un.
    pub fn bootstrap_document(&self, name: &str) -> Option<String> {
        self.bootstrap.as_ref().and_then(|b| b.document(name))
    }

    /// Charge embarquée pour `name`.
    pub fn bundled(&self, name: &str) -> Option<&str> { self.bundled.get(name).map(String::as_str) }

    /// Nombre de charges embarquées en attente.
    pub fn bundled_len(&self) -> usize { self.bundled.len() }

    pub(crate) fn bundle(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.bundled.insert(name.into(), text.into());
    }

    pub(crate) fn clear_bundle(&mut self) { self.bundled.clear(); }

    /// Premier `<dir>/<name>.loomlib` existant du chemin de recherche.
    ///
    /// Un fichier absent fait passer au dossier suivant ; toute autre erreur
    /// de lecture est remontée.
    pub fn find_library(&self, name: &str) -> LinkResult<Option<(PathBuf, String)>> {
        for dir in &self.search_path {
            let path = library_file(dir, name);
            match fs::read_to_string(&path) {
                Ok(text) => {
                    debug!(assembly = name, path = %path.display(), "bibliothèque trouvée");
                    return Ok(Some((path, text)));
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(source) => return Err(LinkError::Io { path, source }),
            }
        }
        Ok(None)
    }
}

/// Chemin du fichier de bibliothèque `name` dans `dir`.
pub fn library_file(dir: &Path, name: &str) -> PathBuf { dir.join(format!("{name}.{LIBRARY_EXTENSION}")) }
