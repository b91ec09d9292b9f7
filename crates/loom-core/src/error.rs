//! Erreurs du chargement / lien d'assemblies.
//!
//! Toutes sont fatales pour l'opération en cours : le linker ne rend jamais
//! une assembly à moitié liée. C'est l'appelant de plus haut niveau (le
//! binaire `loom-link`) qui décide de terminer le processus.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::BytecodeMode;

/// Alias résultat commun au linker.
pub type LinkResult<T> = Result<T, LinkError>;

/// Catégorie d'une [`LinkError`], pratique pour les tests et les codes de sortie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Document textuel malformé.
    Parse,
    /// Violation du schéma (discriminant, champ manquant ou mal typé).
    Schema,
    /// Bytecode produit pour une autre stratégie d'exécution.
    BytecodeMode,
    /// Référence introuvable (bundle, bootstrap et chemin de recherche).
    UnresolvedReference,
    /// Référence vers une assembly encore en cours de lien.
    CircularReference,
    /// Référence d'un exécutable sans charge `binary`.
    MissingBinary,
    /// Charge `binary` non décodable.
    InvalidBinary,
    /// Échec remonté par le codec de modules.
    Module,
    /// Lecture d'un fichier de bibliothèque impossible.
    Io,
    /// Écriture de la destination impossible.
    Write,
}

/// Erreurs du linker.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Document malformé ; `origin` désigne l'entrée ou la référence lue.
    #[error("document d'assembly malformé ({origin}), ligne {line} colonne {column} : {message}")]
    Parse {
        /// Entrée d'où provient le texte.
        origin: String,
        /// Ligne (1-based) de l'erreur.
        line: usize,
        /// Colonne (1-based) de l'erreur.
        column: usize,
        /// Message du parseur.
        message: String,
    },

    /// Schéma invalide (discriminant absent/faux, champ requis manquant…).
    #[error("assembly {} : {message}", .name.as_deref().unwrap_or("<sans nom>"))]
    Schema {
        /// Nom déclaré par le document, s'il existe.
        name: Option<String>,
        /// Détail de la violation.
        message: String,
    },

    /// Mode de bytecode incompatible avec le lecteur.
    #[error("l'assembly {name}.loom contient du bytecode {found}, bytecode {expected} requis")]
    BytecodeMode {
        /// Assembly fautive.
        name: String,
        /// Mode déclaré par le document.
        found: BytecodeMode,
        /// Mode du lecteur.
        expected: BytecodeMode,
    },

    /// Référence introuvable.
    #[error("impossible de charger l'assembly '{reference}' (référencée par '{assembly}') comme bibliothèque ou exécutable")]
    UnresolvedReference {
        /// Assembly qui référence.
        assembly: String,
        /// Nom de la référence manquante.
        reference: String,
    },

    /// Cycle de références.
    #[error("référence circulaire : '{assembly}' référence '{reference}' dont le lien est encore en cours")]
    CircularReference {
        /// Assembly qui référence.
        assembly: String,
        /// Assembly en cours de lien rencontrée à nouveau.
        reference: String,
    },

    /// Charge embarquée absente dans un exécutable.
    #[error("assembly liée '{reference}' de l'exécutable '{assembly}' : section binary manquante")]
    MissingBinary {
        /// Exécutable.
        assembly: String,
        /// Référence sans charge.
        reference: String,
    },

    /// Charge embarquée illisible (base64 ou UTF-8).
    #[error("assembly liée '{reference}' : charge binary invalide : {message}")]
    InvalidBinary {
        /// Référence fautive.
        reference: String,
        /// Détail du décodage.
        message: String,
    },

    /// Échec du codec de modules.
    #[error("assembly {assembly}, module {module} : {message}")]
    Module {
        /// Assembly propriétaire.
        assembly: String,
        /// Module concerné.
        module: String,
        /// Détail.
        message: String,
    },

    /// Lecture d'un candidat du chemin de recherche impossible.
    #[error("lecture de {} impossible", .path.display())]
    Io {
        /// Fichier lu.
        path: PathBuf,
        /// Erreur système.
        #[source]
        source: io::Error,
    },

    /// Écriture de la destination impossible.
    #[error("écriture impossible vers {destination}")]
    Write {
        /// Fichier ou tampon de destination.
        destination: String,
        /// Erreur système.
        #[source]
        source: io::Error,
    },
}

impl LinkError {
    /// Construit une erreur de schéma.
    pub fn schema(name: Option<&str>, message: impl Into<String>) -> Self {
        Self::Schema { name: name.map(str::to_owned), message: message.into() }
    }

    /// Construit une erreur de codec de modules.
    pub fn module(assembly: &str, module: &str, message: impl Into<String>) -> Self {
        Self::Module { assembly: assembly.to_owned(), module: module.to_owned(), message: message.into() }
    }

    /// Catégorie de l'erreur.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Schema { .. } => ErrorKind::Schema,
            Self::BytecodeMode { .. } => ErrorKind::BytecodeMode,
            Self::UnresolvedReference { .. } => ErrorKind::UnresolvedReference,
            Self::CircularReference { .. } => ErrorKind::CircularReference,
            Self::MissingBinary { .. } => ErrorKind::MissingBinary,
            Self::InvalidBinary { .. } => ErrorKind::InvalidBinary,
            Self::Module { .. } => ErrorKind::Module,
            Self::Io { .. } => ErrorKind::Io,
            Self::Write { .. } => ErrorKind::Write,
        }
    }

    /// Nom fautif : assembly, référence ou destination selon le cas.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Parse { origin, .. } => Some(origin),
            Self::Schema { name, .. } => name.as_deref(),
            Self::BytecodeMode { name, .. } => Some(name),
            Self::UnresolvedReference { reference, .. }
            | Self::CircularReference { reference, .. }
            | Self::MissingBinary { reference, .. }
            | Self::InvalidBinary { reference, .. } => Some(reference),
            Self::Module { assembly, .. } => Some(assembly),
            Self::Io { path, .. } => path.to_str(),
            Self::Write { destination, .. } => Some(destination),
        }
    }
}
