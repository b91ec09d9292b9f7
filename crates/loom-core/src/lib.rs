//! loom-core — primitives partagées du linker d'assemblies Loom
//!
//! Fournit :
//! - `Assembly` (+ `AssemblyRef`, `LinkState`) : unité de bytecode nommée et identifiée
//! - `Module`, `TypeInfo`, `TypeBody`, `FieldInfo` : contenu déclaré/défini d'un module
//! - `BytecodeMode` : JIT vs interprété, et le mode natif du build (feature `jit`)
//! - `UidProvider` / `RandomUid` : génération d'uid canoniques (36 caractères)
//! - Erreurs `LinkError` + `ErrorKind` + alias `LinkResult<T>`
//! - Constantes du format (`ASSEMBLY_TYPE`, `LIBRARY_EXTENSION`, …)
//!
//! Features :
//! - `serde` (par défaut) : derive (dé)sérialisation sur `BytecodeMode`
//! - `jit` : le build courant exécute du bytecode JIT

#![deny(missing_docs)]

/* ─────────────────────────── Modules publics ─────────────────────────── */

/// Assembly en mémoire, handle partagé et état de lien.
pub mod assembly;
/// Erreurs du linker.
pub mod error;
/// Modules, types et champs.
pub mod module;
/// Génération d'uid.
pub mod uid;

pub use assembly::{Assembly, AssemblyRef, LinkState, TypeLocation};
pub use error::{ErrorKind, LinkError, LinkResult};
pub use module::{FieldInfo, Module, TypeBody, TypeInfo};
pub use uid::{is_canonical_uid, RandomUid, UidProvider};

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/* ─────────────────────────── Constantes du format ─────────────────────────── */

/// Discriminant obligatoire d'un document d'assembly.
pub const ASSEMBLY_TYPE: &str = "ASSEMBLY";

/// Discriminant d'un document de module.
pub const MODULE_TYPE: &str = "MODULE";

/// Extension des assemblies de bibliothèque (`<dir>/<name>.loomlib`).
pub const LIBRARY_EXTENSION: &str = "loomlib";

/// Extension des assemblies exécutables.
pub const EXECUTABLE_EXTENSION: &str = "loom";

/// Nom de l'assembly système, seule candidate au bootstrap embarqué.
pub const SYSTEM_ASSEMBLY: &str = "System";

/// Longueur d'un uid canonique (`8-4-4-4-12`).
pub const UID_LEN: usize = 36;

/* ─────────────────────────── Mode de bytecode ─────────────────────────── */

/// Stratégie d'exécution pour laquelle un bytecode a été produit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum BytecodeMode {
    /// Bytecode destiné au JIT.
    Jit,
    /// Bytecode destiné à l'interpréteur.
    Interpreted,
}

impl BytecodeMode {
    /// Mode du build courant (feature `jit`).
    pub const fn native() -> Self {
        if cfg!(feature = "jit") { Self::Jit } else { Self::Interpreted }
    }

    /// Construit le mode à partir du drapeau `jit` d'un document.
    pub const fn from_jit_flag(jit: bool) -> Self {
        if jit { Self::Jit } else { Self::Interpreted }
    }

    /// Valeur du drapeau `jit` correspondant.
    pub const fn is_jit(self) -> bool { matches!(self, Self::Jit) }
}

impl Default for BytecodeMode {
    fn default() -> Self { Self::native() }
}

impl fmt::Display for BytecodeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jit => f.write_str("JIT"),
            Self::Interpreted => f.write_str("interprété"),
        }
    }
}

/* ─────────────────────────── Prélude (reexports utiles) ─────────────────────────── */

/// Prélude pratique pour importer les types/funcs clés du crate.
pub mod prelude {
    /// Réexports utiles pour une importation rapide.
    pub use super::{
        Assembly, AssemblyRef, BytecodeMode, ErrorKind, FieldInfo, LinkError, LinkResult,
        LinkState, Module, RandomUid, TypeBody, TypeInfo, TypeLocation, UidProvider,
        ASSEMBLY_TYPE, LIBRARY_EXTENSION, MODULE_TYPE, SYSTEM_ASSEMBLY,
    };
}

/* ─────────────────────────── Tests ─────────────────────────── */
