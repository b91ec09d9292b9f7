//! loom-assembly — sérialisation et lien des assemblies Loom
//!
//! Format : document JSON `{"type": "ASSEMBLY", …}` (voir [`document`]).
//!
//! API :
//! - [`AssemblyWriter`] : assembly en mémoire → texte canonique / fichier
//! - [`AssemblyReader`] : texte → assembly liée (références transitives, dédup,
//!   déclaration puis construction des modules, contrôle du mode de bytecode)
//! - [`LoadContext`] : chemin de recherche `*.loomlib`, bundle d'un exécutable, bootstrap
//! - [`AssemblyRegistry`] / [`InMemoryRegistry`] : assemblies chargées par `(name, uid)`
//! - [`ModuleCodec`] / [`TypeTableCodec`] : contenu des modules en deux passes
//! - [`link_executable`] : embarque les bibliothèques d'une racine en base64
//!
//! Tout échec est une [`LinkError`] ; rien ici ne termine le processus.

#![deny(missing_docs)]

pub mod bundle;
pub mod codec;
pub mod context;
pub mod document;
pub mod reader;
pub mod registry;
pub mod writer;

pub use bundle::link_executable;
pub use codec::{ModuleCodec, TypeTableCodec};
pub use context::{BootstrapProvider, EmbeddedSystem, LoadContext, LIBRARY_PATH_ENV};
pub use document::{AssemblyDocument, ReferenceEntry};
pub use reader::AssemblyReader;
pub use registry::{AssemblyRegistry, InMemoryRegistry};
pub use writer::AssemblyWriter;

pub use loom_core::{ErrorKind, LinkError, LinkResult};
