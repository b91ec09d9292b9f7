//! Écrivain d'assemblies : document canonique, rendu texte, fichier.
//!
//! Deux assemblies identiques produisent des octets identiques (clés triées,
//! indentation fixe), d'un run à l'autre.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use loom_core::{Assembly, BytecodeMode, LinkError, LinkResult, ASSEMBLY_TYPE};

use crate::codec::ModuleCodec;
use crate::document::{self, AssemblyDocument, ReferenceEntry};

/// Sérialise des assemblies en mémoire.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssemblyWriter {
    mode: BytecodeMode,
}

impl AssemblyWriter {
    /// Écrivain qui estampille `mode` dans le drapeau `jit`.
    pub const fn new(mode: BytecodeMode) -> Self { Self { mode } }

    /// Mode estampillé.
    pub const fn mode(&self) -> BytecodeMode { self.mode }

    /// Document structuré (modules délégués au codec).
    ///
    /// Jamais `executable` : sans charges embarquées le document ne se
    /// rechargerait pas. Les exécutables sortent de [`crate::link_executable`].
    pub fn document(&self, assembly: &Assembly, codec: &dyn ModuleCodec) -> LinkResult<AssemblyDocument> {
        Ok(AssemblyDocument {
            kind: ASSEMBLY_TYPE.to_owned(),
            name: assembly.name().to_owned(),
            version: assembly.version().to_owned(),
            uid: assembly.uid().to_owned(),
            loom_config: assembly.loom_config().to_owned(),
            jit: self.mode.is_jit(),
            debug_build: Some(assembly.is_debug_build()),
            executable: false,
            references: assembly.references().iter().map(ReferenceEntry::named).collect(),
            modules: assembly.modules().iter().map(|m| codec.write(m)).collect::<LinkResult<Vec<Value>>>()?,
        })
    }

    /// Texte canonique.
    pub fn write_to_string(&self, assembly: &Assembly, codec: &dyn ModuleCodec) -> LinkResult<String> {
        document::render_document(&self.document(assembly, codec)?)
    }

    /// Écrit dans `out` ; `destination` nomme la cible dans les erreurs.
    pub fn write_to<W: Write>(
        &self,
        assembly: &Assembly,
        codec: &dyn ModuleCodec,
        out: W,
        destination: &str,
    ) -> LinkResult<()> {
        let text = self.write_to_string(assembly, codec)?;
        let write_err = |source| LinkError::Write { destination: destination.to_owned(), source };
        let mut w = BufWriter::new(out);
        w.write_all(text.as_bytes()).map_err(write_err)?;
        w.flush().map_err(write_err)
    }

    /// Écrit dans un fichier (créé ou tronqué).
    pub fn write_to_file(&self, assembly: &Assembly, codec: &dyn ModuleCodec, path: impl AsRef<Path>) -> LinkResult<()> {
        let path = path.as_ref();
        let destination = path.display().to_string();
        let file = File::create(path).map_err(|source| LinkError::Write { destination: destination.clone(), source })?;
        self.write_to(assembly, codec, file, &destination)?;
        debug!(assembly = assembly.name(), %destination, "assembly écrite");
        Ok(())
    }
}
