//! Chargeur / linker d'assemblies.
//!
//! Pour un texte d'assembly :
//! 1. décodage du document, discriminant `ASSEMBLY`
//! 2. contrôle du mode de bytecode
//! 3. uid (généré si vide)
//! 4. déduplication `(name, uid)` via le registre
//! 5. création et enregistrement (état `Linking`) avant toute récursion
//! 6. exécutable : récolte des charges embarquées dans le bundle du contexte
//! 7. résolution des références, dans l'ordre (registre, bootstrap, bundle, chemin de recherche)
//! 8. déclaration de tous les modules, puis 9. construction de tous les modules
//! 10. exécutable : bundle vidé, y compris en cas d'échec
//!
//! Une référence vers une assembly encore en état `Linking` est un cycle :
//! erreur `CircularReference` plutôt qu'une récursion sans fin.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::{debug, info, warn};

use loom_core::{
    Assembly, AssemblyRef, BytecodeMode, LinkError, LinkResult, LinkState, RandomUid, UidProvider,
};

use crate::codec::ModuleCodec;
use crate::context::LoadContext;
use crate::document::{self, AssemblyDocument};
use crate::registry::AssemblyRegistry;

/// Origine affichée pour le texte passé directement à [`AssemblyReader::load`].
const INPUT_ORIGIN: &str = "<entrée>";

/// Lit et lie des assemblies pour un mode de bytecode donné.
#[derive(Debug)]
pub struct AssemblyReader<U = RandomUid> {
    mode: BytecodeMode,
    uids: U,
}

impl Default for AssemblyReader {
    fn default() -> Self { Self::new(BytecodeMode::native()) }
}

impl AssemblyReader {
    /// Lecteur qui exige du bytecode `mode`, uid aléatoires.
    pub const fn new(mode: BytecodeMode) -> Self { Self { mode, uids: RandomUid } }
}

impl<U: UidProvider> AssemblyReader<U> {
    /// Lecteur avec un fournisseur d'uid choisi.
    pub const fn with_uids(mode: BytecodeMode, uids: U) -> Self { Self { mode, uids } }

    /// Mode exigé.
    pub const fn mode(&self) -> BytecodeMode { self.mode }

    /// Charge `raw` et tout son graphe de références.
    pub fn load(
        &mut self,
        raw: &str,
        ctx: &mut LoadContext,
        registry: &mut dyn AssemblyRegistry,
        codec: &mut dyn ModuleCodec,
    ) -> LinkResult<AssemblyRef> {
        self.load_from(raw, INPUT_ORIGIN, ctx, registry, codec)
    }

    /// Comme [`load`](Self::load), `origin` nommant le texte dans les erreurs de décodage.
    pub fn load_from(
        &mut self,
        raw: &str,
        origin: &str,
        ctx: &mut LoadContext,
        registry: &mut dyn AssemblyRegistry,
        codec: &mut dyn ModuleCodec,
    ) -> LinkResult<AssemblyRef> {
        let doc = document::parse(raw, origin)?;
        self.check_mode(&doc)?;

        let uid = if doc.uid.is_empty() { self.uids.generate() } else { doc.uid.clone() };

        if let Some(existing) = registry.find(&doc.name, &uid) {
            if existing.borrow().state() == LinkState::Linking {
                return Err(LinkError::CircularReference { assembly: doc.name.clone(), reference: doc.name });
            }
            debug!(assembly = %doc.name, %uid, "déjà chargée");
            return Ok(existing);
        }
        // nom déclaré différent du nom de référence : le cycle ne se voit que par le nom
        if let Some(pending) = registry.find_by_name(&doc.name) {
            if pending.borrow().state() == LinkState::Linking {
                return Err(LinkError::CircularReference { assembly: doc.name.clone(), reference: doc.name });
            }
        }

        let assembly = create(&doc, uid);
        registry.register(assembly.clone());

        if doc.executable {
            info!(assembly = %doc.name, "chargement de l'exécutable {}.loom", doc.name);
            if ctx.bundled_len() > 0 {
                warn!(pending = ctx.bundled_len(), "bundle non vide au début d'un exécutable");
            }
        }

        let outcome = self.link(&doc, &assembly, ctx, registry, codec);
        if doc.executable {
            ctx.clear_bundle();
        }

        if let Err(e) = outcome {
            let a = assembly.borrow();
            registry.unregister(a.name(), a.uid());
            return Err(e);
        }

        assembly.borrow_mut().set_state(LinkState::Linked);
        {
            let a = assembly.borrow();
            info!(assembly = a.name(), uid = a.uid(), modules = a.modules().len(), types = a.type_count(), "assembly liée");
        }
        Ok(assembly)
    }

    fn check_mode(&self, doc: &AssemblyDocument) -> LinkResult<()> {
        let found = BytecodeMode::from_jit_flag(doc.jit);
        if found == self.mode {
            return Ok(());
        }
        Err(LinkError::BytecodeMode { name: doc.name.clone(), found, expected: self.mode })
    }

    fn link(
        &mut self,
        doc: &AssemblyDocument,
        assembly: &AssemblyRef,
        ctx: &mut LoadContext,
        registry: &mut dyn AssemblyRegistry,
        codec: &mut dyn ModuleCodec,
    ) -> LinkResult<()> {
        if doc.executable {
            harvest(doc, ctx)?;
        }

        for reference in &doc.references {
            let name = reference.name.as_str();
            assembly.borrow_mut().add_reference(name);

            if let Some(loaded) = registry.find_by_name(name) {
                if loaded.borrow().state() == LinkState::Linking {
                    return Err(LinkError::CircularReference { assembly: doc.name.clone(), reference: name.to_owned() });
                }
                debug!(assembly = %doc.name, reference = name, "référence déjà chargée");
                assembly.borrow_mut().add_dependency(loaded);
                continue;
            }

            let text = locate(&doc.name, name, ctx)?;
            let dependency = self.load_from(&text, name, ctx, registry, codec)?;
            assembly.borrow_mut().add_dependency(dependency);
        }

        let mut target = assembly.borrow_mut();
        for module in &doc.modules {
            codec.declare(module, &mut target)?;
        }
        for module in &doc.modules {
            codec.deserialize(module, &mut target)?;
        }
        Ok(())
    }
}

/// Assembly neuve à partir du document, en état `Linking`.
fn create(doc: &AssemblyDocument, uid: String) -> AssemblyRef {
    let mut a = Assembly::new(&doc.name, uid);
    a.set_version(&doc.version);
    a.set_loom_config(&doc.loom_config);
    a.set_debug_build(doc.is_debug_build());
    a.set_bytecode_mode(BytecodeMode::from_jit_flag(doc.jit));
    a.set_executable(doc.executable);
    a.set_state(LinkState::Linking);
    a.into_ref()
}

/// Décode les charges `binary` de l'exécutable dans le bundle.
fn harvest(doc: &AssemblyDocument, ctx: &mut LoadContext) -> LinkResult<()> {
    for reference in &doc.references {
        let encoded = reference.binary.as_deref().ok_or_else(|| LinkError::MissingBinary {
            assembly: doc.name.clone(),
            reference: reference.name.clone(),
        })?;
        let invalid = |message: String| LinkError::InvalidBinary { reference: reference.name.clone(), message };
        let bytes = STANDARD.decode(encoded.trim()).map_err(|e| invalid(e.to_string()))?;
        let text = String::from_utf8(bytes).map_err(|e| invalid(e.to_string()))?;
        // les charges produites à partir de chaînes C gardent leur NUL final
        ctx.bundle(reference.name.as_str(), text.trim_end_matches('\0'));
        debug!(executable = %doc.name, reference = %reference.name, "charge embarquée récoltée");
    }
    Ok(())
}

/// Texte de la référence `name` : bootstrap, puis bundle, puis chemin de recherche.
fn locate(assembly: &str, name: &str, ctx: &LoadContext) -> LinkResult<String> {
    if let Some(text) = ctx.bootstrap_document(name) {
        debug!(reference = name, "fournie par le bootstrap");
        return Ok(text);
    }
    if let Some(text) = ctx.bundled(name) {
        debug!(reference = name, "fournie par le bundle de l'exécutable");
        return Ok(text.to_owned());
    }
    if let Some((_, text)) = ctx.find_library(name)? {
        return Ok(text);
    }
    Err(LinkError::UnresolvedReference { assembly: assembly.to_owned(), reference: name.to_owned() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::TypeTableCodec;
    use crate::registry::InMemoryRegistry;
    use loom_core::ErrorKind;
    use serde_json::json;

    fn lib(name: &str, refs: &[&str]) -> String {
        json!({
            "type": "ASSEMBLY",
            "name": name,
            "version": "1.0",
            "uid": "",
            "loomconfig": "",
            "jit": false,
            "references": refs.iter().map(|r| json!({"name": r})).collect::<Vec<_>>(),
            "modules": []
        })
        .to_string()
    }

    #[test]
    fn generated_uid_when_empty() {
        let mut reader = AssemblyReader::new(BytecodeMode::Interpreted);
        let mut reg = InMemoryRegistry::new();
        let a = reader.load(&lib("Main", &[]), &mut LoadContext::new(), &mut reg, &mut TypeTableCodec).unwrap();
        assert!(loom_core::is_canonical_uid(a.borrow().uid()));
        assert_eq!(a.borrow().state(), LinkState::Linked);
    }

    #[test]
    fn self_reference_is_circular() {
        let mut reader = AssemblyReader::new(BytecodeMode::Interpreted);
        let mut reg = InMemoryRegistry::new();
        let err = reader.load(&lib("Loop", &["Loop"]), &mut LoadContext::new(), &mut reg, &mut TypeTableCodec).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CircularReference);
        assert_eq!(err.name(), Some("Loop"));
        assert!(reg.is_empty());
    }

    #[test]
    fn failed_load_leaves_registry_clean() {
        let mut reader = AssemblyReader::new(BytecodeMode::Interpreted);
        let mut reg = InMemoryRegistry::new();
        let err = reader.load(&lib("Main", &["Nowhere"]), &mut LoadContext::new(), &mut reg, &mut TypeTableCodec).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedReference);
        assert!(reg.find_by_name("Main").is_none());
    }

    #[test]
    fn missing_binary_in_executable() {
        let mut doc: serde_json::Value = serde_json::from_str(&lib("Main", &["Lib"])).unwrap();
        doc["executable"] = json!(true);
        let mut ctx = LoadContext::new();
        let err = AssemblyReader::new(BytecodeMode::Interpreted)
            .load(&doc.to_string(), &mut ctx, &mut InMemoryRegistry::new(), &mut TypeTableCodec)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingBinary);
        assert_eq!(err.name(), Some("Lib"));
        assert_eq!(ctx.bundled_len(), 0);
    }

    #[test]
    fn payload_nul_terminator_is_dropped() {
        let payload = format!("{}\0", lib("Lib", &[]));
        let mut doc: serde_json::Value = serde_json::from_str(&lib("Main", &["Lib"])).unwrap();
        doc["executable"] = json!(true);
        doc["references"][0]["binary"] = json!(STANDARD.encode(payload));

        let mut reg = InMemoryRegistry::new();
        let main = AssemblyReader::new(BytecodeMode::Interpreted)
            .load(&doc.to_string(), &mut LoadContext::new(), &mut reg, &mut TypeTableCodec)
            .unwrap();
        assert_eq!(main.borrow().dependencies().len(), 1);
        assert!(reg.find_by_name("Lib").is_some());
    }
}
