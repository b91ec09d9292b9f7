//! Construction d'exécutables : embarque les bibliothèques dans l'assembly racine.
//!
//! Chaque référence (transitive) est cherchée via le bootstrap puis le chemin
//! de recherche, puis encodée en base64 dans son entrée `binary`. Les
//! dépendances indirectes sont ajoutées en fin de tableau `references`, pour
//! que le lecteur les retrouve dans le bundle.

use std::collections::{HashSet, VecDeque};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use indexmap::IndexMap;
use tracing::debug;

use loom_core::{BytecodeMode, LinkError, LinkResult};

use crate::context::LoadContext;
use crate::document::{self, ReferenceEntry};

/// Transforme le texte d'une assembly racine en exécutable autonome.
pub fn link_executable(root: &str, ctx: &LoadContext) -> LinkResult<String> {
    let mut doc = document::parse(root, "<racine>")?;

    let mut payloads: IndexMap<String, String> = IndexMap::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<(String, String)> =
        doc.references.iter().map(|r| (doc.name.clone(), r.name.clone())).collect();

    while let Some((owner, name)) = queue.pop_front() {
        if !seen.insert(name.clone()) {
            continue;
        }
        let text = match ctx.bootstrap_document(&name) {
            Some(text) => text,
            None => match ctx.find_library(&name)? {
                Some((_, text)) => text,
                None => return Err(LinkError::UnresolvedReference { assembly: owner, reference: name }),
            },
        };

        let library = document::parse(&text, &name)?;
        if library.jit != doc.jit {
            return Err(LinkError::BytecodeMode {
                name: library.name,
                found: BytecodeMode::from_jit_flag(library.jit),
                expected: BytecodeMode::from_jit_flag(doc.jit),
            });
        }
        queue.extend(library.references.iter().map(|r| (name.clone(), r.name.clone())));
        debug!(root = %doc.name, library = %name, "bibliothèque embarquée");
        payloads.insert(name, text);
    }

    for entry in &mut doc.references {
        entry.binary = payloads.get(&entry.name).map(|t| STANDARD.encode(t));
    }
    let direct: HashSet<String> = doc.references.iter().map(|r| r.name.clone()).collect();
    for (name, text) in &payloads {
        if !direct.contains(name) {
            doc.references.push(ReferenceEntry { name: name.clone(), binary: Some(STANDARD.encode(text)) });
        }
    }
    doc.executable = true;

    document::render_document(&doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{library_file, EmbeddedSystem};
    use loom_core::ErrorKind;
    use serde_json::{json, Value};

    fn lib(name: &str, refs: &[&str]) -> String {
        json!({
            "type": "ASSEMBLY", "name": name, "version": "1", "uid": "", "loomconfig": "",
            "jit": false, "references": refs.iter().map(|r| json!({"name": r})).collect::<Vec<_>>(),
            "modules": []
        })
        .to_string()
    }

    #[test]
    fn embeds_transitive_libraries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(library_file(dir.path(), "UI"), lib("UI", &["System"])).unwrap();
        let mut ctx = LoadContext::new().with_bootstrap(EmbeddedSystem::new(lib("System", &[])));
        ctx.add_library_path(dir.path());

        let out: Value = serde_json::from_str(&link_executable(&lib("Main", &["UI"]), &ctx).unwrap()).unwrap();
        assert_eq!(out["executable"], true);
        let refs = out["references"].as_array().unwrap();
        let names: Vec<&str> = refs.iter().map(|r| r["name"].as_str().unwrap()).collect();
        assert_eq!(names, ["UI", "System"]);

        let ui = STANDARD.decode(refs[0]["binary"].as_str().unwrap()).unwrap();
        assert_eq!(String::from_utf8(ui).unwrap(), lib("UI", &["System"]));
    }

    #[test]
    fn missing_library_names_owner_and_reference() {
        let err = link_executable(&lib("Main", &["Ghost"]), &LoadContext::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedReference);
        assert_eq!(err.name(), Some("Ghost"));
    }

    #[test]
    fn mixed_modes_are_rejected() {
        let mut jit_lib: Value = serde_json::from_str(&lib("Fast", &[])).unwrap();
        jit_lib["jit"] = json!(true);
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(library_file(dir.path(), "Fast"), jit_lib.to_string()).unwrap();
        let mut ctx = LoadContext::new();
        ctx.add_library_path(dir.path());

        let err = link_executable(&lib("Main", &["Fast"]), &ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BytecodeMode);
        assert_eq!(err.name(), Some("Fast"));
    }
}
