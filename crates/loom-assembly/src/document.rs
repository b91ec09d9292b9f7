//! Schéma du document d'assembly et rendu canonique.
//!
//! ```text
//! {
//!    "type": "ASSEMBLY",            obligatoire, littéral
//!    "name": "...",                 obligatoire
//!    "version": "...",              obligatoire
//!    "uid": "...",                  optionnel, généré si vide
//!    "loomconfig": "...",           obligatoire, opaque
//!    "jit": bool,                   obligatoire, doit valoir le mode du lecteur
//!    "debugbuild": bool,            optionnel, vrai sauf `false` explicite
//!    "executable": bool,            optionnel, faux par défaut
//!    "references": [{"name", "binary"?}],
//!    "modules": [ ... ]             documents opaques (codec de modules)
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use serde_json::Value;

use loom_core::{LinkError, LinkResult, ASSEMBLY_TYPE};

/// Indentation du rendu canonique.
const INDENT: &[u8] = b"   ";

/// Entrée du tableau `references`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    /// Nom de l'assembly référencée.
    pub name: String,
    /// Texte de l'assembly, en base64 (exécutables uniquement).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<String>,
}

impl ReferenceEntry {
    /// Référence sans charge.
    pub fn named(name: impl Into<String>) -> Self { Self { name: name.into(), binary: None } }
}

/// Document d'assembly validé.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyDocument {
    /// Discriminant, toujours `"ASSEMBLY"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Nom.
    pub name: String,
    /// Version.
    pub version: String,
    /// Uid (vide = à générer).
    #[serde(default)]
    pub uid: String,
    /// Configuration loom opaque.
    #[serde(rename = "loomconfig")]
    pub loom_config: String,
    /// Bytecode JIT ?
    pub jit: bool,
    /// Build debug (absent = vrai).
    #[serde(rename = "debugbuild", default, skip_serializing_if = "Option::is_none")]
    pub debug_build: Option<bool>,
    /// Point d'entrée du programme.
    #[serde(default, skip_serializing_if = "is_false")]
    pub executable: bool,
    /// Références, dans l'ordre de résolution.
    pub references: Vec<ReferenceEntry>,
    /// Documents de modules.
    pub modules: Vec<Value>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_false(b: &bool) -> bool { !*b }

impl AssemblyDocument {
    /// Drapeau debug effectif : seul un `false` explicite le désactive.
    pub fn is_debug_build(&self) -> bool { self.debug_build != Some(false) }
}

/* ─────────────────────────── Lecture ─────────────────────────── */

/// Décode le texte en JSON, sans validation de schéma.
///
/// `origin` nomme l'entrée dans les messages (fichier, référence…).
pub fn parse_value(raw: &str, origin: &str) -> LinkResult<Value> {
    serde_json::from_str(raw).map_err(|e| LinkError::Parse {
        origin: origin.to_owned(),
        line: e.line(),
        column: e.column(),
        message: e.to_string(),
    })
}

/// Décode et valide le schéma (discriminant puis champs).
pub fn parse(raw: &str, origin: &str) -> LinkResult<AssemblyDocument> {
    let value = parse_value(raw, origin)?;
    let declared = value.get("name").and_then(Value::as_str).map(str::to_owned);

    match value.get("type").and_then(Value::as_str) {
        Some(ASSEMBLY_TYPE) => {}
        Some(other) => {
            return Err(LinkError::schema(
                declared.as_deref(),
                format!("discriminant type '{other}' au lieu de '{ASSEMBLY_TYPE}'"),
            ))
        }
        None => return Err(LinkError::schema(declared.as_deref(), "discriminant type absent")),
    }

    AssemblyDocument::deserialize(value).map_err(|e| LinkError::schema(declared.as_deref(), e.to_string()))
}

/* ─────────────────────────── Rendu ─────────────────────────── */

/// Trie récursivement les clés d'objets.
pub fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Rend une valeur : clés triées, indentation de 3 espaces.
pub fn render(value: Value) -> LinkResult<String> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(INDENT));
    canonicalize(value).serialize(&mut ser).map_err(|e| in_memory_write_error(e.into()))?;
    String::from_utf8(buf).map_err(|e| in_memory_write_error(std::io::Error::other(e)))
}

/// Rend un document d'assembly sous forme canonique.
pub fn render_document(doc: &AssemblyDocument) -> LinkResult<String> {
    let value = serde_json::to_value(doc).map_err(|e| in_memory_write_error(e.into()))?;
    render(value)
}

fn in_memory_write_error(source: std::io::Error) -> LinkError {
    LinkError::Write { destination: "<mémoire>".to_owned(), source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_core::ErrorKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn minimal() -> Value {
        json!({
            "type": "ASSEMBLY",
            "name": "Main",
            "version": "1.0",
            "loomconfig": "{}",
            "jit": false,
            "references": [],
            "modules": []
        })
    }

    #[test]
    fn optional_fields_default() {
        let doc = parse(&minimal().to_string(), "<test>").unwrap();
        assert_eq!(doc.uid, "");
        assert!(doc.is_debug_build());
        assert!(!doc.executable);
    }

    #[test]
    fn debugbuild_only_false_disables() {
        let mut v = minimal();
        v["debugbuild"] = json!(true);
        assert!(parse(&v.to_string(), "<test>").unwrap().is_debug_build());
        v["debugbuild"] = json!(false);
        assert!(!parse(&v.to_string(), "<test>").unwrap().is_debug_build());
    }

    #[test]
    fn parse_error_has_location() {
        let err = parse("{\n  \"type\": \"ASSEMBLY\",\n  oops\n}", "Main.loom").unwrap_err();
        match err {
            LinkError::Parse { origin, line, .. } => {
                assert_eq!(origin, "Main.loom");
                assert_eq!(line, 3);
            }
            other => panic!("attendu Parse, reçu {other:?}"),
        }
    }

    #[test]
    fn wrong_discriminator_names_assembly() {
        let mut v = minimal();
        v["type"] = json!("MODULE");
        let err = parse(&v.to_string(), "<test>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert_eq!(err.name(), Some("Main"));
    }

    #[test]
    fn missing_discriminator_and_name() {
        let err = parse(r#"{"version": "1.0"}"#, "<test>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert_eq!(err.name(), None);
    }

    #[test]
    fn missing_required_field_is_schema_error() {
        let mut v = minimal();
        v.as_object_mut().unwrap().remove("loomconfig");
        let err = parse(&v.to_string(), "<test>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(err.to_string().contains("loomconfig"));
    }

    #[test]
    fn render_sorts_keys_and_indents() {
        let text = render(json!({"b": 1, "a": {"d": true, "c": []}})).unwrap();
        assert_eq!(text, "{\n   \"a\": {\n      \"c\": [],\n      \"d\": true\n   },\n   \"b\": 1\n}");
    }
}
