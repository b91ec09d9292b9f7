//! Codec de modules : contrat en deux passes + implémentation par table de types.
//!
//! Le linker appelle `declare` sur tous les modules d'une assembly, puis
//! `deserialize` sur tous, dans le même ordre. Après la première passe,
//! chaque type de l'assembly est résolvable par son nom complet.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use loom_core::{Assembly, FieldInfo, LinkError, LinkResult, Module, TypeBody, TypeInfo, MODULE_TYPE};

/// Encodage/décodage du contenu d'un module.
pub trait ModuleCodec {
    /// Passe 1 : crée le module et déclare ses types (corps vides).
    fn declare(&mut self, document: &Value, assembly: &mut Assembly) -> LinkResult<()>;

    /// Passe 2 : construit les corps ; tout type de l'assembly est déjà déclaré.
    fn deserialize(&mut self, document: &Value, assembly: &mut Assembly) -> LinkResult<()>;

    /// Document d'un module en mémoire.
    fn write(&self, module: &Module) -> LinkResult<Value>;
}

/* ─────────────────────────── Schéma des modules ─────────────────────────── */

#[derive(Debug, Serialize, Deserialize)]
struct ModuleDocument {
    #[serde(rename = "type")]
    kind: String,
    name: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    types: Vec<TypeDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TypeDocument {
    name: String,
    #[serde(default)]
    package: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    base: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    interfaces: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    fields: Vec<FieldDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bytecode: Option<String>,
}

impl TypeDocument {
    fn full_name(&self) -> String {
        if self.package.is_empty() { self.name.clone() } else { format!("{}.{}", self.package, self.name) }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FieldDocument {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
}

/// Types connus de la VM, résolus sans déclaration.
const PRIMITIVES: &[&str] = &["void", "bool", "int", "float", "number", "string", "object"];

/* ─────────────────────────── Codec par table de types ─────────────────────────── */

/// Codec de référence : modules `{type:"MODULE", name, version, types:[…]}`.
///
/// Les noms de types (`base`, `interfaces`, types de champs) sont résolus
/// dans l'assembly puis dans ses dépendances.
#[derive(Debug, Default, Clone, Copy)]
pub struct TypeTableCodec;

impl TypeTableCodec {
    /// Nouveau codec.
    pub const fn new() -> Self { Self }

    fn parse(document: &Value, assembly: &Assembly) -> LinkResult<ModuleDocument> {
        let module_name = document.get("name").and_then(Value::as_str).unwrap_or("<sans nom>");
        let doc = ModuleDocument::deserialize(document)
            .map_err(|e| LinkError::module(assembly.name(), module_name, e.to_string()))?;
        if doc.kind != MODULE_TYPE {
            return Err(LinkError::module(
                assembly.name(),
                &doc.name,
                format!("discriminant type '{}' au lieu de '{MODULE_TYPE}'", doc.kind),
            ));
        }
        Ok(doc)
    }

    fn resolve(assembly: &Assembly, module: &str, owner: &str, type_name: &str) -> LinkResult<String> {
        if PRIMITIVES.contains(&type_name) || assembly.locate_type(type_name).is_some() {
            return Ok(type_name.to_owned());
        }
        Err(LinkError::module(
            assembly.name(),
            module,
            format!("type '{type_name}' introuvable (utilisé par '{owner}')"),
        ))
    }
}

impl ModuleCodec for TypeTableCodec {
    fn declare(&mut self, document: &Value, assembly: &mut Assembly) -> LinkResult<()> {
        let doc = Self::parse(document, assembly)?;
        if assembly.module(&doc.name).is_some() {
            return Err(LinkError::module(assembly.name(), &doc.name, "module déclaré deux fois"));
        }

        let mut module = Module::new(&doc.name, &doc.version);
        for ty in &doc.types {
            let full = ty.full_name();
            if assembly.locate_local_type(&full).is_some() || module.find_type(&full).is_some() {
                return Err(LinkError::module(assembly.name(), &doc.name, format!("type '{full}' déclaré deux fois")));
            }
            module.add_type(TypeInfo::declared(&ty.package, &ty.name));
        }
        assembly.add_module(module);
        Ok(())
    }

    fn deserialize(&mut self, document: &Value, assembly: &mut Assembly) -> LinkResult<()> {
        let doc = Self::parse(document, assembly)?;
        if assembly.module(&doc.name).is_none() {
            return Err(LinkError::module(assembly.name(), &doc.name, "module non déclaré"));
        }

        let view: &Assembly = assembly;
        let mut bodies = Vec::with_capacity(doc.types.len());
        for ty in &doc.types {
            let full = ty.full_name();
            let resolve = |name: &str| Self::resolve(view, &doc.name, &full, name);
            let body = TypeBody {
                base: ty.base.as_deref().map(|b| resolve(b)).transpose()?,
                interfaces: ty.interfaces.iter().map(|i| resolve(i)).collect::<LinkResult<_>>()?,
                fields: ty
                    .fields
                    .iter()
                    .map(|f| Ok(FieldInfo { name: f.name.clone(), type_name: resolve(&f.type_name)? }))
                    .collect::<LinkResult<_>>()?,
                bytecode: ty.bytecode.clone(),
            };
            bodies.push((full, body));
        }

        let assembly_name = assembly.name().to_owned();
        let module = assembly
            .module_mut(&doc.name)
            .ok_or_else(|| LinkError::module(&assembly_name, &doc.name, "module non déclaré"))?;
        for (full, body) in bodies {
            module
                .find_type_mut(&full)
                .ok_or_else(|| LinkError::module(&assembly_name, &doc.name, format!("type '{full}' non déclaré")))?
                .define(body);
        }
        Ok(())
    }

    fn write(&self, module: &Module) -> LinkResult<Value> {
        let doc = ModuleDocument {
            kind: MODULE_TYPE.to_owned(),
            name: module.name().to_owned(),
            version: module.version().to_owned(),
            types: module
                .types()
                .iter()
                .map(|t| {
                    let body = t.body().cloned().unwrap_or_default();
                    TypeDocument {
                        name: t.name().to_owned(),
                        package: t.package().to_owned(),
                        base: body.base,
                        interfaces: body.interfaces,
                        fields: body
                            .fields
                            .into_iter()
                            .map(|f| FieldDocument { name: f.name, type_name: f.type_name })
                            .collect(),
                        bytecode: body.bytecode,
                    }
                })
                .collect(),
        };
        serde_json::to_value(doc).map_err(|e| LinkError::module("<écriture>", module.name(), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_core::ErrorKind;
    use serde_json::json;

    fn module_doc(name: &str, types: Value) -> Value {
        json!({"type": "MODULE", "name": name, "version": "1.0", "types": types})
    }

    #[test]
    fn single_pass_would_fail_two_pass_succeeds() {
        // A référence B, déclaré plus loin dans le document.
        let m1 = module_doc("Actors", json!([{"name": "Player", "package": "game", "base": "game.Entity"}]));
        let m2 = module_doc("Core", json!([{"name": "Entity", "package": "game"}]));

        let mut naive = Assembly::new("Game", "u");
        let mut codec = TypeTableCodec::new();
        codec.declare(&m1, &mut naive).unwrap();
        let err = codec.deserialize(&m1, &mut naive).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Module);

        let mut asm = Assembly::new("Game", "u");
        for m in [&m1, &m2] {
            codec.declare(m, &mut asm).unwrap();
        }
        for m in [&m1, &m2] {
            codec.deserialize(m, &mut asm).unwrap();
        }
        let player = asm.module("Actors").unwrap().find_type("game.Player").unwrap();
        assert_eq!(player.body().unwrap().base.as_deref(), Some("game.Entity"));
        assert!(asm.module("Core").unwrap().find_type("game.Entity").unwrap().is_defined());
    }

    #[test]
    fn rejects_non_module_discriminator() {
        let mut asm = Assembly::new("Game", "u");
        let err = TypeTableCodec.declare(&json!({"type": "CLASS", "name": "X"}), &mut asm).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Module);
        assert_eq!(err.name(), Some("Game"));
    }

    #[test]
    fn duplicate_type_is_rejected() {
        let mut asm = Assembly::new("Game", "u");
        let mut codec = TypeTableCodec;
        codec.declare(&module_doc("A", json!([{"name": "T"}])), &mut asm).unwrap();
        assert!(codec.declare(&module_doc("B", json!([{"name": "T"}])), &mut asm).is_err());
    }

    #[test]
    fn fields_resolve_primitives_and_locals() {
        let m = module_doc(
            "Main",
            json!([{"name": "Main", "fields": [{"name": "score", "type": "int"}, {"name": "self", "type": "Main"}]}]),
        );
        let mut asm = Assembly::new("Main", "u");
        let mut codec = TypeTableCodec;
        codec.declare(&m, &mut asm).unwrap();
        codec.deserialize(&m, &mut asm).unwrap();
        let body = asm.module("Main").unwrap().find_type("Main").unwrap().body().unwrap().clone();
        assert_eq!(body.fields.len(), 2);
        assert_eq!(body.fields[1].type_name, "Main");
    }

    #[test]
    fn write_reproduces_document() {
        let m = module_doc(
            "Core",
            json!([{"name": "Entity", "package": "game", "interfaces": ["game.Entity"], "bytecode": "AQID"}]),
        );
        let mut asm = Assembly::new("Game", "u");
        let mut codec = TypeTableCodec;
        codec.declare(&m, &mut asm).unwrap();
        codec.deserialize(&m, &mut asm).unwrap();
        assert_eq!(codec.write(asm.module("Core").unwrap()).unwrap(), m);
    }
}
