//! Modules et types d'une assembly.
//!
//! Un type passe par deux états : *déclaré* (son nom est résolvable, corps
//! vide) puis *défini* (corps construit). Le lien déclare tous les types
//! d'une assembly avant d'en construire un seul, ce qui autorise les
//! références avant déclaration entre modules.

/// Champ d'un type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    /// Nom du champ.
    pub name: String,
    /// Nom complet du type du champ.
    pub type_name: String,
}

/// Corps d'un type défini.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeBody {
    /// Type de base (nom complet).
    pub base: Option<String>,
    /// Interfaces implémentées (noms complets).
    pub interfaces: Vec<String>,
    /// Champs.
    pub fields: Vec<FieldInfo>,
    /// Bytecode opaque, transporté tel quel.
    pub bytecode: Option<String>,
}

/// Type d'un module : déclaré puis défini.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    name: String,
    package: String,
    body: Option<TypeBody>,
}

impl TypeInfo {
    /// Déclare un type (corps vide).
    pub fn declared(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self { name: name.into(), package: package.into(), body: None }
    }

    /// Nom court.
    pub fn name(&self) -> &str { &self.name }

    /// Package (peut être vide).
    pub fn package(&self) -> &str { &self.package }

    /// Nom complet `package.Name` (ou `Name` sans package).
    pub fn full_name(&self) -> String {
        if self.package.is_empty() { self.name.clone() } else { format!("{}.{}", self.package, self.name) }
    }

    /// Vrai si le nom complet vaut `full_name` (sans allocation).
    pub fn is_named(&self, full_name: &str) -> bool {
        if self.package.is_empty() {
            return self.name == full_name;
        }
        full_name
            .strip_prefix(self.package.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .is_some_and(|rest| rest == self.name)
    }

    /// Corps, une fois défini.
    pub fn body(&self) -> Option<&TypeBody> { self.body.as_ref() }

    /// Vrai après la passe de définition.
    pub fn is_defined(&self) -> bool { self.body.is_some() }

    /// Installe le corps du type.
    pub fn define(&mut self, body: TypeBody) { self.body = Some(body); }
}

/// Module : collection ordonnée de types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    name: String,
    version: String,
    types: Vec<TypeInfo>,
}

impl Module {
    /// Module vide.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self { name: name.into(), version: version.into(), types: Vec::new() }
    }

    /// Nom du module.
    pub fn name(&self) -> &str { &self.name }

    /// Version du module.
    pub fn version(&self) -> &str { &self.version }

    /// Types dans l'ordre de déclaration.
    pub fn types(&self) -> &[TypeInfo] { &self.types }

    /// Ajoute un type.
    pub fn add_type(&mut self, ty: TypeInfo) { self.types.push(ty); }

    /// Type par nom complet.
    pub fn find_type(&self, full_name: &str) -> Option<&TypeInfo> {
        self.types.iter().find(|t| t.is_named(full_name))
    }

    /// Type par nom complet (mutable).
    pub fn find_type_mut(&mut self, full_name: &str) -> Option<&mut TypeInfo> {
        self.types.iter_mut().find(|t| t.is_named(full_name))
    }
}
