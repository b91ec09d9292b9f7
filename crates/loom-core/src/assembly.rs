//! Assembly en mémoire.
//!
//! Une assembly est créée la première fois que sa clé `(name, uid)` est
//! rencontrée, puis appartient au registre qui l'a enregistrée. Tout est
//! mono-thread : le handle partagé est un `Rc<RefCell<_>>`.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::module::Module;
use crate::BytecodeMode;

/// Handle partagé vers une assembly (propriété du registre).
pub type AssemblyRef = Rc<RefCell<Assembly>>;

/// Avancement du lien d'une assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Enregistrée, références/modules en cours de résolution.
    Linking,
    /// Entièrement liée.
    Linked,
}

/// Emplacement d'un type résolu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeLocation {
    /// Assembly qui définit le type.
    pub assembly: String,
    /// Module qui définit le type.
    pub module: String,
}

/// Unité nommée de bytecode compilé.
pub struct Assembly {
    name: String,
    uid: String,
    version: String,
    loom_config: String,
    debug_build: bool,
    bytecode_mode: BytecodeMode,
    executable: bool,
    references: Vec<String>,
    dependencies: Vec<AssemblyRef>,
    modules: Vec<Module>,
    state: LinkState,
}

impl Assembly {
    /// Nouvelle assembly vide : build debug, mode natif, déjà liée.
    pub fn new(name: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uid: uid.into(),
            version: String::new(),
            loom_config: String::new(),
            debug_build: true,
            bytecode_mode: BytecodeMode::native(),
            executable: false,
            references: Vec::new(),
            dependencies: Vec::new(),
            modules: Vec::new(),
            state: LinkState::Linked,
        }
    }

    /// Emballe dans un handle partagé.
    pub fn into_ref(self) -> AssemblyRef { Rc::new(RefCell::new(self)) }

    /// Nom.
    pub fn name(&self) -> &str { &self.name }
    /// Uid.
    pub fn uid(&self) -> &str { &self.uid }
    /// Version (opaque).
    pub fn version(&self) -> &str { &self.version }
    /// Configuration loom (opaque).
    pub fn loom_config(&self) -> &str { &self.loom_config }
    /// Build debug ?
    pub const fn is_debug_build(&self) -> bool { self.debug_build }
    /// Mode de bytecode des modules.
    pub const fn bytecode_mode(&self) -> BytecodeMode { self.bytecode_mode }
    /// Point d'entrée du programme ?
    pub const fn is_executable(&self) -> bool { self.executable }
    /// État du lien.
    pub const fn state(&self) -> LinkState { self.state }

    /// Fixe la version.
    pub fn set_version(&mut self, version: impl Into<String>) { self.version = version.into(); }
    /// Fixe la configuration loom.
    pub fn set_loom_config(&mut self, config: impl Into<String>) { self.loom_config = config.into(); }
    /// Fixe le drapeau debug.
    pub fn set_debug_build(&mut self, debug: bool) { self.debug_build = debug; }
    /// Fixe le mode de bytecode.
    pub fn set_bytecode_mode(&mut self, mode: BytecodeMode) { self.bytecode_mode = mode; }
    /// Marque l'assembly comme exécutable.
    pub fn set_executable(&mut self, executable: bool) { self.executable = executable; }
    /// Change l'état du lien.
    pub fn set_state(&mut self, state: LinkState) { self.state = state; }

    /// Noms référencés, dans l'ordre (doublons conservés).
    pub fn references(&self) -> &[String] { &self.references }

    /// Ajoute une référence par nom.
    pub fn add_reference(&mut self, name: impl Into<String>) { self.references.push(name.into()); }

    /// Assemblies liées correspondant aux références.
    pub fn dependencies(&self) -> &[AssemblyRef] { &self.dependencies }

    /// Ajoute une assembly liée.
    pub fn add_dependency(&mut self, dependency: AssemblyRef) { self.dependencies.push(dependency); }

    /// Modules dans l'ordre du document.
    pub fn modules(&self) -> &[Module] { &self.modules }

    /// Module par nom.
    pub fn module(&self, name: &str) -> Option<&Module> { self.modules.iter().find(|m| m.name() == name) }

    /// Module par nom (mutable).
    pub fn module_mut(&mut self, name: &str) -> Option<&mut Module> {
        self.modules.iter_mut().find(|m| m.name() == name)
    }

    /// Enregistre un module comme appartenant à l'assembly.
    pub fn add_module(&mut self, module: Module) { self.modules.push(module); }

    /// Nombre total de types (déclarés ou définis).
    pub fn type_count(&self) -> usize { self.modules.iter().map(|m| m.types().len()).sum() }

    /// Cherche un type dans les seuls modules de cette assembly.
    pub fn locate_local_type(&self, full_name: &str) -> Option<TypeLocation> {
        self.modules.iter().find(|m| m.find_type(full_name).is_some()).map(|m| TypeLocation {
            assembly: self.name.clone(),
            module: m.name().to_owned(),
        })
    }

    /// Cherche un type ici, puis dans les dépendances (profondeur d'abord, ordre des références).
    pub fn locate_type(&self, full_name: &str) -> Option<TypeLocation> {
        self.locate_local_type(full_name)
            .or_else(|| self.dependencies.iter().find_map(|d| d.borrow().locate_type(full_name)))
    }
}

impl fmt::Debug for Assembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let deps: Vec<String> = self.dependencies.iter().map(|d| d.borrow().name.clone()).collect();
        f.debug_struct("Assembly")
            .field("name", &self.name)
            .field("uid", &self.uid)
            .field("version", &self.version)
            .field("debug_build", &self.debug_build)
            .field("bytecode_mode", &self.bytecode_mode)
            .field("executable", &self.executable)
            .field("references", &self.references)
            .field("dependencies", &deps)
            .field("modules", &self.modules.len())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
