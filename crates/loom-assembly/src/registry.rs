//! Registre des assemblies chargées (côté VM).

use indexmap::IndexMap;

use loom_core::AssemblyRef;

/// Magasin des assemblies chargées, clé `(name, uid)`.
pub trait AssemblyRegistry {
    /// Assembly enregistrée sous `(name, uid)`.
    fn find(&self, name: &str, uid: &str) -> Option<AssemblyRef>;

    /// Première assembly enregistrée sous `name`, quel que soit son uid.
    fn find_by_name(&self, name: &str) -> Option<AssemblyRef>;

    /// Enregistre une assembly sous sa clé.
    fn register(&mut self, assembly: AssemblyRef);

    /// Retire l'entrée `(name, uid)` ; sert à ne pas laisser d'assembly à moitié liée.
    fn unregister(&mut self, name: &str, uid: &str) -> Option<AssemblyRef>;
}

/// Registre en mémoire, ordonné par enregistrement.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    entries: IndexMap<(String, String), AssemblyRef>,
}

impl InMemoryRegistry {
    /// Registre vide.
    pub fn new() -> Self { Self::default() }

    /// Nombre d'assemblies enregistrées.
    pub fn len(&self) -> usize { self.entries.len() }

    /// Vrai si rien n'est enregistré.
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Assemblies dans l'ordre d'enregistrement.
    pub fn iter(&self) -> impl Iterator<Item = &AssemblyRef> { self.entries.values() }
}

impl AssemblyRegistry for InMemoryRegistry {
    fn find(&self, name: &str, uid: &str) -> Option<AssemblyRef> {
        self.entries.get(&(name.to_owned(), uid.to_owned())).cloned()
    }

    fn find_by_name(&self, name: &str) -> Option<AssemblyRef> {
        self.entries.iter().find(|((n, _), _)| n == name).map(|(_, a)| a.clone())
    }

    fn register(&mut self, assembly: AssemblyRef) {
        let key = {
            let a = assembly.borrow();
            (a.name().to_owned(), a.uid().to_owned())
        };
        self.entries.insert(key, assembly);
    }

    fn unregister(&mut self, name: &str, uid: &str) -> Option<AssemblyRef> {
        self.entries.shift_remove(&(name.to_owned(), uid.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_core::Assembly;
    use std::rc::Rc;

    #[test]
    fn keyed_by_name_and_uid() {
        let mut reg = InMemoryRegistry::new();
        let a = Assembly::new("Game", "uid-1").into_ref();
        let b = Assembly::new("Game", "uid-2").into_ref();
        reg.register(a.clone());
        reg.register(b.clone());

        assert_eq!(reg.len(), 2);
        assert!(Rc::ptr_eq(&reg.find("Game", "uid-2").unwrap(), &b));
        assert!(Rc::ptr_eq(&reg.find_by_name("Game").unwrap(), &a));
        assert!(reg.find("Game", "uid-3").is_none());
        assert!(reg.find_by_name("System").is_none());
    }

    #[test]
    fn unregister_keeps_order() {
        let mut reg = InMemoryRegistry::new();
        for (n, u) in [("A", "1"), ("B", "2"), ("C", "3")] {
            reg.register(Assembly::new(n, u).into_ref());
        }
        assert!(reg.unregister("B", "2").is_some());
        assert!(reg.unregister("B", "2").is_none());
        let names: Vec<String> = reg.iter().map(|a| a.borrow().name().to_owned()).collect();
        assert_eq!(names, ["A", "C"]);
    }
}
