//! Fournisseur d'uid.
//!
//! Un uid départage deux assemblies de même nom. Format canonique : uuid v4
//! en minuscules avec tirets, 36 caractères.

use uuid::Uuid;

use crate::UID_LEN;

/// Produit un identifiant frais à chaque appel.
pub trait UidProvider {
    /// Nouvel uid canonique.
    fn generate(&mut self) -> String;
}

/// Uid aléatoires (uuid v4).
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomUid;

impl UidProvider for RandomUid {
    fn generate(&mut self) -> String {
        Uuid::new_v4().hyphenated().to_string()
    }
}

/// Toute closure `FnMut() -> String` sert de fournisseur (tests, ids déterministes).
impl<F> UidProvider for F
where
    F: FnMut() -> String,
{
    fn generate(&mut self) -> String { self() }
}

/// Vrai si `uid` a la forme canonique `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx` en minuscules.
pub fn is_canonical_uid(uid: &str) -> bool {
    uid.len() == UID_LEN
        && Uuid::parse_str(uid).is_ok()
        && uid.bytes().all(|b| b == b'-' || b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_uid_is_canonical() {
        let mut p = RandomUid;
        let a = p.generate();
        assert_eq!(a.len(), UID_LEN);
        assert!(is_canonical_uid(&a));
    }

    #[test]
    fn random_uids_differ() {
        let mut p = RandomUid;
        let ids: std::collections::HashSet<String> = (0..256).map(|_| p.generate()).collect();
        assert_eq!(ids.len(), 256);
    }

    #[test]
    fn closure_provider() {
        let mut n = 0;
        let mut p = || {
            n += 1;
            format!("00000000-0000-4000-8000-{n:012}")
        };
        assert_eq!(p.generate(), "00000000-0000-4000-8000-000000000001");
        assert!(is_canonical_uid(&p.generate()));
    }

    #[test]
    fn rejects_uppercase_and_short() {
        assert!(!is_canonical_uid("ABCDEF00-0000-4000-8000-000000000001"));
        assert!(!is_canonical_uid("1234"));
    }
}
