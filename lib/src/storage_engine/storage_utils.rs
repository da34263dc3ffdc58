// lib/src/storage_engine/storage_utils.rs
use models::identifiers::PUBLIC_SCHEMA;
use models::Identifier;

/// Top level partition of the key space. Tenant namespaces are named after
/// the hospital's schema name, which can never be `public`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Public,
    Tenant(Identifier),
}

impl Namespace {
    pub fn as_str(&self) -> &str {
        match self {
            Namespace::Public => PUBLIC_SCHEMA,
            Namespace::Tenant(schema) => schema.as_str(),
        }
    }
}

/// Concatenates length-prefixed components (u32 big endian length + bytes).
/// The prefix of a key built from the first `n` components is exactly the
/// key built from those components, so prefix scans never bleed across
/// namespaces or collections with a shared textual prefix.
pub fn build_key(components: &[&[u8]]) -> Vec<u8> {
    let capacity = components.iter().map(|c| c.len() + 4).sum();
    let mut key = Vec::with_capacity(capacity);
    for component in components {
        key.extend_from_slice(&(component.len() as u32).to_be_bytes());
        key.extend_from_slice(component);
    }
    key
}

pub fn collection_prefix(namespace: Namespace, collection: &str) -> Vec<u8> {
    build_key(&[namespace.as_str().as_bytes(), collection.as_bytes()])
}

pub fn record_key(namespace: Namespace, collection: &str, id: &[u8]) -> Vec<u8> {
    build_key(&[namespace.as_str().as_bytes(), collection.as_bytes(), id])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaces_do_not_share_prefixes() {
        let a = Namespace::Tenant(Identifier::new("clinic".into()).unwrap());
        let b = Namespace::Tenant(Identifier::new("clinic_two".into()).unwrap());
        let key = record_key(b, "slots", b"1");
        assert!(!key.starts_with(&collection_prefix(a, "slots")));
        assert!(key.starts_with(&collection_prefix(b, "slots")));
    }

    #[test]
    fn collections_do_not_share_prefixes() {
        let key = record_key(Namespace::Public, "users_archive", b"1");
        assert!(!key.starts_with(&collection_prefix(Namespace::Public, "users")));
    }
}
