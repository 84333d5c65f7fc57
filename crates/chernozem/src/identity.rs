//! Object identity tokens.
//!
//! [`IdentityTable`] hands out an [`ObjectToken`] per live object reference.
//! Tokens come from one process-wide counter, so no two tables ever issue
//! the same token. It holds weak references only: it observes
//! objects, it never keeps them alive. A weak reference also keeps the
//! allocation's address reserved, so an address can only be reissued to a
//! new object once the stale entry is purged.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;

use crate::key::ObjectToken;
use crate::object::Object;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Default)]
pub struct IdentityTable {
    tokens: HashMap<usize, (Weak<dyn Any + Send + Sync>, ObjectToken)>,
    /// Every token this table handed out, including those of dead objects.
    issued: HashSet<ObjectToken>,
}

impl IdentityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token previously issued for this object, if it is still alive.
    pub fn lookup(&self, object: &Object) -> Option<ObjectToken> {
        self.tokens
            .get(&object.addr())
            .filter(|(weak, _)| weak.strong_count() > 0)
            .map(|(_, token)| *token)
    }

    /// Token for this object, issuing a new one on first sight.
    pub fn intern(&mut self, object: &Object) -> ObjectToken {
        if let Some(token) = self.lookup(object) {
            return token;
        }
        self.purge();
        let token = ObjectToken::new(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed));
        self.issued.insert(token);
        self.tokens
            .insert(object.addr(), (object.downgrade(), token));
        token
    }

    /// Returns `true` if `token` was handed out by this table.
    pub fn issued(&self, token: ObjectToken) -> bool {
        self.issued.contains(&token)
    }

    /// Number of live tracked objects.
    pub fn len(&self) -> usize {
        self.tokens
            .values()
            .filter(|(weak, _)| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop entries whose objects are gone.
    pub fn purge(&mut self) {
        self.tokens.retain(|_, (weak, _)| weak.strong_count() > 0);
    }
}
