//! Route classifier — maps URL paths to admission classes.
//!
//! DESIGN
//! ======
//! A static prefix table, checked in strict precedence order:
//! admin > user-protected > auth-only > public. A path matches an entry iff
//! it equals the entry or starts with the entry plus `/`, so `/account/edit`
//! matches `/account` but `/accounts` does not. Unmatched paths are
//! `Unclassified`: allowed through, never guarded. Pure lookup, no errors.

/// Admission class of a storefront path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Admin console pages. Requires a credential at the gate; the guard
    /// additionally requires the admin role.
    Admin,
    /// Pages tied to a signed-in customer (account, checkout, orders...).
    UserProtected,
    /// Auth-only pages (login, register...). A signed-in user is bounced
    /// back to the storefront home.
    Auth,
    /// Explicitly public storefront pages.
    Public,
    /// Not in the table. Allowed, not guarded.
    Unclassified,
}

impl RouteClass {
    /// True for the classes the gate requires a credential on.
    #[must_use]
    pub fn is_protected(self) -> bool {
        matches!(self, Self::Admin | Self::UserProtected)
    }
}

/// Static prefix table for the storefront.
#[derive(Debug, Clone)]
pub struct RouteTable {
    admin: Vec<&'static str>,
    user_protected: Vec<&'static str>,
    auth: Vec<&'static str>,
    public: Vec<&'static str>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self {
            admin: vec!["/admin"],
            user_protected: vec!["/account", "/checkout", "/orders", "/profile", "/wishlist", "/compare"],
            auth: vec!["/login", "/register", "/forgot-password", "/reset-password", "/auth/callback"],
            public: vec!["/", "/products", "/categories", "/search", "/about", "/contact"],
        }
    }
}

impl RouteTable {
    /// Classify a path. First match in precedence order wins.
    #[must_use]
    pub fn classify(&self, path: &str) -> RouteClass {
        if matches_any(&self.admin, path) {
            RouteClass::Admin
        } else if matches_any(&self.user_protected, path) {
            RouteClass::UserProtected
        } else if matches_any(&self.auth, path) {
            RouteClass::Auth
        } else if matches_any(&self.public, path) {
            RouteClass::Public
        } else {
            RouteClass::Unclassified
        }
    }
}

/// Prefix match at a path-segment boundary: equal, or `entry/` prefix.
/// The bare `/` entry only matches the root path itself.
fn matches_entry(entry: &str, path: &str) -> bool {
    if path == entry {
        return true;
    }
    if entry == "/" {
        return false;
    }
    path.starts_with(entry) && path.as_bytes().get(entry.len()) == Some(&b'/')
}

fn matches_any(entries: &[&str], path: &str) -> bool {
    entries.iter().any(|entry| matches_entry(entry, path))
}

#[cfg(test)]
#[path = "classifier_test.rs"]
mod tests;
