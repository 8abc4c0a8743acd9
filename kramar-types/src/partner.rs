//! Partner identities derived from what a peer advertises.
//!
//! Every record received from a peer is re-keyed under a partner id so it can
//! never collide with the local user's own records.

use crate::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix carried by every derived partner id.
pub const PARTNER_ID_PREFIX: &str = "partner";

/// Display label used when the peer did not advertise a name.
pub const FALLBACK_PARTNER_LABEL: &str = "Partner";

/// A stable, partner-scoped identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartnerIdentity {
    /// Storage key for partner records (e.g. `partner-anna`).
    id: String,
    /// Human-readable name shown in the UI.
    label: String,
}

impl PartnerIdentity {
    /// Derives a partner identity from the peer's advertised name.
    ///
    /// The same name always yields the same id, which is what makes repeated
    /// syncs upsert instead of accumulating duplicates.
    pub fn derive(peer_name: Option<&str>, local_user: &UserId) -> Self {
        let label = peer_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(FALLBACK_PARTNER_LABEL)
            .to_string();

        let slug = slugify(&label);
        let mut id = if slug.is_empty() {
            PARTNER_ID_PREFIX.to_string()
        } else {
            format!("{PARTNER_ID_PREFIX}-{slug}")
        };
        if id == local_user.as_str() {
            id.push_str("-peer");
        }

        Self { id, label }
    }

    /// The partner-scoped storage id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The display label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Key of the partner's health plan record.
    pub fn health_plan_id(&self) -> String {
        format!("{}-healthplan", self.id)
    }

    /// Key of one partner check-in, scoped by the original check-in id.
    pub fn check_in_id(&self, original: &str) -> String {
        format!("{}-{original}", self.id)
    }
}

impl fmt::Display for PartnerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.id)
    }
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}
