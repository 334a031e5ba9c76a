//! Subscription tier policy for search radius caps.

use serde::{Deserialize, Serialize};

/// Maximum search radius for free-tier accounts, in meters.
pub const FREE_RADIUS_CAP_M: f64 = 5_000.0;

/// Maximum search radius for premium accounts, in meters.
pub const PREMIUM_RADIUS_CAP_M: f64 = 10_000.0;

/// Account subscription level, read from the worker profile.
///
/// The billing flow that changes this flag lives outside this service; here
/// it only gates how far a radius search may reach.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Premium,
}

impl Tier {
    /// Parse a tier from its stored string form. Anything unrecognized is
    /// treated as free.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "premium" => Self::Premium,
            _ => Self::Free,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Premium => "premium",
        }
    }

    fn radius_cap_m(&self) -> f64 {
        match self {
            Self::Free => FREE_RADIUS_CAP_M,
            Self::Premium => PREMIUM_RADIUS_CAP_M,
        }
    }
}

/// Clamp a requested search radius to the caller's tier cap.
///
/// Requests below the cap pass through unchanged; there is no lower floor.
/// A missing tier resolves to [`Tier::Free`].
pub fn resolve_radius(requested_m: f64, tier: Option<Tier>) -> f64 {
    let tier = tier.unwrap_or_default();
    requested_m.min(tier.radius_cap_m())
}
