//! Acting user context
//!
//! Every engine call receives the actor as an explicit value resolved by
//! the upstream identity layer. There is no ambient current-user state.

use serde::{Deserialize, Serialize};

/// Roles recognized by the workflow role matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Occurrence-book desk officer
    ObOfficer,
    /// Administrator of one station
    StationAdmin,
    /// Administrator across stations
    Admin,
    SuperAdmin,
    Investigator,
    /// Court registry user
    CourtUser,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::ObOfficer => "ob_officer",
            Role::StationAdmin => "station_admin",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
            Role::Investigator => "investigator",
            Role::CourtUser => "court_user",
        }
    }

    /// Parse from the stored string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ob_officer" => Some(Role::ObOfficer),
            "station_admin" => Some(Role::StationAdmin),
            "admin" => Some(Role::Admin),
            "super_admin" => Some(Role::SuperAdmin),
            "investigator" => Some(Role::Investigator),
            "court_user" => Some(Role::CourtUser),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The acting user for one workflow request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
    pub org_unit_id: String,
}

impl Actor {
    pub fn new(user_id: &str, role: Role, org_unit_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            role,
            org_unit_id: org_unit_id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [
            Role::ObOfficer,
            Role::StationAdmin,
            Role::Admin,
            Role::SuperAdmin,
            Role::Investigator,
            Role::CourtUser,
        ] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("clerk"), None);
    }
}
