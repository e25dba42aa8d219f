use std::fmt;

/// The closed set of community roles an admin can assign. Kept as an enum so
/// role-specific logic is checked for exhaustiveness at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Student,
    Applicant,
    Lecturer,
    Parent,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Student, Role::Applicant, Role::Lecturer, Role::Parent];

    /// Stable token used in callback payloads and the `users.role` column.
    pub fn code(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Applicant => "applicant",
            Role::Lecturer => "lecturer",
            Role::Parent => "parent",
        }
    }

    pub fn from_code(code: &str) -> Option<Role> {
        match code {
            "student" => Some(Role::Student),
            "applicant" => Some(Role::Applicant),
            "lecturer" => Some(Role::Lecturer),
            "parent" => Some(Role::Parent),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Role::Student => "Student",
            Role::Applicant => "Applicant",
            Role::Lecturer => "Lecturer",
            Role::Parent => "Parent",
        };
        write!(f, "{}", label)
    }
}

/// Recipient/listing filter: everyone, or a single role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleFilter {
    All,
    Only(Role),
}

impl RoleFilter {
    pub fn code(&self) -> &'static str {
        match self {
            RoleFilter::All => "all",
            RoleFilter::Only(role) => role.code(),
        }
    }

    pub fn from_code(code: &str) -> Option<RoleFilter> {
        if code == "all" {
            Some(RoleFilter::All)
        } else {
            Role::from_code(code).map(RoleFilter::Only)
        }
    }
}

impl fmt::Display for RoleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleFilter::All => write!(f, "All users"),
            RoleFilter::Only(role) => write!(f, "{}", role),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_codes_round_trip() {
        for role in Role::ALL {
            assert_eq!(Role::from_code(role.code()), Some(role));
        }
    }

    #[test]
    fn test_unknown_role_rejected() {
        assert_eq!(Role::from_code("NotARole"), None);
        assert_eq!(Role::from_code(""), None);
        // Display labels are not wire codes.
        assert_eq!(Role::from_code("Student"), None);
    }

    #[test]
    fn test_filter_codes() {
        assert_eq!(RoleFilter::from_code("all"), Some(RoleFilter::All));
        assert_eq!(
            RoleFilter::from_code("lecturer"),
            Some(RoleFilter::Only(Role::Lecturer))
        );
        assert_eq!(RoleFilter::from_code("everyone"), None);
    }
}
