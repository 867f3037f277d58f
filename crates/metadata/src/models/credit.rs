use std::fmt::{Display, Formatter, Result as FmtResult};

/// A person credited for work on an issue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Credit {
    /// Name as it should be displayed
    pub person: String,
    /// Free-form role (e.g., "Writer", "Penciller", "Cover")
    pub role: String,
    /// Whether this is the headline credit for the role
    pub primary: bool,
}
impl Credit {
    pub fn new(person: impl Into<String>, role: impl Into<String>) -> Self {
        Self { person: person.into(), role: role.into(), primary: false }
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Case-insensitive role comparison.
    pub fn has_role(&self, role: &str) -> bool {
        self.role.trim().eq_ignore_ascii_case(role)
    }
}
impl<P: Into<String>, R: Into<String>> From<(P, R)> for Credit {
    fn from((person, role): (P, R)) -> Self {
        Self::new(person, role)
    }
}

impl Display for Credit {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} ({})", self.person, self.role)
    }
}
