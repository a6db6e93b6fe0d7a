//! Closed set of specialist domains for delegated sub-agents.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialistKind {
    Database,
    Frontend,
    Workflow,
    Api,
    Testing,
}

impl SpecialistKind {
    pub const ALL: [SpecialistKind; 5] = [
        Self::Database,
        Self::Frontend,
        Self::Workflow,
        Self::Api,
        Self::Testing,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::Frontend => "frontend",
            Self::Workflow => "workflow",
            Self::Api => "api",
            Self::Testing => "testing",
        }
    }

    /// Domain guidance lines embedded in the specialist prompt.
    pub fn guidance(self) -> &'static [&'static str] {
        match self {
            Self::Database => &[
                "Focus only on database design, schema creation, and data modeling",
                "Use indexes and constraints deliberately; keep the schema normalized",
                "Add migrations and seed data when the task needs them",
                "Validate the schema design before reporting completion",
            ],
            Self::Frontend => &[
                "Focus only on UI components and mobile-first layout",
                "Keep components small and reusable with explicit props",
                "Treat accessibility and responsive behavior as requirements",
                "Assess code quality of the components you write",
            ],
            Self::Workflow => &[
                "Focus only on user flows, navigation, and routing",
                "Handle error and loading states on every path",
                "Keep state transitions explicit and easy to follow",
            ],
            Self::Api => &[
                "Focus only on backend endpoints and business logic",
                "Validate inputs and return precise status codes and errors",
                "Apply authentication and authorization where data is exposed",
            ],
            Self::Testing => &[
                "Focus only on the testing strategy and its implementation",
                "Cover units, integration paths, and end-to-end flows",
                "Run the tests you write and report failures honestly",
            ],
        }
    }
}

impl fmt::Display for SpecialistKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpecialistKind {
    type Err = String;

    /// Accepts `database` as well as `database_specialist`, case-insensitively.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        let base = normalized
            .strip_suffix("_specialist")
            .unwrap_or(&normalized);
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == base)
            .ok_or_else(|| raw.to_string())
    }
}
