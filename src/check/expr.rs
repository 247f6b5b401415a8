//! AND-of-OR test expressions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A boolean requirement shaped as an AND of OR-groups.
///
/// Every group must have at least one satisfied alternative. An expression
/// with no groups is "no requirement" and is always satisfied.
///
/// # Example
///
/// ```rust
/// use feature_installer::TestExpr;
///
/// let expr = TestExpr::parse_modules("numpy|numpy_compat scipy");
/// assert_eq!(expr.groups().len(), 2);
/// assert_eq!(expr.groups()[0], vec!["numpy", "numpy_compat"]);
///
/// assert!(TestExpr::parse_modules("").is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestExpr {
    groups: Vec<Vec<String>>,
}

impl TestExpr {
    /// Parse a module expression.
    ///
    /// Whitespace separates AND groups and `|` separates alternatives
    /// inside a group. Empty alternatives and empty groups are dropped.
    pub fn parse_modules(text: &str) -> Self {
        let groups = text
            .split_whitespace()
            .map(|term| {
                term.split('|')
                    .map(str::trim)
                    .filter(|alt| !alt.is_empty())
                    .map(String::from)
                    .collect::<Vec<_>>()
            })
            .filter(|group| !group.is_empty())
            .collect();
        Self { groups }
    }

    /// Parse a semicolon-separated command list.
    ///
    /// Commands may contain spaces, so each entry becomes its own group
    /// with a single alternative: all of them must succeed.
    ///
    /// # Example
    ///
    /// ```rust
    /// use feature_installer::TestExpr;
    ///
    /// let expr = TestExpr::parse_commands("julius --help; ffmpeg -version;");
    /// assert_eq!(expr.groups(), &[vec!["julius --help".to_string()], vec!["ffmpeg -version".to_string()]]);
    /// ```
    pub fn parse_commands(text: &str) -> Self {
        let groups = text
            .split(';')
            .map(str::trim)
            .filter(|cmd| !cmd.is_empty())
            .map(|cmd| vec![cmd.to_string()])
            .collect();
        Self { groups }
    }

    /// Build an expression from already-split groups.
    pub fn from_groups(groups: Vec<Vec<String>>) -> Self {
        let groups = groups.into_iter().filter(|g| !g.is_empty()).collect();
        Self { groups }
    }

    /// The AND groups, each holding its OR alternatives.
    pub fn groups(&self) -> &[Vec<String>] {
        &self.groups
    }

    /// True when the expression imposes no requirement.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl fmt::Display for TestExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.groups.iter().map(|g| g.join("|")).collect();
        write!(f, "{}", rendered.join(" "))
    }
}
