//! Rule-based transaction categorization
//!
//! Each rule maps a group of description keywords to a category-name
//! fragment. Rules are tried in priority order and the first rule whose
//! keywords match decides the outcome, even when no category in the taxonomy
//! carries the target name. Within a rule, the first category in input order
//! whose name contains one of the fragments wins.

use tracing::debug;

use crate::models::{Category, Transaction};

/// A keyword-group rule
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRule {
    /// Short name used in logs
    pub group: &'static str,
    /// Lowercase substrings matched against the description
    pub keywords: &'static [&'static str],
    /// Lowercase substrings matched against category names
    pub targets: &'static [&'static str],
}

impl CategoryRule {
    fn matches(&self, description: &str) -> bool {
        self.keywords.iter().any(|k| description.contains(k))
    }

    /// First category (in input order) whose name contains a target fragment
    fn resolve<'a>(&self, categories: &'a [Category]) -> Option<&'a Category> {
        categories.iter().find(|c| {
            let name = c.name.to_lowercase();
            self.targets.iter().any(|t| name.contains(t))
        })
    }
}

/// Built-in rules, highest priority first
pub const DEFAULT_RULES: &[CategoryRule] = &[
    CategoryRule {
        group: "grocery",
        keywords: &["grocery", "food", "market"],
        targets: &["grocer"],
    },
    CategoryRule {
        group: "housing",
        keywords: &["rent", "mortgage", "housing"],
        targets: &["hous"],
    },
    CategoryRule {
        group: "dining",
        keywords: &["restaurant", "café", "cafe", "dining"],
        targets: &["dining", "restaurant"],
    },
    CategoryRule {
        group: "utilities",
        keywords: &["electric", "utility", "water bill", "internet", "phone bill"],
        targets: &["utilit"],
    },
    CategoryRule {
        group: "transportation",
        keywords: &["uber", "lyft", "fuel", "gas station", "parking", "transit"],
        targets: &["transport"],
    },
    CategoryRule {
        group: "entertainment",
        keywords: &["netflix", "spotify", "cinema", "movie", "concert"],
        targets: &["entertain"],
    },
    CategoryRule {
        group: "healthcare",
        keywords: &["pharmacy", "doctor", "clinic", "hospital", "dental"],
        targets: &["health"],
    },
    CategoryRule {
        group: "education",
        keywords: &["tuition", "school", "university", "course"],
        targets: &["educat"],
    },
    CategoryRule {
        group: "shopping",
        keywords: &["amazon", "department store", "mall"],
        targets: &["shop"],
    },
    CategoryRule {
        group: "income",
        keywords: &["payroll", "salary", "direct deposit"],
        targets: &["salary", "income"],
    },
];

/// Keyword categorizer
#[derive(Debug, Clone)]
pub struct Categorizer {
    rules: Vec<CategoryRule>,
}

impl Default for Categorizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Categorizer {
    /// Create a categorizer with the built-in rules
    pub fn new() -> Self {
        Self {
            rules: DEFAULT_RULES.to_vec(),
        }
    }

    /// Create a categorizer with custom rules
    pub fn with_rules(rules: Vec<CategoryRule>) -> Self {
        Self { rules }
    }

    /// Category id for a description, if a rule matches and its target exists
    pub fn classify(&self, description: &str, categories: &[Category]) -> Option<String> {
        let description = description.to_lowercase();
        let rule = self.rules.iter().find(|r| r.matches(&description))?;
        let category = rule.resolve(categories);
        debug!(
            group = rule.group,
            category = category.map(|c| c.name.as_str()).unwrap_or("<absent>"),
            "Keyword rule matched"
        );
        category.map(|c| c.id.clone())
    }

    /// Fill `category_id` on uncategorized transactions
    ///
    /// Existing assignments are never touched, so the operation is idempotent.
    pub fn categorize(&self, transactions: &[Transaction], categories: &[Category]) -> Vec<Transaction> {
        if categories.is_empty() {
            return transactions.to_vec();
        }

        transactions
            .iter()
            .map(|t| {
                let mut t = t.clone();
                if t.category_id.is_none() {
                    t.category_id = self.classify(&t.description, categories);
                }
                t
            })
            .collect()
    }
}

/// Categorize with the default keyword rules
pub fn categorize(transactions: &[Transaction], categories: &[Category]) -> Vec<Transaction> {
    Categorizer::new().categorize(transactions, categories)
}
