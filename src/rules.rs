// 🏷️ Rewrite Rules - Rules as Data
// Phrase replacements and name-spelling fixes applied to converted text

use anyhow::{Context as AnyhowContext, Result};
use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// RULE DEFINITIONS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteRule {
    /// Rule ID for tracking
    pub id: String,

    /// Regex to match
    pub pattern: String,

    /// Replacement, `$1` / `${name}` refer to capture groups
    pub replacement: String,

    /// Description/notes about this rule
    #[serde(default)]
    pub description: Option<String>,

    /// Priority (higher = applied first)
    #[serde(default = "default_priority")]
    pub priority: i32,
}

fn default_priority() -> i32 {
    0
}

/// Correct spelling of a name plus known misspellings of it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameFix {
    pub correct: String,

    #[serde(default)]
    pub misspellings: Vec<String>,
}

/// On-disk shape of a rules file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleFile {
    #[serde(default)]
    pub rewrites: Vec<RewriteRule>,

    #[serde(default)]
    pub names: Vec<NameFix>,
}

// ============================================================================
// COMPILED RULES
// ============================================================================

#[derive(Debug, Clone)]
struct CompiledRewrite {
    rule: RewriteRule,
    regex: Regex,
}

/// One literal substitution derived from a NameFix
#[derive(Debug, Clone)]
struct NameSubstitution {
    regex: Regex,
    replacement: String,
}

impl NameFix {
    /// Expand into literal substitutions, in application order:
    /// lowercase -> Correct, MISSPELLING -> CORRECT, Misspelling|misspelling -> Correct
    fn substitutions(&self) -> Result<Vec<NameSubstitution>> {
        let mut subs = Vec::new();

        if !self.correct.is_empty() {
            subs.push(NameSubstitution {
                regex: Regex::new(&regex::escape(&self.correct.to_lowercase()))?,
                replacement: self.correct.clone(),
            });
        }

        for misspelling in self.misspellings.iter().filter(|m| !m.is_empty()) {
            subs.push(NameSubstitution {
                regex: Regex::new(&regex::escape(&misspelling.to_uppercase()))?,
                replacement: self.correct.to_uppercase(),
            });
            subs.push(NameSubstitution {
                regex: Regex::new(&format!(
                    "{}|{}",
                    regex::escape(misspelling),
                    regex::escape(&misspelling.to_lowercase())
                ))?,
                replacement: self.correct.clone(),
            });
        }

        Ok(subs)
    }
}

// ============================================================================
// RULE SET
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rewrites: Vec<CompiledRewrite>,
    names: Vec<NameSubstitution>,
}

impl RuleSet {
    /// Create an empty rule set (conversion only, no rewrites)
    pub fn new() -> Self {
        RuleSet::default()
    }

    /// Load rules from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read rules file: {:?}", path.as_ref()))?;

        let file: RuleFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse rules JSON: {:?}", path.as_ref()))?;

        RuleSet::from_rules(file.rewrites, file.names)
    }

    /// Compile rules; an invalid pattern fails the whole set
    pub fn from_rules(rewrites: Vec<RewriteRule>, names: Vec<NameFix>) -> Result<Self> {
        let mut set = RuleSet::new();

        for rule in rewrites {
            set.add_rule(rule)?;
        }

        for fix in &names {
            let subs = fix
                .substitutions()
                .with_context(|| format!("Invalid name fix for {:?}", fix.correct))?;
            set.names.extend(subs);
        }

        Ok(set)
    }

    /// Add a single rewrite rule
    pub fn add_rule(&mut self, rule: RewriteRule) -> Result<()> {
        let regex = Regex::new(&rule.pattern)
            .with_context(|| format!("Invalid pattern in rule {:?}: {}", rule.id, rule.pattern))?;

        self.rewrites.push(CompiledRewrite { rule, regex });
        // Stable sort keeps file order among equal priorities
        self.rewrites
            .sort_by(|a, b| b.rule.priority.cmp(&a.rule.priority));
        Ok(())
    }

    /// Apply phrase rewrites, then name fixes
    pub fn apply(&self, text: &str) -> String {
        let mut text = text.to_string();

        for compiled in &self.rewrites {
            text = compiled
                .regex
                .replace_all(&text, compiled.rule.replacement.as_str())
                .into_owned();
        }

        for sub in &self.names {
            text = sub
                .regex
                .replace_all(&text, NoExpand(&sub.replacement))
                .into_owned();
        }

        text
    }

    /// Get number of rewrite rules loaded
    pub fn rule_count(&self) -> usize {
        self.rewrites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewrites.is_empty() && self.names.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================
