/// User-Agent block list
/// Crawlers matching any token get the decoy page instead of a relayed response
use regex::Regex;
use std::sync::OnceLock;

/// Tokens blocked on every deployment.
const SEED_TOKENS: &[&str] = &["netcraft"];

static SEPARATORS: OnceLock<Regex> = OnceLock::new();

/// Immutable set of lower-case User-Agent substrings.
#[derive(Debug, Clone, Default)]
pub struct UaBlockList {
    tokens: Vec<String>,
}

impl UaBlockList {
    /// Seed tokens plus those parsed from `extra`.
    pub fn new(extra: &str) -> Self {
        let mut tokens: Vec<String> = SEED_TOKENS.iter().map(|t| t.to_string()).collect();
        for token in parse_tokens(extra) {
            if !tokens.contains(&token) {
                tokens.push(token);
            }
        }
        Self { tokens }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// A missing User-Agent is checked as the literal `null`.
    pub fn is_blocked(&self, user_agent: Option<&str>) -> bool {
        let agent = user_agent.unwrap_or("null").to_lowercase();
        self.tokens.iter().any(|token| agent.contains(token.as_str()))
    }
}

/// Split on runs of tabs, spaces, `|`, quotes and line breaks, or commas.
pub fn parse_tokens(raw: &str) -> Vec<String> {
    let separators = SEPARATORS.get_or_init(|| {
        Regex::new(r#"[\t |"'\r\n,]+"#).expect("separator pattern must compile")
    });
    separators
        .split(raw)
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}
