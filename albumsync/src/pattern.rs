use regex::Regex;

/// Directory-name filter with prefix-anchored semantics: the expression has
/// to match at the start of the name but may leave a suffix unmatched, so
/// `\d{4}-\d{2}` accepts `2023-07 Lisbon`.
#[derive(Debug, Clone)]
pub struct NamePattern {
    source: String,
    regex: Regex,
}

impl NamePattern {
    pub fn new(expr: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{expr})"))?;
        Ok(Self {
            source: expr.to_string(),
            regex,
        })
    }

    /// Pattern accepting exactly one name.
    pub fn exact(name: &str) -> Self {
        let source = format!("{}$", regex::escape(name));
        let regex = Regex::new(&format!("^(?:{source})"))
            .expect("escaped literal is always a valid expression");
        Self { source, regex }
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl std::fmt::Display for NamePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}
