//! Textual include expansion.
//!
//! A line of the form `include <name>`, `#include <name>` or `#include "name"` is replaced by the
//! preprocessed text of `name`. Every file is expanded at most once per stage, and an include that
//! re-enters a file still being expanded is rejected.

use std::collections::HashSet;

use super::ShaderSourceProvider;
use crate::errors::ShaderError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preprocessed {
    pub text: String,
    /// Every file pulled in through an include, in expansion order.
    pub included_files: Vec<String>,
}

pub fn preprocess(
    name: &str,
    provider: &dyn ShaderSourceProvider,
) -> Result<Preprocessed, ShaderError> {
    let mut state = Expansion {
        provider,
        stack: Vec::new(),
        expanded: HashSet::new(),
        output: Preprocessed::default(),
    };
    state.expand(name, None)?;
    Ok(state.output)
}

/// Returns the include target of a line, if it is an include directive.
pub fn parse_include(line: &str) -> Option<&str> {
    let line = line.trim();
    let rest = line
        .strip_prefix("#include")
        .or_else(|| line.strip_prefix("include"))?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim();
    let (open, close) = match rest.chars().next()? {
        '<' => ('<', '>'),
        '"' => ('"', '"'),
        _ => return None,
    };
    let inner = rest.strip_prefix(open)?;
    let end = inner.find(close)?;
    let target = inner[..end].trim();
    (!target.is_empty()).then_some(target)
}

struct Expansion<'a> {
    provider: &'a dyn ShaderSourceProvider,
    stack: Vec<String>,
    expanded: HashSet<String>,
    output: Preprocessed,
}

impl Expansion<'_> {
    fn expand(&mut self, name: &str, from: Option<&str>) -> Result<(), ShaderError> {
        if self.stack.iter().any(|open| open == name) {
            let mut chain = self.stack.clone();
            chain.push(name.to_string());
            return Err(ShaderError::IncludeCycle { chain });
        }
        if !self.expanded.insert(name.to_string()) {
            return Ok(());
        }

        let text = match self.provider.source(name) {
            Some(text) => text.into_owned(),
            None => {
                return Err(match from {
                    Some(from) => ShaderError::IncludeNotFound {
                        name: name.to_string(),
                        from: from.to_string(),
                    },
                    None => ShaderError::SourceNotFound(name.to_string()),
                })
            }
        };

        if from.is_some() {
            self.output.included_files.push(name.to_string());
        }
        self.stack.push(name.to_string());
        for line in text.lines() {
            match parse_include(line) {
                Some(target) => self.expand(target, Some(name))?,
                None => {
                    self.output.text.push_str(line);
                    self.output.text.push('\n');
                }
            }
        }
        self.stack.pop();
        Ok(())
    }
}
