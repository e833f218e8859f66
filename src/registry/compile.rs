//! Pattern definition to grammar compilation

use std::collections::HashMap;
use std::sync::Arc;

use super::PatternEntry;
use crate::error::{Result, XapiError};
use crate::pattern::Pattern;
use crate::profile::{PatternOperator, Reference};
use crate::template::Template;

/// Compiles pattern definitions into shared [`Pattern`] trees
///
/// References resolve to a pattern first, then to a template of the same
/// profile as the referring pattern. Each pattern is compiled once; the
/// result is reused by every pattern that refers to it.
pub(crate) struct GrammarCompiler<'r> {
    patterns: &'r HashMap<String, PatternEntry>,
    templates: &'r HashMap<String, Arc<Template>>,
    compiled: HashMap<String, Arc<Pattern>>,
    in_progress: Vec<String>,
}

impl<'r> GrammarCompiler<'r> {
    pub(crate) fn new(
        patterns: &'r HashMap<String, PatternEntry>,
        templates: &'r HashMap<String, Arc<Template>>,
    ) -> Self {
        Self {
            patterns,
            templates,
            compiled: HashMap::new(),
            in_progress: Vec::new(),
        }
    }

    /// Seed the compiler with grammars compiled earlier
    pub(crate) fn with_cache(mut self, cache: &HashMap<String, Arc<Pattern>>) -> Self {
        self.compiled.extend(cache.iter().map(|(k, v)| (k.clone(), Arc::clone(v))));
        self
    }

    /// Every grammar compiled so far, including the seeded ones
    pub(crate) fn into_compiled(self) -> HashMap<String, Arc<Pattern>> {
        self.compiled
    }

    pub(crate) fn compile(&mut self, pattern_id: &str) -> Result<Arc<Pattern>> {
        if let Some(grammar) = self.compiled.get(pattern_id) {
            return Ok(Arc::clone(grammar));
        }

        if self.in_progress.iter().any(|id| id == pattern_id) {
            let mut cycle = self.in_progress.clone();
            cycle.push(pattern_id.to_string());
            return Err(XapiError::structural(format!(
                "pattern reference cycle: {}",
                cycle.join(" -> ")
            )));
        }

        let patterns = self.patterns;
        let entry = patterns
            .get(pattern_id)
            .ok_or_else(|| XapiError::structural(format!("unknown pattern '{}'", pattern_id)))?;

        self.in_progress.push(pattern_id.to_string());
        let grammar = self.compile_entry(entry);
        self.in_progress.pop();

        let grammar = Arc::new(grammar?);
        tracing::debug!(pattern = pattern_id, grammar = %grammar, "compiled pattern");
        self.compiled.insert(pattern_id.to_string(), Arc::clone(&grammar));
        Ok(grammar)
    }

    fn compile_entry(&mut self, entry: &PatternEntry) -> Result<Pattern> {
        let definition = &entry.definition;
        Ok(match definition.operator()? {
            PatternOperator::Sequence(children) => {
                Pattern::Sequence(self.children(entry, children)?)
            }
            PatternOperator::Alternates(children) => {
                Pattern::Alternates(self.children(entry, children)?)
            }
            PatternOperator::Optional(child) => Pattern::Optional(self.reference(entry, child)?),
            PatternOperator::OneOrMore(child) => Pattern::OneOrMore(self.reference(entry, child)?),
            PatternOperator::ZeroOrMore(child) => Pattern::ZeroOrMore(self.reference(entry, child)?),
        })
    }

    fn children(&mut self, entry: &PatternEntry, children: &[Reference]) -> Result<Vec<Arc<Pattern>>> {
        children.iter().map(|child| self.reference(entry, child)).collect()
    }

    fn reference(&mut self, entry: &PatternEntry, reference: &Reference) -> Result<Arc<Pattern>> {
        let id = reference.id();
        if self.patterns.contains_key(id) {
            return self.compile(id);
        }

        match self.templates.get(id) {
            Some(template) if template.profile_id.as_deref() == Some(entry.profile_id.as_str()) => {
                Ok(Arc::new(Pattern::leaf(id)))
            }
            Some(_) => Err(XapiError::structural(format!(
                "pattern '{}' refers to template '{}' from another profile",
                entry.definition.id, id
            ))),
            None => Err(XapiError::structural(format!(
                "pattern '{}' refers to unknown template or pattern '{}'",
                entry.definition.id, id
            ))),
        }
    }
}
