//! Compiling export rules into matchers.
//!
//! Both rule kinds produce one [`CompiledPattern`] whose regex has the same outer
//! shape: an optional start marker line, the note body in group `_body`, any
//! metadata comment lines in group `_meta`, then an optional end marker line.
//! Field values are read from capture groups listed in the pattern's bindings.

use regex::{Captures, Regex};
use std::collections::{BTreeMap, HashSet};

use crate::error::{CompileError, CompileWarning};
use crate::markers::{DECK_PATTERN, END_PATTERN, METADATA_PATTERN, START_PATTERN, TAGS_PATTERN};
use crate::settings::{ExportFormat, ExportRule};
use crate::template::{DECK_TOKEN, FIELDS_TOKEN, TAGS_TOKEN, TOKEN};

pub(crate) const BODY_GROUP: &str = "_body";
pub(crate) const META_GROUP: &str = "_meta";
pub(crate) const DECK_GROUP: &str = "_deck";
pub(crate) const TAGS_GROUP: &str = "_tags";

/// Which rule kind a pattern was compiled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Template,
    Regex,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Group {
    Named(String),
    Index(usize),
}

/// Maps one capture group to one note field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBinding {
    pub field: String,
    group: Group,
}

impl FieldBinding {
    /// Captured text, or `None` when the group did not participate.
    pub fn capture<'t>(&self, caps: &Captures<'t>) -> Option<&'t str> {
        let m = match &self.group {
            Group::Named(name) => caps.name(name),
            Group::Index(idx) => caps.get(*idx),
        };
        m.map(|m| m.as_str())
    }
}

/// A rule compiled against the field list of its note type.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub kind: PatternKind,
    regex: Regex,
    bindings: Vec<FieldBinding>,
    warnings: Vec<CompileWarning>,
}

impl CompiledPattern {
    /// Compile an export rule for a note type with the given ordered fields.
    pub fn for_rule(rule: &ExportRule, fields: &[String]) -> Result<Self, CompileError> {
        match &rule.format {
            ExportFormat::Template { template } => Self::from_template(template, fields),
            ExportFormat::Regex { pattern, captures } => {
                Self::from_regex(pattern, captures, fields)
            }
        }
    }

    /// Compile a template such as `Q: {{Front}}\nA: {{Back}}`.
    pub fn from_template(template: &str, fields: &[String]) -> Result<Self, CompileError> {
        let template = template.trim_end();
        if template.trim().is_empty() {
            return Err(CompileError::EmptyPattern);
        }

        let mut body = String::new();
        let mut bindings = Vec::new();
        let mut warnings = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut last = 0;

        for caps in TOKEN.captures_iter(template) {
            let Some(token) = caps.get(0) else { continue };
            let name = caps[1].trim();
            body.push_str(&regex::escape(&template[last..token.start()]));
            last = token.end();

            let known = name == FIELDS_TOKEN
                || name == DECK_TOKEN
                || name == TAGS_TOKEN
                || fields.iter().any(|f| f == name);
            if !known {
                warnings.push(CompileWarning::UnknownToken(name.to_string()));
                body.push_str(&regex::escape(token.as_str()));
                continue;
            }
            if !seen.insert(name.to_string()) {
                warnings.push(CompileWarning::RepeatedToken(name.to_string()));
                body.push_str(&value_pattern(template, token.end()));
                continue;
            }

            if let Some(idx) = fields.iter().position(|f| f == name) {
                let group = format!("f{}", idx);
                body.push_str(&format!("(?P<{}>{})", group, value_pattern(template, token.end())));
                bindings.push(FieldBinding {
                    field: name.to_string(),
                    group: Group::Named(group),
                });
            } else if name == FIELDS_TOKEN {
                body.push_str(&fields_block(fields, &mut seen, &mut bindings));
            } else if name == DECK_TOKEN {
                body.push_str(&format!("(?P<{}>{})", DECK_GROUP, DECK_PATTERN));
            } else {
                body.push_str(&format!("(?P<{}>{})", TAGS_GROUP, TAGS_PATTERN));
            }
        }
        body.push_str(&regex::escape(&template[last..]));

        if bindings.is_empty() {
            return Err(CompileError::NoFields);
        }

        let regex = Regex::new(&wrap(&format!("^{}", body)))?;
        Ok(Self {
            kind: PatternKind::Template,
            regex,
            bindings,
            warnings,
        })
    }

    /// Compile a user regex. Group `n` (1-based) feeds `fields[n - 1]` unless
    /// `captures` maps the zero-based group index to another field; an empty
    /// mapping leaves the group unused.
    pub fn from_regex(
        source: &str,
        captures: &BTreeMap<usize, String>,
        fields: &[String],
    ) -> Result<Self, CompileError> {
        if source.trim().is_empty() {
            return Err(CompileError::EmptyPattern);
        }
        let groups = count_capture_groups(source)?;

        let mut warnings = Vec::new();
        for (&group, field) in captures.range(groups..) {
            warnings.push(CompileWarning::CaptureOutOfRange {
                group,
                field: field.clone(),
                available: groups,
            });
        }

        let mut bindings: Vec<FieldBinding> = Vec::new();
        for group in 0..groups {
            let field = match captures.get(&group) {
                Some(field) => field.trim().to_string(),
                None => match fields.get(group) {
                    Some(field) => field.clone(),
                    None => continue,
                },
            };
            if field.is_empty() {
                continue;
            }
            if bindings.iter().any(|b| b.field == field) {
                warnings.push(CompileWarning::DuplicateCapture { group, field });
                continue;
            }
            // `_body` is the first group of the wrapped pattern
            bindings.push(FieldBinding {
                field,
                group: Group::Index(group + 2),
            });
        }

        if bindings.is_empty() {
            return Err(CompileError::NoFields);
        }

        let regex = Regex::new(&wrap(&format!("(?:{})", source)))?;
        Ok(Self {
            kind: PatternKind::Regex,
            regex,
            bindings,
            warnings,
        })
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    pub fn bindings(&self) -> &[FieldBinding] {
        &self.bindings
    }

    pub fn warnings(&self) -> &[CompileWarning] {
        &self.warnings
    }
}

/// Number of capturing groups in `source`; non-capturing groups are not counted.
pub fn count_capture_groups(source: &str) -> Result<usize, CompileError> {
    Ok(Regex::new(source)?.captures_len() - 1)
}

fn wrap(body: &str) -> String {
    format!(
        "(?m){}(?P<{}>{})(?P<{}>{}){}",
        START_PATTERN, BODY_GROUP, body, META_GROUP, METADATA_PATTERN, END_PATTERN
    )
}

/// A value never spans lines: it runs to the end of its line, or lazily up to
/// the literal text that follows it on the same line.
fn value_pattern(template: &str, token_end: usize) -> String {
    let rest = &template[token_end..];
    if rest.is_empty() || rest.starts_with("{{") {
        r"[^\n]*".to_string()
    } else {
        r"[^\n]*?".to_string()
    }
}

/// `Name: value` lines for every field, each line after the first optional.
fn fields_block(
    fields: &[String],
    bound: &mut HashSet<String>,
    bindings: &mut Vec<FieldBinding>,
) -> String {
    let mut block = String::new();
    for (idx, field) in fields.iter().enumerate() {
        let value = if !bound.insert(field.clone()) {
            r"[^\n]*".to_string()
        } else {
            let group = format!("f{}", idx);
            bindings.push(FieldBinding {
                field: field.clone(),
                group: Group::Named(group.clone()),
            });
            format!(r"(?P<{}>[^\n]*)", group)
        };
        let line = format!(r"{}[ \t]*:[ \t]*{}", regex::escape(field), value);
        if idx == 0 {
            block.push_str(&line);
        } else {
            block.push_str(&format!(r"(?:\r?\n{})?", line));
        }
    }
    block
}
