//! Named-slot prompt templates.
//!
//! Syntax: `{name}` is a slot, `{{` and `}}` are literal braces. Any other
//! brace is an error, so a template with JSON examples must double them.

use crate::error::TemplateError;

/// A piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slot(String),
}

/// A parsed prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parses template source.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::EmptySlot`] for `{}` and
    /// [`TemplateError::Unbalanced`] for a brace that is neither an escape
    /// nor part of a slot.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((pos, ch)) = chars.next() {
            match ch {
                '{' if chars.peek().is_some_and(|&(_, c)| c == '{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek().is_some_and(|&(_, c)| c == '}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        match c {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(TemplateError::Unbalanced { position: pos }),
                            _ => name.push(c),
                        }
                    }
                    if !closed {
                        return Err(TemplateError::Unbalanced { position: pos });
                    }
                    if name.is_empty() {
                        return Err(TemplateError::EmptySlot { position: pos });
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Slot(name));
                }
                '}' => return Err(TemplateError::Unbalanced { position: pos }),
                _ => literal.push(ch),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    /// Slot names referenced by the template, in order of first use.
    #[must_use]
    pub fn slots(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Slot(name) = segment
                && !names.contains(&name.as_str())
            {
                names.push(name);
            }
        }
        names
    }

    /// Checks that every slot is one of `allowed`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::UnknownSlot`] for the first slot not in `allowed`.
    pub fn check_slots(&self, allowed: &[&str]) -> Result<(), TemplateError> {
        match self.slots().into_iter().find(|s| !allowed.contains(s)) {
            Some(name) => Err(TemplateError::UnknownSlot {
                name: name.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Substitutes slot values.
    ///
    /// Values are inserted verbatim and never re-scanned. Values for slots
    /// the template does not use are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::UnknownSlot`] if a slot has no value.
    pub fn render(&self, values: &[(&str, &str)]) -> Result<String, TemplateError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(name) => {
                    let value = values
                        .iter()
                        .find(|(key, _)| *key == name.as_str())
                        .map(|(_, value)| *value)
                        .ok_or_else(|| TemplateError::UnknownSlot { name: name.clone() })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

impl std::fmt::Display for Template {
    /// Writes the template back in source form.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => {
                    f.write_str(&text.replace('{', "{{").replace('}', "}}"))?;
                }
                Segment::Slot(name) => write!(f, "{{{name}}}")?,
            }
        }
        Ok(())
    }
}

/// Parses and renders `source` in one step.
///
/// # Errors
///
/// Returns any [`TemplateError`] from parsing or rendering.
pub fn render(source: &str, values: &[(&str, &str)]) -> Result<String, TemplateError> {
    Template::parse(source)?.render(values)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use test_case::test_case;

    use super::*;

    #[test]
    fn test_render_substitutes_all_slots() {
        let source = "Schema:\n{kg_schema}\nValues:\n{kg_value_dict}\nExample:\n{cypher_example}\nQuestion: {user_query}";
        let prompt = render(
            source,
            &[
                ("user_query", "Which cells degrade fastest?"),
                ("kg_schema", "(:Cell)-[:HAS_STATE]->(:State)"),
                ("kg_value_dict", "- component.chemistry: type=str"),
                ("cypher_example", "MATCH (c:Cell) RETURN c LIMIT 5"),
            ],
        )
        .unwrap_or_else(|_| unreachable!());

        assert!(prompt.contains("Which cells degrade fastest?"));
        assert!(prompt.contains("(:Cell)-[:HAS_STATE]->(:State)"));
        assert!(prompt.contains("- component.chemistry: type=str"));
        assert!(prompt.contains("MATCH (c:Cell) RETURN c LIMIT 5"));
        for marker in ["{user_query}", "{kg_schema}", "{kg_value_dict}", "{cypher_example}"] {
            assert!(!prompt.contains(marker));
        }
    }

    #[test]
    fn test_escaped_braces() {
        let prompt = render(r#"Reply as {{"cypher": "..."}} for {q}"#, &[("q", "x")])
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(prompt, r#"Reply as {"cypher": "..."} for x"#);
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let prompt = render("{a}", &[("a", "{b} and {{c}}")]).unwrap_or_else(|_| unreachable!());
        assert_eq!(prompt, "{b} and {{c}}");
    }

    #[test]
    fn test_unknown_slot() {
        let err = render("Hello {name}", &[("other", "x")]).err();
        assert_eq!(
            err,
            Some(TemplateError::UnknownSlot {
                name: "name".to_string()
            })
        );
    }

    #[test]
    fn test_unused_values_ignored() {
        let prompt = render("static", &[("user_query", "x")]).unwrap_or_else(|_| unreachable!());
        assert_eq!(prompt, "static");
    }

    #[test_case("{}", TemplateError::EmptySlot { position: 0 } ; "empty slot")]
    #[test_case("ab{", TemplateError::Unbalanced { position: 2 } ; "unclosed")]
    #[test_case("a}b", TemplateError::Unbalanced { position: 1 } ; "stray close")]
    #[test_case("{a{b}", TemplateError::Unbalanced { position: 0 } ; "nested open")]
    fn test_parse_errors(source: &str, expected: TemplateError) {
        assert_eq!(Template::parse(source).err(), Some(expected));
    }

    #[test]
    fn test_slots_and_check() {
        let template =
            Template::parse("{user_query} {kg_triplets} {user_query}").unwrap_or_else(|_| unreachable!());
        assert_eq!(template.slots(), vec!["user_query", "kg_triplets"]);
        assert!(template.check_slots(&["user_query", "kg_triplets"]).is_ok());
        assert_eq!(
            template.check_slots(&["user_query"]).err(),
            Some(TemplateError::UnknownSlot {
                name: "kg_triplets".to_string()
            })
        );
    }

    #[test]
    fn test_display_round_trips_source() {
        let source = r#"{{"a": 1}} {slot} }}"#;
        let template = Template::parse(source).unwrap_or_else(|_| unreachable!());
        assert_eq!(template.to_string(), source);
    }

    proptest! {
        #[test]
        fn rendered_prompt_has_no_slot_markers(value in "[^{}]{0,40}") {
            let prompt = render(
                "Q: {user_query}\nS: {kg_schema}",
                &[("user_query", value.as_str()), ("kg_schema", value.as_str())],
            );
            prop_assert!(prompt.is_ok());
            let prompt = prompt.unwrap_or_default();
            for marker in ["{user_query}", "{kg_schema}"] {
                prop_assert!(!prompt.contains(marker), "marker {} left in {:?}", marker, prompt);
            }
            prop_assert!(prompt.contains(value.as_str()));
        }
    }
}
