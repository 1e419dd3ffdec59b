//! Line-based parser for the subset of Gherkin Spekgen understands.
//!
//! Supported: `Feature:` with free-form description, `@tags`,
//! `Background:`, `Scenario:`, `Scenario Outline:` / `Scenario Template:`
//! with `Examples:` tables, step tables, doc strings and `#` comments.

use crate::error::{Error, Result};

use super::FeatureParser;
use super::model::{ExampleTable, FeatureModel, Scenario, Step, StepArgument, StepKeyword};

/// Where in the document the parser currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Start,
    Feature,
    Background,
    Scenario,
    Examples,
}

/// Built-in feature file parser.
#[derive(Debug, Default, Clone, Copy)]
pub struct GherkinParser;

impl GherkinParser {
    pub fn new() -> Self {
        Self
    }
}

impl FeatureParser for GherkinParser {
    fn parse(&self, source: &str) -> Result<FeatureModel> {
        let mut model = FeatureModel::default();
        let mut seen_feature = false;
        let mut section = Section::Start;
        let mut pending_tags: Vec<String> = Vec::new();
        let mut lines = source.lines().enumerate();

        while let Some((idx, raw)) = lines.next() {
            let line_no = idx + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with('@') {
                pending_tags.extend(parse_tags(line, line_no)?);
                continue;
            }

            if let Some(title) = keyword(line, "Feature") {
                if seen_feature {
                    return Err(Error::parse_at(line_no, "only one 'Feature:' is allowed per file"));
                }
                seen_feature = true;
                model.title = title.to_string();
                model.tags = std::mem::take(&mut pending_tags);
                section = Section::Feature;
                continue;
            }

            if !seen_feature {
                return Err(Error::parse_at(line_no, format!("expected 'Feature:', found '{}'", line)));
            }

            if keyword(line, "Background").is_some() {
                if !model.scenarios.is_empty() || !model.background.is_empty() {
                    return Err(Error::parse_at(
                        line_no,
                        "'Background:' must come once, before the first scenario",
                    ));
                }
                section = Section::Background;
                continue;
            }

            if let Some(title) =
                keyword(line, "Scenario Outline").or_else(|| keyword(line, "Scenario Template"))
            {
                model.scenarios.push(Scenario {
                    title: title.to_string(),
                    tags: std::mem::take(&mut pending_tags),
                    steps: Vec::new(),
                    examples: Some(ExampleTable::default()),
                    line: line_no,
                });
                section = Section::Scenario;
                continue;
            }

            if let Some(title) = keyword(line, "Scenario") {
                model.scenarios.push(Scenario {
                    title: title.to_string(),
                    tags: std::mem::take(&mut pending_tags),
                    steps: Vec::new(),
                    examples: None,
                    line: line_no,
                });
                section = Section::Scenario;
                continue;
            }

            if keyword(line, "Examples").is_some() || keyword(line, "Scenarios").is_some() {
                let is_outline = model.scenarios.last().is_some_and(Scenario::is_outline);
                if !is_outline || !matches!(section, Section::Scenario | Section::Examples) {
                    return Err(Error::parse_at(line_no, "'Examples:' is only allowed in a scenario outline"));
                }
                // Tags on an examples block are accepted and dropped.
                pending_tags.clear();
                section = Section::Examples;
                continue;
            }

            if line.starts_with('|') {
                let cells = parse_row(line, line_no)?;
                match section {
                    Section::Examples => {
                        let examples = model
                            .scenarios
                            .last_mut()
                            .and_then(|s| s.examples.as_mut())
                            .ok_or_else(|| Error::parse_at(line_no, "table row outside of examples"))?;
                        push_example_row(examples, cells, line_no)?;
                    }
                    Section::Background | Section::Scenario => {
                        let step = last_step_mut(&mut model, section)
                            .ok_or_else(|| Error::parse_at(line_no, "table row without a step"))?;
                        match step.argument {
                            None => step.argument = Some(StepArgument::Table(vec![cells])),
                            Some(StepArgument::Table(ref mut rows)) => {
                                if rows[0].len() != cells.len() {
                                    return Err(Error::parse_at(
                                        line_no,
                                        format!("expected {} cells, found {}", rows[0].len(), cells.len()),
                                    ));
                                }
                                rows.push(cells);
                            }
                            Some(StepArgument::DocString(_)) => {
                                return Err(Error::parse_at(line_no, "a step cannot have both a doc string and a table"));
                            }
                        }
                    }
                    _ => return Err(Error::parse_at(line_no, "unexpected table row")),
                }
                continue;
            }

            if line.starts_with("\"\"\"") {
                let indent = indent_width(raw, usize::MAX);
                let mut content: Vec<&str> = Vec::new();
                let mut closed = false;
                for (_, doc_raw) in lines.by_ref() {
                    if doc_raw.trim_start().starts_with("\"\"\"") {
                        closed = true;
                        break;
                    }
                    content.push(strip_indent(doc_raw, indent));
                }
                if !closed {
                    return Err(Error::parse_at(line_no, "unterminated doc string"));
                }

                let step = last_step_mut(&mut model, section)
                    .ok_or_else(|| Error::parse_at(line_no, "doc string without a step"))?;
                if step.argument.is_some() {
                    return Err(Error::parse_at(line_no, "a step can only have one argument"));
                }
                step.argument = Some(StepArgument::DocString(content.join("\n")));
                continue;
            }

            if let Some((keyword, text)) = parse_step(line) {
                let step = Step {
                    keyword,
                    text: text.to_string(),
                    argument: None,
                    line: line_no,
                };
                match section {
                    Section::Background => model.background.push(step),
                    Section::Scenario => {
                        if let Some(scenario) = model.scenarios.last_mut() {
                            scenario.steps.push(step);
                        }
                    }
                    Section::Examples => {
                        return Err(Error::parse_at(line_no, "steps are not allowed after 'Examples:'"));
                    }
                    Section::Start | Section::Feature => {
                        return Err(Error::parse_at(line_no, "step outside of a scenario or background"));
                    }
                }
                continue;
            }

            match section {
                Section::Feature => model.description.push(line.to_string()),
                _ => {
                    return Err(Error::parse_at(line_no, format!("unexpected line '{}'", line)));
                }
            }
        }

        if !seen_feature {
            return Err(Error::Parse {
                line: None,
                message: "file does not contain a 'Feature:'".to_string(),
            });
        }

        for scenario in &model.scenarios {
            if let Some(examples) = &scenario.examples
                && examples.rows.is_empty()
            {
                return Err(Error::parse_at(
                    scenario.line,
                    format!("scenario outline '{}' has no examples", scenario.title),
                ));
            }
        }

        Ok(model)
    }
}

/// Match `Keyword: rest` and return `rest`.
fn keyword<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    line.strip_prefix(keyword)?
        .trim_start()
        .strip_prefix(':')
        .map(str::trim)
}

fn parse_step(line: &str) -> Option<(StepKeyword, &str)> {
    StepKeyword::ALL.iter().find_map(|(keyword, spelling)| {
        let rest = line.strip_prefix(spelling)?;
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            Some((*keyword, rest.trim()))
        } else {
            None
        }
    })
}

fn parse_tags(line: &str, line_no: usize) -> Result<Vec<String>> {
    line.split_whitespace()
        .map(|tag| {
            tag.strip_prefix('@')
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .ok_or_else(|| Error::parse_at(line_no, format!("invalid tag '{}'", tag)))
        })
        .collect()
}

fn parse_row(line: &str, line_no: usize) -> Result<Vec<String>> {
    let inner = line
        .strip_prefix('|')
        .and_then(|l| l.strip_suffix('|'))
        .ok_or_else(|| Error::parse_at(line_no, "table row must start and end with '|'"))?;
    Ok(inner.split('|').map(|c| c.trim().to_string()).collect())
}

fn push_example_row(examples: &mut ExampleTable, cells: Vec<String>, line_no: usize) -> Result<()> {
    if examples.header.is_empty() {
        examples.header = cells;
        return Ok(());
    }
    // A repeated header starts another examples block with the same columns.
    if cells == examples.header {
        return Ok(());
    }
    if cells.len() != examples.header.len() {
        return Err(Error::parse_at(
            line_no,
            format!("expected {} cells, found {}", examples.header.len(), cells.len()),
        ));
    }
    examples.rows.push(cells);
    Ok(())
}

fn last_step_mut(model: &mut FeatureModel, section: Section) -> Option<&mut Step> {
    match section {
        Section::Background => model.background.last_mut(),
        Section::Scenario => model.scenarios.last_mut()?.steps.last_mut(),
        _ => None,
    }
}

/// Leading spaces and tabs, capped at `max`. Always a char boundary.
fn indent_width(line: &str, max: usize) -> usize {
    line.bytes().take(max).take_while(|b| *b == b' ' || *b == b'\t').count()
}

fn strip_indent(line: &str, indent: usize) -> &str {
    &line[indent_width(line, indent)..]
}
