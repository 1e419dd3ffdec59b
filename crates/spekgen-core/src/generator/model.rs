//! Feature model produced by the parser and consumed by emitters.

/// Step keyword as written in the feature file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKeyword {
    Given,
    When,
    Then,
    And,
    But,
}

impl StepKeyword {
    /// All keywords with their source spelling.
    pub const ALL: [(StepKeyword, &'static str); 5] = [
        (StepKeyword::Given, "Given"),
        (StepKeyword::When, "When"),
        (StepKeyword::Then, "Then"),
        (StepKeyword::And, "And"),
        (StepKeyword::But, "But"),
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StepKeyword::Given => "Given",
            StepKeyword::When => "When",
            StepKeyword::Then => "Then",
            StepKeyword::And => "And",
            StepKeyword::But => "But",
        }
    }
}

/// Extra data attached to a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepArgument {
    /// `| a | b |` rows following the step; the first row is the header.
    Table(Vec<Vec<String>>),
    /// Text between `"""` markers.
    DocString(String),
}

/// A single step line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub keyword: StepKeyword,
    pub text: String,
    pub argument: Option<StepArgument>,
    pub line: usize,
}

impl Step {
    /// Resolve the keyword a conjunction (`And`/`But`) stands for.
    pub fn effective_keyword(&self, previous: Option<StepKeyword>) -> StepKeyword {
        match self.keyword {
            StepKeyword::And | StepKeyword::But => previous.unwrap_or(StepKeyword::Given),
            other => other,
        }
    }
}

/// Rows under an `Examples:` header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExampleTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// A scenario or scenario outline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub title: String,
    pub tags: Vec<String>,
    pub steps: Vec<Step>,
    /// Present for scenario outlines.
    pub examples: Option<ExampleTable>,
    pub line: usize,
}

impl Scenario {
    pub fn is_outline(&self) -> bool {
        self.examples.is_some()
    }
}

/// Parsed feature file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeatureModel {
    pub title: String,
    pub description: Vec<String>,
    pub tags: Vec<String>,
    pub background: Vec<Step>,
    pub scenarios: Vec<Scenario>,
}
