//! Test fixture emitter for C# and VB.NET.
//!
//! Produces the body that goes inside the namespace declaration: one
//! fixture class per feature and one test method per scenario (per example
//! row for outlines). Header, region markers and namespace are added by
//! the orchestrator.

use std::collections::HashSet;
use std::fmt::Write as _;

use crate::config::{TargetLanguage, UnitTestProvider};
use crate::error::{Error, Result};

use super::model::{FeatureModel, Scenario, Step, StepArgument, StepKeyword};
use super::{CodeEmitter, EmitContext};

const INDENT: &str = "    ";

/// Attribute names per unit test provider.
struct ProviderAttributes {
    fixture: Option<&'static str>,
    feature_setup: Option<&'static str>,
    feature_teardown: Option<&'static str>,
    test: &'static str,
    description: &'static str,
    category: &'static str,
}

impl ProviderAttributes {
    fn for_provider(provider: UnitTestProvider) -> Self {
        match provider {
            UnitTestProvider::NUnit => Self {
                fixture: Some("NUnit.Framework.TestFixtureAttribute()"),
                feature_setup: Some("NUnit.Framework.OneTimeSetUpAttribute()"),
                feature_teardown: Some("NUnit.Framework.OneTimeTearDownAttribute()"),
                test: "NUnit.Framework.TestAttribute()",
                description: "NUnit.Framework.DescriptionAttribute",
                category: "NUnit.Framework.CategoryAttribute",
            },
            UnitTestProvider::XUnit => Self {
                fixture: None,
                feature_setup: None,
                feature_teardown: None,
                test: "Xunit.FactAttribute()",
                description: "Xunit.TraitAttribute(\"Description\", ",
                category: "Xunit.TraitAttribute(\"Category\", ",
            },
            UnitTestProvider::MsTest => Self {
                fixture: Some("Microsoft.VisualStudio.TestTools.UnitTesting.TestClassAttribute()"),
                feature_setup: Some("Microsoft.VisualStudio.TestTools.UnitTesting.ClassInitializeAttribute()"),
                feature_teardown: Some("Microsoft.VisualStudio.TestTools.UnitTesting.ClassCleanupAttribute()"),
                test: "Microsoft.VisualStudio.TestTools.UnitTesting.TestMethodAttribute()",
                description: "Microsoft.VisualStudio.TestTools.UnitTesting.DescriptionAttribute",
                category: "Microsoft.VisualStudio.TestTools.UnitTesting.TestCategoryAttribute",
            },
        }
    }

    /// Attribute taking a single string argument.
    fn with_arg(name: &str, arg: &str) -> String {
        if name.ends_with(", ") {
            format!("{}{})", name, arg)
        } else {
            format!("{}({})", name, arg)
        }
    }
}

/// Language-specific syntax fragments.
struct Syntax {
    language: TargetLanguage,
}

impl Syntax {
    fn string(&self, value: &str) -> String {
        match self.language {
            TargetLanguage::CSharp => format!(
                "\"{}\"",
                value
                    .replace('\\', "\\\\")
                    .replace('"', "\\\"")
                    .replace('\n', "\\n")
                    .replace('\r', "\\r")
            ),
            TargetLanguage::Vb => format!(
                "\"{}\"",
                value.replace('"', "\"\"").replace("\r\n", "\n").replace('\n', "\" & vbLf & \"")
            ),
        }
    }

    fn null(&self) -> &'static str {
        match self.language {
            TargetLanguage::CSharp => "null",
            TargetLanguage::Vb => "Nothing",
        }
    }

    fn string_array(&self, values: &[String]) -> String {
        if values.is_empty() {
            return self.null().to_string();
        }
        let items = values.iter().map(|v| self.string(v)).collect::<Vec<_>>().join(", ");
        match self.language {
            TargetLanguage::CSharp => format!("new string[] {{ {} }}", items),
            TargetLanguage::Vb => format!("New String() {{ {} }}", items),
        }
    }

    fn attribute(&self, out: &mut String, depth: usize, attribute: &str) {
        let indent = INDENT.repeat(depth);
        match self.language {
            TargetLanguage::CSharp => {
                let _ = writeln!(out, "{}[{}]", indent, attribute);
            }
            TargetLanguage::Vb => {
                let _ = writeln!(out, "{}<{}>  _", indent, attribute);
            }
        }
    }

    fn statement(&self, out: &mut String, depth: usize, statement: &str) {
        let indent = INDENT.repeat(depth);
        match self.language {
            TargetLanguage::CSharp => {
                let _ = writeln!(out, "{}{};", indent, statement);
            }
            TargetLanguage::Vb => {
                let _ = writeln!(out, "{}{}", indent, statement);
            }
        }
    }

    fn new_object(&self, type_name: &str, args: &[String]) -> String {
        let keyword = match self.language {
            TargetLanguage::CSharp => "new",
            TargetLanguage::Vb => "New",
        };
        format!("{} {}({})", keyword, type_name, args.join(", "))
    }

    fn declare(&self, name: &str, type_name: &str, value: &str) -> String {
        match self.language {
            TargetLanguage::CSharp => format!("{} {} = {}", type_name, name, value),
            TargetLanguage::Vb => format!("Dim {} As {} = {}", name, type_name, value),
        }
    }

    fn class_start(&self, out: &mut String, name: &str) {
        match self.language {
            TargetLanguage::CSharp => {
                let _ = writeln!(out, "{}public partial class {}\n{}{{", INDENT, name, INDENT);
            }
            TargetLanguage::Vb => {
                let _ = writeln!(out, "{}Partial Public Class {}", INDENT, name);
            }
        }
    }

    fn class_end(&self, out: &mut String) {
        match self.language {
            TargetLanguage::CSharp => {
                let _ = writeln!(out, "{}}}", INDENT);
            }
            TargetLanguage::Vb => {
                let _ = writeln!(out, "{}End Class", INDENT);
            }
        }
    }

    fn field(&self, out: &mut String, name: &str, type_name: &str) {
        let indent = INDENT.repeat(2);
        match self.language {
            TargetLanguage::CSharp => {
                let _ = writeln!(out, "{}private static {} {};", indent, type_name, name);
            }
            TargetLanguage::Vb => {
                let _ = writeln!(out, "{}Private Shared {} As {}", indent, name, type_name);
            }
        }
    }

    fn method_start(&self, out: &mut String, name: &str, is_static: bool) {
        let indent = INDENT.repeat(2);
        match (self.language, is_static) {
            (TargetLanguage::CSharp, true) => {
                let _ = writeln!(out, "{}public static void {}()\n{}{{", indent, name, indent);
            }
            (TargetLanguage::CSharp, false) => {
                let _ = writeln!(out, "{}public virtual void {}()\n{}{{", indent, name, indent);
            }
            (TargetLanguage::Vb, true) => {
                let _ = writeln!(out, "{}Public Shared Sub {}()", indent, name);
            }
            (TargetLanguage::Vb, false) => {
                let _ = writeln!(out, "{}Public Overridable Sub {}()", indent, name);
            }
        }
    }

    fn constructor_start(&self, out: &mut String, class_name: &str) {
        let indent = INDENT.repeat(2);
        match self.language {
            TargetLanguage::CSharp => {
                let _ = writeln!(out, "{}public {}()\n{}{{", indent, class_name, indent);
            }
            TargetLanguage::Vb => {
                let _ = writeln!(out, "{}Public Sub New()", indent);
            }
        }
    }

    fn method_end(&self, out: &mut String) {
        let indent = INDENT.repeat(2);
        match self.language {
            TargetLanguage::CSharp => {
                let _ = writeln!(out, "{}}}\n", indent);
            }
            TargetLanguage::Vb => {
                let _ = writeln!(out, "{}End Sub\n", indent);
            }
        }
    }

    fn language_token(&self) -> &'static str {
        match self.language {
            TargetLanguage::CSharp => "Spekgen.ProgrammingLanguage.CSharp",
            TargetLanguage::Vb => "Spekgen.ProgrammingLanguage.VB",
        }
    }
}

/// Turn a title into a PascalCase identifier.
pub fn to_identifier(title: &str) -> String {
    let mut ident = String::new();
    for word in title.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            ident.extend(first.to_uppercase());
            ident.push_str(chars.as_str());
        }
    }
    if ident.is_empty() {
        ident.push_str("Unnamed");
    }
    if ident.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    ident
}

/// Built-in emitter for .NET unit test frameworks.
#[derive(Debug, Default, Clone, Copy)]
pub struct DotNetEmitter;

impl DotNetEmitter {
    pub fn new() -> Self {
        Self
    }

    fn emit_step(
        &self,
        syntax: &Syntax,
        out: &mut String,
        step: &Step,
        previous: Option<StepKeyword>,
        substitutions: &[(String, String)],
    ) -> StepKeyword {
        let keyword = step.effective_keyword(previous);
        let text = substitute(&step.text, substitutions);

        let (doc_string, table) = match &step.argument {
            Some(StepArgument::DocString(doc)) => {
                (syntax.string(&substitute(doc, substitutions)), syntax.null().to_string())
            }
            Some(StepArgument::Table(rows)) => {
                let header = syntax.string_array(&rows[0]);
                let table_var = format!("table{}", step.line);
                syntax.statement(
                    out,
                    3,
                    &syntax.declare(&table_var, "Spekgen.Table", &syntax.new_object("Spekgen.Table", &[header])),
                );
                for row in &rows[1..] {
                    let cells: Vec<String> =
                        row.iter().map(|c| substitute(c, substitutions)).collect();
                    syntax.statement(out, 3, &format!("{}.AddRow({})", table_var, syntax.string_array(&cells)));
                }
                (syntax.null().to_string(), table_var)
            }
            None => (syntax.null().to_string(), syntax.null().to_string()),
        };

        syntax.statement(
            out,
            3,
            &format!(
                "testRunner.{}({}, {}, {}, {})",
                keyword.as_str(),
                syntax.string(&text),
                doc_string,
                table,
                syntax.string(&format!("{} ", step.keyword.as_str()))
            ),
        );
        keyword
    }

    fn emit_scenario(
        &self,
        syntax: &Syntax,
        attrs: &ProviderAttributes,
        out: &mut String,
        feature: &FeatureModel,
        scenario: &Scenario,
        method_name: &str,
        substitutions: &[(String, String)],
    ) {
        let title = substitute(&scenario.title, substitutions);
        syntax.attribute(out, 2, attrs.test);
        syntax.attribute(out, 2, &ProviderAttributes::with_arg(attrs.description, &syntax.string(&title)));
        for tag in &scenario.tags {
            syntax.attribute(out, 2, &ProviderAttributes::with_arg(attrs.category, &syntax.string(tag)));
        }
        syntax.method_start(out, method_name, false);

        let info = syntax.new_object(
            "Spekgen.ScenarioInfo",
            &[syntax.string(&title), syntax.string_array(&scenario.tags)],
        );
        syntax.statement(out, 3, &syntax.declare("scenarioInfo", "Spekgen.ScenarioInfo", &info));
        syntax.statement(out, 3, "testRunner.OnScenarioStart(scenarioInfo)");
        if !feature.background.is_empty() {
            syntax.statement(out, 3, "FeatureBackground()");
        }

        let mut previous = None;
        for step in &scenario.steps {
            previous = Some(self.emit_step(syntax, out, step, previous, substitutions));
        }

        syntax.statement(out, 3, "testRunner.CollectScenarioErrors()");
        syntax.statement(out, 3, "testRunner.OnScenarioEnd()");
        syntax.method_end(out);
    }
}

/// Replace `<name>` placeholders with example values.
fn substitute(text: &str, substitutions: &[(String, String)]) -> String {
    substitutions
        .iter()
        .fold(text.to_string(), |acc, (name, value)| acc.replace(&format!("<{}>", name), value))
}

fn unique_name(used: &mut HashSet<String>, base: String) -> String {
    if used.insert(base.clone()) {
        return base;
    }
    let mut n = 1;
    loop {
        let candidate = format!("{}_{}", base, n);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

impl CodeEmitter for DotNetEmitter {
    fn emit(&self, feature: &FeatureModel, context: &EmitContext) -> Result<String> {
        if feature.title.trim().is_empty() {
            return Err(Error::Emit("feature has no title".to_string()));
        }

        let syntax = Syntax {
            language: context.platform.language,
        };
        let attrs = ProviderAttributes::for_provider(context.platform.unit_test_provider);
        let class_name = format!("{}Feature", to_identifier(&feature.title));
        let mut out = String::new();

        if let Some(fixture) = attrs.fixture {
            syntax.attribute(&mut out, 1, fixture);
        }
        syntax.attribute(
            &mut out,
            1,
            &ProviderAttributes::with_arg(attrs.description, &syntax.string(&feature.title)),
        );
        for tag in &feature.tags {
            syntax.attribute(&mut out, 1, &ProviderAttributes::with_arg(attrs.category, &syntax.string(tag)));
        }
        syntax.class_start(&mut out, &class_name);
        syntax.field(&mut out, "testRunner", "Spekgen.ITestRunner");
        out.push('\n');

        // Without fixture-level hooks the runner is started from the constructor.
        if attrs.feature_setup.is_none() {
            syntax.constructor_start(&mut out, &class_name);
            syntax.statement(&mut out, 3, "FeatureSetup()");
            syntax.method_end(&mut out);
        }

        if let Some(setup) = attrs.feature_setup {
            syntax.attribute(&mut out, 2, setup);
        }
        syntax.method_start(&mut out, "FeatureSetup", true);
        syntax.statement(&mut out, 3, "testRunner = Spekgen.TestRunnerManager.GetTestRunner()");
        let description = feature.description.join("\n");
        let feature_info = syntax.new_object(
            "Spekgen.FeatureInfo",
            &[
                syntax.new_object("System.Globalization.CultureInfo", &[syntax.string("en-US")]),
                syntax.string(&context.folder_path),
                syntax.string(&feature.title),
                syntax.string(&description),
                syntax.language_token().to_string(),
                syntax.string_array(&feature.tags),
            ],
        );
        syntax.statement(&mut out, 3, &syntax.declare("featureInfo", "Spekgen.FeatureInfo", &feature_info));
        syntax.statement(&mut out, 3, "testRunner.OnFeatureStart(featureInfo)");
        syntax.method_end(&mut out);

        if let Some(teardown) = attrs.feature_teardown {
            syntax.attribute(&mut out, 2, teardown);
        }
        syntax.method_start(&mut out, "FeatureTearDown", true);
        syntax.statement(&mut out, 3, "testRunner.OnFeatureEnd()");
        syntax.statement(&mut out, 3, &format!("testRunner = {}", syntax.null()));
        syntax.method_end(&mut out);

        if !feature.background.is_empty() {
            syntax.method_start(&mut out, "FeatureBackground", false);
            let mut previous = None;
            for step in &feature.background {
                previous = Some(self.emit_step(&syntax, &mut out, step, previous, &[]));
            }
            syntax.method_end(&mut out);
        }

        let mut used = HashSet::new();
        for reserved in ["FeatureSetup", "FeatureTearDown", "FeatureBackground"] {
            used.insert(reserved.to_string());
        }

        for scenario in &feature.scenarios {
            let base = to_identifier(&scenario.title);
            match &scenario.examples {
                None => {
                    let name = unique_name(&mut used, base);
                    self.emit_scenario(&syntax, &attrs, &mut out, feature, scenario, &name, &[]);
                }
                Some(examples) => {
                    for (i, row) in examples.rows.iter().enumerate() {
                        let substitutions: Vec<(String, String)> =
                            examples.header.iter().cloned().zip(row.iter().cloned()).collect();
                        let name = unique_name(&mut used, format!("{}_Variant{}", base, i));
                        self.emit_scenario(&syntax, &attrs, &mut out, feature, scenario, &name, &substitutions);
                    }
                }
            }
        }

        syntax.class_end(&mut out);
        Ok(out)
    }
}
