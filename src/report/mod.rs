//! # Structured text reports
//!
//! A report is a tree of named [`ReportObject`]s holding [`ReportGroup`]s of [`Keyword`]s,
//! rendered in the PVL layout used by planetary imaging tools:
//!
//! ```text
//! Object = Run
//!   Id = 0f3c9a2e-…
//!   Group = Settings
//!     OutlierRejection = false
//!   End_Group
//!   Object = BundleResults
//!     RejectionLimit = 0.5
//!     Group = RmsImageLineResiduals
//!       Average = (1.5, N/A)
//!     End_Group
//!   End_Object
//! End_Object
//! ```
//!
//! Keyword values are either a scalar or a parenthesised list. Values containing spaces,
//! commas, quotes, parentheses or nothing at all are double-quoted. Missing numeric values
//! are rendered as [`NOT_AVAILABLE`].
//!
//! The same tree is `serde::Serialize`, so tools that prefer JSON can consume it with
//! `serde_json` instead of parsing the text layout.
//!
//! The report for a run is built by [`solution_report`].
pub mod solution_report;

use std::fmt;

use itertools::Itertools;
use serde::Serialize;

/// Placeholder for a value that does not exist (e.g. the mean of no samples).
pub const NOT_AVAILABLE: &str = "N/A";

const INDENT: &str = "  ";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum KeywordValue {
    Scalar(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Keyword {
    pub name: String,
    pub value: KeywordValue,
}

impl Keyword {
    pub fn scalar(name: &str, value: impl ToString) -> Self {
        Keyword {
            name: name.to_string(),
            value: KeywordValue::Scalar(value.to_string()),
        }
    }

    pub fn list<I, T>(name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        Keyword {
            name: name.to_string(),
            value: KeywordValue::List(values.into_iter().map(|v| v.to_string()).collect()),
        }
    }

    /// The value of a scalar keyword.
    pub fn as_scalar(&self) -> Option<&str> {
        match &self.value {
            KeywordValue::Scalar(v) => Some(v),
            KeywordValue::List(_) => None,
        }
    }

    /// The values of a list keyword.
    pub fn as_list(&self) -> Option<&[String]> {
        match &self.value {
            KeywordValue::Scalar(_) => None,
            KeywordValue::List(v) => Some(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportGroup {
    pub name: String,
    pub keywords: Vec<Keyword>,
}

impl ReportGroup {
    pub fn new(name: &str) -> Self {
        ReportGroup {
            name: name.to_string(),
            keywords: Vec::new(),
        }
    }

    pub fn add_keyword(&mut self, keyword: Keyword) {
        self.keywords.push(keyword);
    }

    pub fn keyword(&self, name: &str) -> Option<&Keyword> {
        self.keywords.iter().find(|k| k.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportObject {
    pub name: String,
    pub keywords: Vec<Keyword>,
    pub groups: Vec<ReportGroup>,
    pub objects: Vec<ReportObject>,
}

impl ReportObject {
    pub fn new(name: &str) -> Self {
        ReportObject {
            name: name.to_string(),
            keywords: Vec::new(),
            groups: Vec::new(),
            objects: Vec::new(),
        }
    }

    pub fn add_keyword(&mut self, keyword: Keyword) {
        self.keywords.push(keyword);
    }

    pub fn add_group(&mut self, group: ReportGroup) {
        self.groups.push(group);
    }

    pub fn add_object(&mut self, object: ReportObject) {
        self.objects.push(object);
    }

    pub fn keyword(&self, name: &str) -> Option<&Keyword> {
        self.keywords.iter().find(|k| k.name == name)
    }

    pub fn group(&self, name: &str) -> Option<&ReportGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn object(&self, name: &str) -> Option<&ReportObject> {
        self.objects.iter().find(|o| o.name == name)
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = INDENT.repeat(depth);
        writeln!(f, "{pad}Object = {}", quote(&self.name))?;
        for keyword in &self.keywords {
            write_keyword(f, keyword, depth + 1)?;
        }
        for group in &self.groups {
            writeln!(f, "{pad}{INDENT}Group = {}", quote(&group.name))?;
            for keyword in &group.keywords {
                write_keyword(f, keyword, depth + 2)?;
            }
            writeln!(f, "{pad}{INDENT}End_Group")?;
        }
        for object in &self.objects {
            object.write_indented(f, depth + 1)?;
        }
        writeln!(f, "{pad}End_Object")
    }
}

impl fmt::Display for ReportObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

fn write_keyword(f: &mut fmt::Formatter<'_>, keyword: &Keyword, depth: usize) -> fmt::Result {
    let pad = INDENT.repeat(depth);
    match &keyword.value {
        KeywordValue::Scalar(v) => writeln!(f, "{pad}{} = {}", keyword.name, quote(v)),
        KeywordValue::List(values) => {
            let joined = values.iter().map(|v| quote(v)).join(", ");
            writeln!(f, "{pad}{} = ({joined})", keyword.name)
        }
    }
}

fn quote(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ',' | '"' | '(' | ')' | '='));
    if needs_quotes {
        format!("\"{}\"", value.replace('"', "'"))
    } else {
        value.to_string()
    }
}

/// Render a float so that parsing the text gives back the same bits.
///
/// Plain notation for ordinary magnitudes, exponent notation otherwise (the special pixel
/// sentinels would print hundreds of digits).
pub fn format_f64(value: f64) -> String {
    let magnitude = value.abs();
    if value == 0.0 || (1e-4..1e15).contains(&magnitude) || !value.is_finite() {
        format!("{value}")
    } else {
        format!("{value:e}")
    }
}

/// [`format_f64`] for optional values, [`NOT_AVAILABLE`] when absent.
pub fn format_opt_f64(value: Option<f64>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), format_f64)
}

#[cfg(test)]
mod report_test {
    use super::*;

    #[test]
    fn test_render_nested_report() {
        let mut group = ReportGroup::new("Counts");
        group.add_keyword(Keyword::list("Valid", [4, 5]));
        group.add_keyword(Keyword::list("Empty", Vec::<u32>::new()));

        let mut inner = ReportObject::new("Inner");
        inner.add_keyword(Keyword::scalar("Label", "two words"));

        let mut root = ReportObject::new("Root");
        root.add_keyword(Keyword::scalar("Limit", format_f64(0.5)));
        root.add_group(group);
        root.add_object(inner);

        let expected = "\
Object = Root
  Limit = 0.5
  Group = Counts
    Valid = (4, 5)
    Empty = ()
  End_Group
  Object = Inner
    Label = \"two words\"
  End_Object
End_Object
";
        assert_eq!(root.to_string(), expected);
        assert_eq!(
            root.object("Inner").unwrap().keyword("Label").unwrap().as_scalar(),
            Some("two words")
        );
        assert_eq!(
            root.group("Counts").unwrap().keyword("Valid").unwrap().as_list(),
            Some(&["4".to_string(), "5".to_string()][..])
        );
    }

    #[test]
    fn test_format_f64_round_trips() {
        for value in [0.0, 0.5, 1.0 / 3.0, 1e-9, 123456.789, -f64::MAX, 2.5e300] {
            let text = format_f64(value);
            assert_eq!(text.parse::<f64>().unwrap().to_bits(), value.to_bits());
        }
        assert_eq!(format_f64(14.0), "14");
        assert_eq!(format_opt_f64(None), NOT_AVAILABLE);
    }

    #[test]
    fn test_json_projection() {
        let mut root = ReportObject::new("Root");
        root.add_keyword(Keyword::scalar("Id", "abc"));
        root.add_keyword(Keyword::list("Values", [1, 2]));

        let json = serde_json::to_value(&root).unwrap();
        assert_eq!(json["name"], "Root");
        assert_eq!(json["keywords"][0]["value"], "abc");
        assert_eq!(json["keywords"][1]["value"][1], "2");
    }
}
