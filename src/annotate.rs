//! Output annotations a caller can request per document.

use crate::types::MergedDoc;
use serde_json::{Map, Value, json};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Annotation {
    Elevated,
    Excluded,
}

impl Annotation {
    /// Field-list marker requesting this annotation.
    pub const fn marker(self) -> &'static str {
        match self {
            Self::Elevated => "[elevated]",
            Self::Excluded => "[excluded]",
        }
    }

    /// Output field name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Elevated => "elevated",
            Self::Excluded => "excluded",
        }
    }

    fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "[elevated]" => Some(Self::Elevated),
            "[excluded]" => Some(Self::Excluded),
            _ => None,
        }
    }

    fn value(self, doc: &MergedDoc) -> bool {
        match self {
            Self::Elevated => doc.elevated,
            Self::Excluded => doc.excluded,
        }
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// The annotations a request asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestedAnnotations {
    elevated: bool,
    excluded: bool,
}

impl RequestedAnnotations {
    pub fn all() -> Self {
        Self {
            elevated: true,
            excluded: true,
        }
    }

    /// Picks the annotation markers out of a field list such as
    /// `"id, score, [elevated]"`. Other entries are ignored.
    pub fn from_field_list(fields: &str) -> Self {
        let mut requested = Self::default();
        for field in fields.split(|c: char| c == ',' || c.is_whitespace()) {
            match Annotation::from_marker(field.trim()) {
                Some(Annotation::Elevated) => requested.elevated = true,
                Some(Annotation::Excluded) => requested.excluded = true,
                None => {}
            }
        }
        requested
    }

    pub fn contains(&self, annotation: Annotation) -> bool {
        match annotation {
            Annotation::Elevated => self.elevated,
            Annotation::Excluded => self.excluded,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.elevated && !self.excluded
    }

    pub fn iter(&self) -> impl Iterator<Item = Annotation> + '_ {
        [Annotation::Elevated, Annotation::Excluded]
            .into_iter()
            .filter(|annotation| self.contains(*annotation))
    }

    /// Requested annotation values for one document.
    pub fn render(&self, doc: &MergedDoc) -> Vec<(Annotation, bool)> {
        self.iter().map(|annotation| (annotation, annotation.value(doc))).collect()
    }

    /// The document as a JSON object: id, score and requested annotations.
    pub fn to_json(&self, doc: &MergedDoc) -> Value {
        let mut object = Map::new();
        object.insert("id".to_string(), json!(doc.id));
        object.insert("score".to_string(), json!(doc.score));
        for (annotation, value) in self.render(doc) {
            object.insert(annotation.name().to_string(), Value::Bool(value));
        }
        Value::Object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocId;
    use assert2::check;
    use rstest::rstest;

    fn doc(elevated: bool, excluded: bool) -> MergedDoc {
        MergedDoc {
            id: DocId::from("a"),
            score: 1.5,
            elevated,
            excluded,
        }
    }

    #[rstest]
    #[case("id, score, [elevated]", true, false)]
    #[case("id,[excluded]", false, true)]
    #[case("[elevated] [excluded]", true, true)]
    #[case("id, [elev]", false, false)]
    #[case("", false, false)]
    fn test_field_list(#[case] fields: &str, #[case] elevated: bool, #[case] excluded: bool) {
        let requested = RequestedAnnotations::from_field_list(fields);
        check!(requested.contains(Annotation::Elevated) == elevated);
        check!(requested.contains(Annotation::Excluded) == excluded);
    }

    #[test]
    fn test_render_only_requested() {
        let requested = RequestedAnnotations::from_field_list("[excluded]");
        check!(requested.render(&doc(true, true)) == [(Annotation::Excluded, true)]);
        check!(RequestedAnnotations::default().render(&doc(true, false)).is_empty());
    }

    #[test]
    fn test_json_output() {
        let value = RequestedAnnotations::all().to_json(&doc(true, false));
        check!(value == json!({"id": "a", "score": 1.5, "elevated": true, "excluded": false}));
    }
}
