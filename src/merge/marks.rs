//! Elevation membership exposed to result collapsing.

use super::MergeRequest;
use crate::error::OverrideError;
use crate::rules::Elevation;
use crate::types::DocId;

/// Which documents a request elevates or excludes, available before
/// collapsing picks group representatives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElevationMarks {
    elevation: Elevation,
}

impl ElevationMarks {
    pub fn new(elevation: Elevation) -> Self {
        Self { elevation }
    }

    /// Marks for the request's effective elevation; `None` when nothing applies.
    pub fn for_request(request: &MergeRequest<'_>) -> Result<Option<Self>, OverrideError> {
        Ok(request
            .effective_elevation()?
            .map(|elevation| Self::new(elevation.into_owned())))
    }

    pub fn is_elevated(&self, id: &DocId) -> bool {
        self.elevation.is_elevated(id)
    }

    pub fn is_excluded(&self, id: &DocId) -> bool {
        self.elevation.is_excluded(id)
    }

    /// Configured position of an elevated document (0 is the top).
    pub fn priority(&self, id: &DocId) -> Option<usize> {
        self.elevation.elevated_ids().iter().position(|e| e == id)
    }

    /// Whether a document survives collapsing.
    ///
    /// Group representatives always do. With `collect_elevated_docs`, elevated
    /// documents are kept next to their group's representative as well.
    pub fn keep_when_collapsing(
        &self,
        id: &DocId,
        is_representative: bool,
        collect_elevated_docs: bool,
    ) -> bool {
        is_representative || (collect_elevated_docs && self.is_elevated(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};
    use rstest::rstest;

    fn marks() -> ElevationMarks {
        ElevationMarks::new(Elevation::new(["1", "3"], ["9"]).unwrap())
    }

    #[rstest]
    #[case("1", true, false, true)]
    #[case("1", false, false, false)]
    #[case("1", false, true, true)]
    #[case("2", false, true, false)]
    #[case("2", true, true, true)]
    fn test_keep_when_collapsing(
        #[case] id: &str,
        #[case] is_representative: bool,
        #[case] collect: bool,
        #[case] expected: bool,
    ) {
        check!(marks().keep_when_collapsing(&DocId::from(id), is_representative, collect) == expected);
    }

    #[test]
    fn test_membership() {
        let marks = marks();
        check!(marks.is_elevated(&DocId::from("3")));
        check!(marks.is_excluded(&DocId::from("9")));
        check!(marks.priority(&DocId::from("3")) == Some(1));
        check!(marks.priority(&DocId::from("9")).is_none());
    }

    #[test]
    fn test_request_without_elevation_has_no_marks() {
        let_assert!(Ok(None) = ElevationMarks::for_request(&MergeRequest::new(None)));
        let request = MergeRequest::new(None).with_ids(Some(vec![DocId::from("5")]), None);
        let_assert!(Ok(Some(marks)) = ElevationMarks::for_request(&request));
        check!(marks.is_elevated(&DocId::from("5")));
    }
}
