use serde::Serialize;

pub const SELECT_ALL: &str = "selectall";
pub const DESELECT_ALL: &str = "deselectall";

/// State of a multi-select dropdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub enum Selection {
    /// Nothing chosen yet; the filter is not applied.
    #[default]
    Unset,
    All,
    Nothing,
    Values(Vec<String>),
}

impl Selection {
    /// Reads a widget value list. The select-all and deselect-all sentinels
    /// win over any concrete values picked alongside them.
    pub fn parse<S: AsRef<str>>(values: &[S]) -> Self {
        if values.is_empty() {
            return Selection::Unset;
        }
        if values.iter().any(|v| v.as_ref() == SELECT_ALL) {
            return Selection::All;
        }
        if values.iter().any(|v| v.as_ref() == DESELECT_ALL) {
            return Selection::Nothing;
        }
        Selection::Values(values.iter().map(|v| v.as_ref().to_string()).collect())
    }

    /// Whether a row with `value` passes this selection when used as a filter.
    pub fn admits(&self, value: Option<&str>) -> bool {
        match self {
            Selection::Unset | Selection::All => true,
            Selection::Nothing => false,
            Selection::Values(values) => value.is_some_and(|v| values.iter().any(|s| s == v)),
        }
    }

    /// Whether a row with `value` feeds the options of a dependent dropdown.
    /// Unlike [`Selection::admits`], an unset parent offers no children.
    pub fn offers(&self, value: Option<&str>) -> bool {
        match self {
            Selection::All => true,
            Selection::Unset | Selection::Nothing => false,
            Selection::Values(_) => self.admits(value),
        }
    }
}
