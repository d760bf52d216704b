//! Selectors accepted by [`crate::arrange::ArrangeOptions`]

use std::convert::Infallible;
use std::str::FromStr;

/// `All`, or an explicit list of names
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    All,
    Only(Vec<String>),
}

impl Selection {
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Selection::Only(names.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, name: &str) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(names) => names.iter().any(|n| n == name),
        }
    }

    pub fn names(&self) -> Option<&[String]> {
        match self {
            Selection::All => None,
            Selection::Only(names) => Some(names),
        }
    }
}

/// Parses `all` or a comma separated list
impl FromStr for Selection {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim() == "all" {
            return Ok(Selection::All);
        }
        Ok(Selection::only(split_names(s)))
    }
}

/// Which parameters to attach to an arranged table
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ParameterSelection {
    #[default]
    All,
    /// Parameters that differ between runs
    Varied,
    /// Parameters shared by every run
    Fixed,
    Only(Vec<String>),
}

impl ParameterSelection {
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ParameterSelection::Only(names.into_iter().map(Into::into).collect())
    }

    pub fn includes_varied(&self) -> bool {
        !matches!(self, ParameterSelection::Fixed)
    }

    pub fn includes_fixed(&self) -> bool {
        !matches!(self, ParameterSelection::Varied)
    }

    pub fn names(&self) -> Option<&[String]> {
        match self {
            ParameterSelection::Only(names) => Some(names),
            _ => None,
        }
    }
}

/// Parses `all`, `varied`, `fixed` (or `static`), or a comma separated list
impl FromStr for ParameterSelection {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "all" => ParameterSelection::All,
            "varied" => ParameterSelection::Varied,
            "fixed" | "static" => ParameterSelection::Fixed,
            other => ParameterSelection::only(split_names(other)),
        })
    }
}

/// How a multi-run parameter table is matched to rows by `run_id`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunAlignment {
    /// Rows whose run is missing from the parameter table get nulls
    Exact,
    /// Rows whose run is missing take the nearest preceding run's values
    #[default]
    ForwardFill,
}

fn split_names(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect()
}
