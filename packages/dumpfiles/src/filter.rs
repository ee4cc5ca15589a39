//! Composable record filters used when registering consumers.

use std::fmt;
use std::sync::Arc;

use crate::record::Record;

type CustomPredicate = Arc<dyn Fn(&Record, bool) -> bool + Send + Sync>;

/// A single condition on a record.
#[derive(Clone)]
enum Predicate {
    Site(String),
    Model(String),
    CurrentOnly,
    Custom(CustomPredicate),
}

impl Predicate {
    fn accepts(&self, record: &Record, is_current: bool) -> bool {
        match self {
            Self::Site(site) => record.site() == site,
            Self::Model(model) => record.model() == Some(model.as_str()),
            Self::CurrentOnly => is_current,
            Self::Custom(predicate) => predicate(record, is_current),
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Site(site) => f.debug_tuple("Site").field(site).finish(),
            Self::Model(model) => f.debug_tuple("Model").field(model).finish(),
            Self::CurrentOnly => f.write_str("CurrentOnly"),
            Self::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Conjunction of conditions a record must meet to reach a consumer.
///
/// The empty filter accepts everything.
///
/// # Examples
/// ```
/// use kbdump_dumpfiles::RecordFilter;
///
/// let filter = RecordFilter::any().site("wikidatawiki").current_only();
/// assert!(!filter.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    predicates: Vec<Predicate>,
}

impl RecordFilter {
    /// Filter accepting every record.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Filter built from the classic registration arguments.
    #[must_use]
    pub fn from_options(site: Option<&str>, current_only: bool) -> Self {
        let mut filter = Self::any();
        if let Some(site) = site {
            filter = filter.site(site);
        }
        if current_only {
            filter = filter.current_only();
        }
        filter
    }

    /// Only records from the given site.
    #[must_use]
    pub fn site(mut self, site: impl Into<String>) -> Self {
        self.predicates.push(Predicate::Site(site.into()));
        self
    }

    /// Only records with the given content model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.predicates.push(Predicate::Model(model.into()));
        self
    }

    /// Only records that are the current revision of their page.
    #[must_use]
    pub fn current_only(mut self) -> Self {
        self.predicates.push(Predicate::CurrentOnly);
        self
    }

    /// Only records for which `predicate` returns true.
    #[must_use]
    pub fn matching<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Record, bool) -> bool + Send + Sync + 'static,
    {
        self.predicates.push(Predicate::Custom(Arc::new(predicate)));
        self
    }

    /// Records accepted by both filters.
    #[must_use]
    pub fn and(mut self, other: RecordFilter) -> Self {
        self.predicates.extend(other.predicates);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    #[must_use]
    pub fn accepts(&self, record: &Record, is_current: bool) -> bool {
        self.predicates
            .iter()
            .all(|predicate| predicate.accepts(record, is_current))
    }
}
