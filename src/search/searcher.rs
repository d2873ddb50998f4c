//! Filtering a snapshot into a sorted package list

use std::sync::{Arc, Weak};

use tracing::debug;

use crate::catalog::{CatalogSnapshot, PackageRecord};
use crate::history::InstallOrdering;
use crate::search::criteria::SearchCriteria;

/// Inputs the last result was computed from
struct SearchKey {
    criteria_id: u64,
    modification_counter: u64,
    snapshot: Weak<CatalogSnapshot>,
}

impl SearchKey {
    fn new(criteria: &SearchCriteria, snapshot: &Arc<CatalogSnapshot>) -> Self {
        Self {
            criteria_id: criteria.instance_id(),
            modification_counter: criteria.modification_counter(),
            snapshot: Arc::downgrade(snapshot),
        }
    }

    fn is_for(&self, criteria: &SearchCriteria, snapshot: &Arc<CatalogSnapshot>) -> bool {
        self.criteria_id == criteria.instance_id()
            && self.modification_counter == criteria.modification_counter()
            && std::ptr::eq(self.snapshot.as_ptr(), Arc::as_ptr(snapshot))
    }
}

/// Filters and sorts a snapshot's packages, reusing the previous result while
/// neither the criteria nor the snapshot changed.
///
/// Keep one searcher per view so each view only recomputes for its own changes.
#[derive(Default)]
pub struct PackageSearcher {
    last: Option<(SearchKey, Arc<Vec<Arc<PackageRecord>>>)>,
}

impl PackageSearcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter_packages(
        &mut self,
        snapshot: &Arc<CatalogSnapshot>,
        criteria: &SearchCriteria,
        ordering: &dyn InstallOrdering,
    ) -> Arc<Vec<Arc<PackageRecord>>> {
        if let Some((key, results)) = &self.last {
            if key.is_for(criteria, snapshot) {
                return Arc::clone(results);
            }
        }

        let mut results: Vec<Arc<PackageRecord>> = snapshot
            .records()
            .iter()
            .filter(|record| criteria.matches(snapshot, record))
            .cloned()
            .collect();
        criteria
            .sort_method()
            .sort(&mut results, snapshot, ordering);

        debug!(
            "Search matched {} of {} packages",
            results.len(),
            snapshot.records().len()
        );

        let results = Arc::new(results);
        self.last = Some((SearchKey::new(criteria, snapshot), Arc::clone(&results)));
        results
    }
}
