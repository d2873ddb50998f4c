//! User-editable search criteria

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{CatalogSnapshot, PackageRecord};
use crate::search::filter::{FilterGroup, FilterKind};
use crate::search::sort::SortMethod;

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

fn next_instance_id() -> u64 {
    NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Boolean restrictions of a search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Toggle {
    OnlyInstalled,
    OnlyDirect,
    OnlyIndirect,
    UpgradeAvailable,
    ShowUnsupported,
    ContainsExamples,
}

impl Toggle {
    /// Name shown for the toggle when it is active, `None` if it is not a restriction
    fn tag_name(&self) -> Option<&'static str> {
        match self {
            Toggle::OnlyInstalled => Some("Installed"),
            Toggle::OnlyDirect => Some("Direct"),
            Toggle::OnlyIndirect => Some("Indirect"),
            Toggle::UpgradeAvailable => Some("Upgrade"),
            Toggle::ContainsExamples => Some("Examples"),
            Toggle::ShowUnsupported => None,
        }
    }
}

const TAG_TOGGLES: [Toggle; 5] = [
    Toggle::OnlyInstalled,
    Toggle::OnlyDirect,
    Toggle::OnlyIndirect,
    Toggle::UpgradeAvailable,
    Toggle::ContainsExamples,
];

/// What removing an [`ActiveTag`] undoes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagAction {
    SortMethod,
    SearchTerm(String),
    Toggle(Toggle),
    Keyword { kind: FilterKind, id: String },
}

/// One removable restriction currently applied to a search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTag {
    pub name: String,
    pub action: TagAction,
}

/// Search terms, toggles, sort method and keyword filters.
///
/// Every change bumps [`modification_counter`](Self::modification_counter),
/// which downstream caches compare against to know when to recompute.
#[derive(Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchCriteria {
    #[serde(skip, default = "next_instance_id")]
    instance_id: u64,
    #[serde(skip)]
    modification_counter: u64,

    search_terms: Vec<String>,
    only_installed: bool,
    only_direct: bool,
    only_indirect: bool,
    upgrade_available: bool,
    show_unsupported: bool,
    contains_examples: bool,
    sort_method: SortMethod,
    is_sort_method_a_tag: bool,

    tags: FilterGroup,
    author: FilterGroup,
    category: FilterGroup,
    source: FilterGroup,

    #[serde(skip)]
    filters_updated_for: Weak<CatalogSnapshot>,
    #[serde(skip)]
    active_tags: Option<(u64, Vec<ActiveTag>)>,
}

impl Default for SearchCriteria {
    fn default() -> Self {
        Self {
            instance_id: next_instance_id(),
            modification_counter: 0,
            search_terms: Vec::new(),
            only_installed: false,
            only_direct: false,
            only_indirect: false,
            upgrade_available: false,
            show_unsupported: false,
            contains_examples: false,
            sort_method: SortMethod::default(),
            is_sort_method_a_tag: false,
            tags: FilterGroup::new(FilterKind::Tags),
            author: FilterGroup::new(FilterKind::Author),
            category: FilterGroup::new(FilterKind::Category),
            source: FilterGroup::source(),
            filters_updated_for: Weak::new(),
            active_tags: None,
        }
    }
}

impl SearchCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifies this instance for the lifetime of the process
    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }

    /// Own changes plus the changes of every filter group
    pub fn modification_counter(&self) -> u64 {
        self.modification_counter
            + self
                .filters()
                .iter()
                .map(|group| group.modification_counter())
                .sum::<u64>()
    }

    // ---------------------------------------------------------------------
    // Search terms
    // ---------------------------------------------------------------------

    pub fn search_terms(&self) -> &[String] {
        &self.search_terms
    }

    pub fn add_search_term(&mut self, term: &str) {
        let term = term.to_lowercase();
        if !self.search_terms.contains(&term) {
            self.search_terms.push(term);
            self.modification_counter += 1;
        }
    }

    pub fn remove_search_term(&mut self, term: &str) {
        let term = term.to_lowercase();
        let before = self.search_terms.len();
        self.search_terms.retain(|t| *t != term);
        if self.search_terms.len() != before {
            self.modification_counter += 1;
        }
    }

    pub fn clear_search_terms(&mut self) {
        if !self.search_terms.is_empty() {
            self.search_terms.clear();
            self.modification_counter += 1;
        }
    }

    // ---------------------------------------------------------------------
    // Toggles and sorting
    // ---------------------------------------------------------------------

    pub fn toggle(&self, toggle: Toggle) -> bool {
        match toggle {
            Toggle::OnlyInstalled => self.only_installed,
            Toggle::OnlyDirect => self.only_direct,
            Toggle::OnlyIndirect => self.only_indirect,
            Toggle::UpgradeAvailable => self.upgrade_available,
            Toggle::ShowUnsupported => self.show_unsupported,
            Toggle::ContainsExamples => self.contains_examples,
        }
    }

    pub fn set_toggle(&mut self, toggle: Toggle, value: bool) {
        let field = match toggle {
            Toggle::OnlyInstalled => &mut self.only_installed,
            Toggle::OnlyDirect => &mut self.only_direct,
            Toggle::OnlyIndirect => &mut self.only_indirect,
            Toggle::UpgradeAvailable => &mut self.upgrade_available,
            Toggle::ShowUnsupported => &mut self.show_unsupported,
            Toggle::ContainsExamples => &mut self.contains_examples,
        };
        if *field != value {
            *field = value;
            self.modification_counter += 1;
        }
    }

    pub fn sort_method(&self) -> SortMethod {
        self.sort_method
    }

    pub fn set_sort_method(&mut self, sort_method: SortMethod) {
        if self.sort_method != sort_method {
            self.sort_method = sort_method;
            self.modification_counter += 1;
        }
    }

    /// Whether the sort method is listed as a removable tag
    pub fn is_sort_method_a_tag(&self) -> bool {
        self.is_sort_method_a_tag
    }

    pub fn set_sort_method_a_tag(&mut self, value: bool) {
        if self.is_sort_method_a_tag != value {
            self.is_sort_method_a_tag = value;
            self.modification_counter += 1;
        }
    }

    // ---------------------------------------------------------------------
    // Filter groups
    // ---------------------------------------------------------------------

    pub fn filter(&self, kind: FilterKind) -> &FilterGroup {
        match kind {
            FilterKind::Tags => &self.tags,
            FilterKind::Author => &self.author,
            FilterKind::Category => &self.category,
            FilterKind::Source => &self.source,
        }
    }

    pub fn filter_mut(&mut self, kind: FilterKind) -> &mut FilterGroup {
        match kind {
            FilterKind::Tags => &mut self.tags,
            FilterKind::Author => &mut self.author,
            FilterKind::Category => &mut self.category,
            FilterKind::Source => &mut self.source,
        }
    }

    pub fn filters(&self) -> [&FilterGroup; 4] {
        FilterKind::ALL.map(|kind| self.filter(kind))
    }

    pub fn set_keyword_enabled(&mut self, kind: FilterKind, id: &str, enabled: bool) -> bool {
        self.filter_mut(kind).set_keyword_enabled(id, enabled)
    }

    /// Clear terms, disable every keyword and restore default toggles and sorting
    pub fn reset_to_default(&mut self) {
        self.modification_counter += 1;

        self.search_terms.clear();
        for kind in FilterKind::ALL {
            self.filter_mut(kind).disable_all();
        }

        self.sort_method = SortMethod::default();
        self.only_installed = false;
        self.only_direct = false;
        self.only_indirect = false;
        self.upgrade_available = false;
        self.show_unsupported = false;
        self.contains_examples = false;
    }

    /// Recount every filter keyword against a new snapshot.
    ///
    /// Does nothing when handed the snapshot it last counted. Each package
    /// counts once per distinct attribute value.
    pub fn update_filters_using_package_list(&mut self, snapshot: &Arc<CatalogSnapshot>) {
        if std::ptr::eq(self.filters_updated_for.as_ptr(), Arc::as_ptr(snapshot)) {
            return;
        }
        self.filters_updated_for = Arc::downgrade(snapshot);
        self.modification_counter += 1;

        for kind in FilterKind::ALL {
            self.filter_mut(kind).reset_match_counts();
        }

        for record in snapshot.records() {
            for kind in FilterKind::ALL {
                let values = kind.attribute_values(snapshot, record);
                let group = self.filter_mut(kind);
                for value in values {
                    group.increment_match_count(value);
                }
            }
        }

        for kind in FilterKind::ALL {
            self.filter_mut(kind).sort_by_match_count();
        }

        debug!(
            "Updated search filters from {} packages",
            snapshot.records().len()
        );
    }

    /// Whether a package passes every restriction, judged on its default version.
    ///
    /// A search term equal to the package's title or name accepts the package
    /// outright. Otherwise every term must appear in the title, the name or a
    /// keyword.
    pub fn matches(&self, snapshot: &CatalogSnapshot, record: &PackageRecord) -> bool {
        let Some(default) = record.default_version() else {
            return false;
        };
        let name = record.name();

        if !self.search_terms.is_empty() {
            let title_lower = default.title().to_lowercase();
            let name_lower = name.to_lowercase();
            if self
                .search_terms
                .iter()
                .any(|term| *term == title_lower || *term == name_lower)
            {
                return true;
            }

            let keywords: Vec<String> = default.keywords().iter().map(|k| k.to_lowercase()).collect();
            let all_terms_match = self.search_terms.iter().all(|term| {
                title_lower.contains(term.as_str())
                    || name_lower.contains(term.as_str())
                    || keywords.iter().any(|k| k.contains(term.as_str()))
            });
            if !all_terms_match {
                return false;
            }
        }

        if self.only_installed && !snapshot.is_installed(name) {
            return false;
        }
        if self.only_indirect && !snapshot.is_indirect(name) {
            return false;
        }
        if self.only_direct && !snapshot.is_direct(name) {
            return false;
        }
        if self.contains_examples && !default.has_samples() {
            return false;
        }
        // Installed packages are shown even when unsupported
        if !self.show_unsupported && !default.is_supported() && !snapshot.is_installed(name) {
            return false;
        }
        if self.upgrade_available && !snapshot.is_upgrade_available(name) {
            return false;
        }

        self.filters()
            .iter()
            .all(|group| group.matches(snapshot, record))
    }

    // ---------------------------------------------------------------------
    // Active tags
    // ---------------------------------------------------------------------

    /// Every restriction that can be removed with [`remove_tag`](Self::remove_tag).
    /// Rebuilt only when the criteria changed.
    pub fn active_tags(&mut self) -> &[ActiveTag] {
        let counter = self.modification_counter();
        if self
            .active_tags
            .as_ref()
            .is_none_or(|(built_at, _)| *built_at != counter)
        {
            let tags = self.collect_active_tags();
            self.active_tags = Some((counter, tags));
        }
        self.active_tags
            .as_ref()
            .map(|(_, tags)| tags.as_slice())
            .unwrap_or_default()
    }

    fn collect_active_tags(&self) -> Vec<ActiveTag> {
        let mut tags = Vec::new();

        if self.is_sort_method_a_tag {
            tags.push(ActiveTag {
                name: self.sort_method.label().to_string(),
                action: TagAction::SortMethod,
            });
        }

        tags.extend(self.search_terms.iter().map(|term| ActiveTag {
            name: term.clone(),
            action: TagAction::SearchTerm(term.clone()),
        }));

        for toggle in TAG_TOGGLES {
            if let Some(name) = toggle.tag_name().filter(|_| self.toggle(toggle)) {
                tags.push(ActiveTag {
                    name: name.to_string(),
                    action: TagAction::Toggle(toggle),
                });
            }
        }

        for group in self.filters() {
            for keyword in group.keywords().iter().filter(|k| k.enabled) {
                tags.push(ActiveTag {
                    name: keyword.display.clone(),
                    action: TagAction::Keyword {
                        kind: group.kind(),
                        id: keyword.id.clone(),
                    },
                });
            }
        }

        tags
    }

    pub fn remove_tag(&mut self, tag: &ActiveTag) {
        match &tag.action {
            TagAction::SortMethod => self.set_sort_method_a_tag(false),
            TagAction::SearchTerm(term) => self.remove_search_term(term),
            TagAction::Toggle(toggle) => self.set_toggle(*toggle, false),
            TagAction::Keyword { kind, id } => {
                self.set_keyword_enabled(*kind, id, false);
            }
        }
    }
}
