use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::lineage::{
    LineageDispatcher, LineageFragment, QueryState, QueryType, RegistryItem, SharedFragment,
};
use crate::timing::{Debouncer, HOVER_EXIT_DEBOUNCE};

use super::merge::{NodeGraphData, dangling_links, merge_fragments};

/// One issued lineage request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpansionEntry {
    pub id: String,
    pub query: QueryType,
    /// Hidden entries are still fetched but left out of the cumulative graph.
    pub visible: bool,
}

/// Which half of a double-click expansion is shown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExpansionDirection {
    #[default]
    Both,
    UpstreamOnly,
    DownstreamOnly,
}

impl ExpansionDirection {
    pub fn label(self) -> &'static str {
        match self {
            Self::Both => "Both",
            Self::UpstreamOnly => "Upstream",
            Self::DownstreamOnly => "Downstream",
        }
    }

    fn shows(self, query: QueryType) -> bool {
        match (self, query) {
            (Self::UpstreamOnly, QueryType::ExploreDownstream) => false,
            (Self::DownstreamOnly, QueryType::ExploreUpstream) => false,
            _ => true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GraphStatus {
    pub loading: bool,
    pub error: bool,
    pub error_message: Option<String>,
    pub settled: usize,
    pub issued: usize,
}

/// Outcome of rebuilding the cumulative graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MergeEvent {
    /// A node or link was added or removed.
    pub changed: bool,
    /// Some node or link differs from the previous graph, structurally or in its fields.
    pub updated: bool,
}

struct IssuedExpansion {
    entry: ExpansionEntry,
    fragment: SharedFragment,
    settled: bool,
}

/// Owns the logical lineage graph for one root and the selection state around it.
pub struct GraphAccumulator {
    dispatcher: LineageDispatcher,
    root_id: Option<String>,
    issued: Vec<IssuedExpansion>,
    graph: NodeGraphData,
    graph_revision: u64,
    content_revision: u64,
    needs_merge: bool,
    direction: ExpansionDirection,
    hovered: Option<String>,
    hover_exit: Debouncer,
    focused: Option<String>,
    status: GraphStatus,
}

impl GraphAccumulator {
    pub fn new(dispatcher: LineageDispatcher) -> Self {
        Self {
            dispatcher,
            root_id: None,
            issued: Vec::new(),
            graph: NodeGraphData::default(),
            graph_revision: 0,
            content_revision: 0,
            needs_merge: false,
            direction: ExpansionDirection::Both,
            hovered: None,
            hover_exit: Debouncer::new(HOVER_EXIT_DEBOUNCE),
            focused: None,
            status: GraphStatus::default(),
        }
    }

    pub fn root_id(&self) -> Option<&str> {
        self.root_id.as_deref()
    }

    pub fn graph(&self) -> &NodeGraphData {
        &self.graph
    }

    pub fn graph_revision(&self) -> u64 {
        self.graph_revision
    }

    /// Bumped on every graph change, including field-only updates to known nodes.
    pub fn content_revision(&self) -> u64 {
        self.content_revision
    }

    /// Item detail requests that have settled, successfully or not.
    pub fn settled_details(&self) -> usize {
        self.dispatcher.settled_items()
    }

    pub fn status(&self) -> &GraphStatus {
        &self.status
    }

    pub fn expansions(&self) -> impl Iterator<Item = &ExpansionEntry> {
        self.issued.iter().map(|issued| &issued.entry)
    }

    /// Distinct lineage queries fetched this session, across roots.
    pub fn cached_queries(&self) -> usize {
        self.dispatcher.cached_queries()
    }

    pub fn expansion_count(&self) -> usize {
        self.issued.len()
    }

    pub fn direction(&self) -> ExpansionDirection {
        self.direction
    }

    pub fn set_direction(&mut self, direction: ExpansionDirection) {
        self.direction = direction;
    }

    /// Switches to a new root. Returns true when the graph was reset.
    pub fn set_root(&mut self, root_id: Option<&str>) -> bool {
        let root_id = root_id.map(str::trim).filter(|id| !id.is_empty());
        if self.root_id.as_deref() == root_id {
            return false;
        }

        info!(root = ?root_id, "switching lineage root");
        self.root_id = root_id.map(str::to_owned);
        self.reset();
        true
    }

    /// Drops every expansion and re-seeds the current root.
    pub fn restart(&mut self) {
        info!(root = ?self.root_id, "restarting lineage exploration");
        self.reset();
    }

    fn reset(&mut self) {
        self.issued.clear();
        self.graph = NodeGraphData::default();
        self.graph_revision = self.graph_revision.wrapping_add(1);
        self.content_revision = self.content_revision.wrapping_add(1);
        self.hovered = None;
        self.hover_exit.cancel();
        self.focused = None;
        self.status = GraphStatus::default();
        self.needs_merge = false;

        if let Some(root) = self.root_id.clone() {
            self.add_node_query(
                &root,
                &[QueryType::ExploreUpstream, QueryType::ExploreDownstream],
            );
        }
    }

    /// Appends expansions for `id`. Existing entries are never removed.
    pub fn add_node_query(&mut self, id: &str, queries: &[QueryType]) {
        for &query in queries {
            self.issue(id, query, true);
        }
    }

    /// Double-click expansion: both directions are always fetched, the current
    /// direction setting decides which of the two is shown.
    pub fn expand_node(&mut self, id: &str) {
        for query in [QueryType::ExploreDownstream, QueryType::ExploreUpstream] {
            let visible = self.direction.shows(query);
            self.issue(id, query, visible);
        }
    }

    fn issue(&mut self, id: &str, query: QueryType, visible: bool) {
        if id.is_empty() {
            return;
        }

        debug!(id, query = query.key(), visible, "issuing expansion");
        let fragment = self.dispatcher.resolve(id, query);
        self.issued.push(IssuedExpansion {
            entry: ExpansionEntry {
                id: id.to_owned(),
                query,
                visible,
            },
            fragment,
            settled: false,
        });
        self.needs_merge = true;
    }

    /// Shows or hides an issued expansion. Hiding retracts its fragment from the graph.
    pub fn set_expansion_visible(&mut self, index: usize, visible: bool) {
        if let Some(issued) = self.issued.get_mut(index)
            && issued.entry.visible != visible
        {
            issued.entry.visible = visible;
            self.needs_merge = true;
        }
    }

    /// Folds newly settled fragments into the cumulative graph.
    ///
    /// Returns `None` when nothing settled since the last call.
    pub fn refresh(&mut self) -> Option<MergeEvent> {
        let mut newly_settled = false;
        let mut status = GraphStatus {
            issued: self.issued.len(),
            ..GraphStatus::default()
        };

        for issued in &mut self.issued {
            match QueryState::of(&issued.fragment) {
                QueryState::Pending => status.loading = true,
                QueryState::Ready(_) => status.settled += 1,
                QueryState::Failed(error) => {
                    status.settled += 1;
                    status.error = true;
                    if status.error_message.is_none() {
                        status.error_message = Some(error.to_string());
                    }
                }
            }
            if !issued.settled && issued.fragment.peek().is_some() {
                issued.settled = true;
                newly_settled = true;
            }
        }
        self.status = status;

        if !newly_settled && !self.needs_merge {
            return None;
        }
        self.needs_merge = false;

        let resolved = self
            .issued
            .iter()
            .filter(|issued| issued.entry.visible)
            .filter_map(|issued| match issued.fragment.peek() {
                Some(Ok(fragment)) => Some(Arc::clone(fragment)),
                _ => None,
            })
            .collect::<Vec<Arc<LineageFragment>>>();

        let next = merge_fragments(resolved.iter().map(Arc::as_ref));
        let changed = !next.same_structure(&self.graph);
        let updated = changed || next != self.graph;
        if updated {
            self.content_revision = self.content_revision.wrapping_add(1);
        }
        if changed {
            self.graph_revision = self.graph_revision.wrapping_add(1);
            debug!(
                nodes = next.nodes.len(),
                links = next.links.len(),
                fragments = resolved.len(),
                "cumulative graph changed"
            );
            let dangling = dangling_links(&next);
            if !dangling.is_empty() {
                warn!(
                    count = dangling.len(),
                    first = ?dangling[0],
                    "lineage fragments returned links to unknown nodes"
                );
            }
        }
        self.graph = next;
        Some(MergeEvent { changed, updated })
    }

    pub fn on_hover_enter(&mut self, id: &str) {
        self.hover_exit.cancel();
        if self.hovered.as_deref() != Some(id) {
            self.hovered = Some(id.to_owned());
            self.load_details(id);
        }
    }

    pub fn on_hover_exit(&mut self, now: Instant) {
        if self.hovered.is_some() && !self.hover_exit.is_pending() {
            self.hover_exit.trigger(now);
        }
    }

    /// Applies due timers. Returns true when hover state changed.
    pub fn poll_timers(&mut self, now: Instant) -> bool {
        if self.hover_exit.poll(now) {
            self.hovered = None;
            return true;
        }
        false
    }

    pub fn hover_exit_pending(&self) -> bool {
        self.hover_exit.is_pending()
    }

    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    pub fn select_focus_node(&mut self, id: &str) {
        if id.is_empty() {
            return;
        }
        self.focused = Some(id.to_owned());
        self.load_details(id);
    }

    pub fn deselect_focus_node(&mut self) {
        self.focused = None;
    }

    pub fn focused(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    pub fn load_details(&mut self, id: &str) {
        let subtype = self.graph.node(id).map(|node| node.item_subtype);
        let _ = self.dispatcher.resolve_item(id, subtype);
    }

    pub fn details(&self, id: &str) -> Option<QueryState<Arc<RegistryItem>>> {
        self.dispatcher.item_state(id)
    }

    #[cfg(test)]
    pub(crate) async fn settle_details(&self) {
        for item in self.dispatcher.pending_items() {
            let _ = item.await;
        }
    }

    #[cfg(test)]
    pub(crate) fn unsettled(&self) -> Vec<SharedFragment> {
        self.issued
            .iter()
            .filter(|issued| issued.fragment.peek().is_none())
            .map(|issued| issued.fragment.clone())
            .collect()
    }
}
