//! Locally visible membership, rebuilt wholesale on every refresh

use glowmesh_core::NodeId;

/// Cached set of peer identifiers as last reported by the transport.
///
/// Orphan entries are dropped on construction and only counted. The
/// remaining peers are kept sorted and deduplicated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MembershipView {
    peers: Vec<NodeId>,
    orphans: usize,
}

impl MembershipView {
    pub fn new() -> Self {
        MembershipView::default()
    }

    /// Build a view from a raw transport snapshot
    pub fn from_snapshot<I>(snapshot: I) -> Self
    where
        I: IntoIterator<Item = NodeId>,
    {
        let mut orphans = 0;
        let mut peers: Vec<NodeId> = snapshot
            .into_iter()
            .filter(|id| {
                if id.is_valid() {
                    true
                } else {
                    orphans += 1;
                    false
                }
            })
            .collect();
        peers.sort_unstable();
        peers.dedup();

        MembershipView { peers, orphans }
    }

    /// Valid peers, ascending
    pub fn peers(&self) -> &[NodeId] {
        &self.peers
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Orphan entries filtered out of the snapshot this view came from
    pub fn orphans(&self) -> usize {
        self.orphans
    }

    /// True when the snapshot had entries but every one was an orphan
    pub fn only_orphans(&self) -> bool {
        self.peers.is_empty() && self.orphans > 0
    }

    /// Smallest valid peer identifier
    pub fn lowest(&self) -> Option<NodeId> {
        self.peers.first().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u32]) -> Vec<NodeId> {
        raw.iter().copied().map(NodeId::new).collect()
    }

    #[test]
    fn test_snapshot_sorted_and_deduped() {
        let view = MembershipView::from_snapshot(ids(&[9, 2, 5, 2]));
        assert_eq!(view.peers(), ids(&[2, 5, 9]).as_slice());
        assert_eq!(view.len(), 3);
        assert_eq!(view.lowest(), Some(NodeId::new(2)));
    }

    #[test]
    fn test_orphans_filtered_and_counted() {
        let view = MembershipView::from_snapshot(ids(&[0, 4, 0]));
        assert_eq!(view.peers(), ids(&[4]).as_slice());
        assert_eq!(view.orphans(), 2);
        assert!(!view.only_orphans());
    }

    #[test]
    fn test_only_orphans() {
        let view = MembershipView::from_snapshot(ids(&[0, 0]));
        assert!(view.is_empty());
        assert!(view.only_orphans());

        let empty = MembershipView::from_snapshot(Vec::new());
        assert!(empty.is_empty());
        assert!(!empty.only_orphans());
    }
}
