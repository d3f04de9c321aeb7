//! Friendship and pending-request views derived from raw follow edges.
//!
//! Nothing here is stored. Every read recomputes the three sets from the
//! viewer's own `following`/`followers`, so a view can never drift from
//! the edges it came from.

use std::collections::HashSet;

use uuid::Uuid;

use porch_types::api::{DirectoryEntry, RelationshipView};
use porch_types::models::{Relationship, UserSummary};

use crate::error::SocialResult;
use crate::store::{Edges, GraphStore, UserStore, with_retry};

/// Cap on the user directory, matching what one screen can show.
pub const DIRECTORY_LIMIT: usize = 200;

/// The viewer's friends, incoming and outgoing requests as id sets.
///
/// The three sets are pairwise disjoint: each is defined by a different
/// combination of membership in `following` and `followers`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipSets {
    pub friends: HashSet<Uuid>,
    pub incoming: HashSet<Uuid>,
    pub outgoing: HashSet<Uuid>,
}

impl RelationshipSets {
    /// O(|following| + |followers|), independent of the user population.
    pub fn derive(edges: &Edges) -> Self {
        let friends: HashSet<Uuid> = edges
            .following
            .intersection(&edges.followers)
            .copied()
            .collect();
        let incoming = edges.followers.difference(&friends).copied().collect();
        let outgoing = edges.following.difference(&friends).copied().collect();
        Self {
            friends,
            incoming,
            outgoing,
        }
    }

    pub fn classify(&self, candidate: Uuid) -> Relationship {
        if self.friends.contains(&candidate) {
            Relationship::Friend
        } else if self.incoming.contains(&candidate) {
            Relationship::Incoming
        } else if self.outgoing.contains(&candidate) {
            Relationship::Outgoing
        } else {
            Relationship::None
        }
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.friends.contains(id) || self.incoming.contains(id) || self.outgoing.contains(id)
    }

    /// Every id that falls in one of the three sets.
    pub fn members(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.friends
            .iter()
            .chain(&self.incoming)
            .chain(&self.outgoing)
            .copied()
    }

    /// Single pass over `population`, keeping only users in one of the sets.
    pub fn materialize(&self, population: impl IntoIterator<Item = UserSummary>) -> RelationshipView {
        let mut view = RelationshipView::default();
        for user in population {
            match self.classify(user.id) {
                Relationship::Friend => view.friends.push(user),
                Relationship::Incoming => view.incoming.push(user),
                Relationship::Outgoing => view.outgoing.push(user),
                Relationship::None => {}
            }
        }
        view
    }
}

/// Which users a relationship view should be materialised against.
#[derive(Debug, Clone)]
pub enum Population {
    All,
    Candidates(Vec<Uuid>),
}

/// Derive the viewer's sets. A viewer with no edge document yet gets empty sets.
pub fn derive_for(graph: &dyn GraphStore, viewer: Uuid) -> SocialResult<RelationshipSets> {
    let edges = with_retry("load edges", || graph.get_edges(viewer))?;
    Ok(edges
        .map(|edges| RelationshipSets::derive(&edges))
        .unwrap_or_default())
}

pub fn relationships(
    users: &dyn UserStore,
    graph: &dyn GraphStore,
    viewer: Uuid,
    population: &Population,
) -> SocialResult<RelationshipView> {
    let sets = derive_for(graph, viewer)?;

    let ids: Vec<Uuid> = match population {
        Population::All => sets.members().collect(),
        Population::Candidates(candidates) => candidates
            .iter()
            .filter(|id| sets.contains(id))
            .copied()
            .collect(),
    };
    if ids.is_empty() {
        return Ok(RelationshipView::default());
    }

    let summaries = with_retry("load user summaries", || users.get_summaries(&ids))?;
    Ok(sets.materialize(summaries))
}

/// Other users, each tagged with how they relate to the viewer.
pub fn directory(
    users: &dyn UserStore,
    graph: &dyn GraphStore,
    viewer: Uuid,
) -> SocialResult<Vec<DirectoryEntry>> {
    let sets = derive_for(graph, viewer)?;
    // One extra so dropping the viewer still leaves a full page
    let population = with_retry("list users", || users.list_users(DIRECTORY_LIMIT + 1))?;

    Ok(population
        .into_iter()
        .filter(|user| user.id != viewer)
        .take(DIRECTORY_LIMIT)
        .map(|user| DirectoryEntry {
            relationship: sets.classify(user.id),
            user,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::EdgeSide;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    fn follow(store: &MemoryStore, from: Uuid, to: Uuid) {
        store.add_edge(EdgeSide::Following, from, to).unwrap();
        store.add_edge(EdgeSide::Followers, to, from).unwrap();
    }

    #[test]
    fn derives_three_disjoint_sets() {
        let u = ids(5);
        let edges = Edges {
            following: [u[0], u[1], u[2]].into_iter().collect(),
            followers: [u[1], u[2], u[3]].into_iter().collect(),
        };
        let sets = RelationshipSets::derive(&edges);

        assert_eq!(sets.friends, [u[1], u[2]].into_iter().collect());
        assert_eq!(sets.incoming, [u[3]].into_iter().collect());
        assert_eq!(sets.outgoing, [u[0]].into_iter().collect());
        assert!(sets.friends.is_disjoint(&sets.incoming));
        assert!(sets.friends.is_disjoint(&sets.outgoing));
        assert!(sets.incoming.is_disjoint(&sets.outgoing));
        assert_eq!(sets.classify(u[4]), Relationship::None);
    }

    #[test]
    fn disjoint_for_every_small_graph_state() {
        // Every combination of following/followers membership for 4 candidates
        let u = ids(4);
        for mask in 0u32..256 {
            let mut edges = Edges::default();
            for (i, id) in u.iter().enumerate() {
                if mask & (1 << i) != 0 {
                    edges.following.insert(*id);
                }
                if mask & (1 << (i + 4)) != 0 {
                    edges.followers.insert(*id);
                }
            }
            let sets = RelationshipSets::derive(&edges);
            assert!(sets.friends.is_disjoint(&sets.incoming));
            assert!(sets.friends.is_disjoint(&sets.outgoing));
            assert!(sets.incoming.is_disjoint(&sets.outgoing));
            let union: HashSet<Uuid> = sets.members().collect();
            let expected: HashSet<Uuid> = edges.following.union(&edges.followers).copied().collect();
            assert_eq!(union, expected);
        }
    }

    #[test]
    fn unknown_viewer_gets_empty_view() {
        let store = MemoryStore::new();
        let view = relationships(&store, &store, Uuid::new_v4(), &Population::All).unwrap();
        assert!(view.friends.is_empty());
        assert!(view.incoming.is_empty());
        assert!(view.outgoing.is_empty());
    }

    #[test]
    fn materializes_only_related_candidates() {
        let store = MemoryStore::new();
        let me = store.add_user("me");
        let friend = store.add_user("friend");
        let fan = store.add_user("fan");
        let stranger = store.add_user("stranger");
        follow(&store, me, friend);
        follow(&store, friend, me);
        follow(&store, fan, me);

        let view = relationships(
            &store,
            &store,
            me,
            &Population::Candidates(vec![friend, stranger]),
        )
        .unwrap();
        assert_eq!(view.friends.len(), 1);
        assert_eq!(view.friends[0].id, friend);
        // fan is related but not a candidate
        assert!(view.incoming.is_empty());

        let all = relationships(&store, &store, me, &Population::All).unwrap();
        assert_eq!(all.incoming.len(), 1);
        assert_eq!(all.incoming[0].name, "fan");
    }

    #[test]
    fn directory_tags_everyone_but_the_viewer() {
        let store = MemoryStore::new();
        let me = store.add_user("ana");
        let bo = store.add_user("bo");
        let cy = store.add_user("cy");
        follow(&store, me, bo);

        let entries = directory(&store, &store, me).unwrap();
        assert_eq!(entries.len(), 2);
        let rel = |id| entries.iter().find(|e| e.user.id == id).unwrap().relationship;
        assert_eq!(rel(bo), Relationship::Outgoing);
        assert_eq!(rel(cy), Relationship::None);
    }
}
