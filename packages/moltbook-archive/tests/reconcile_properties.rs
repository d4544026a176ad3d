//! Property tests for reconciliation over arbitrary candidate batches.

use chrono::{TimeZone, Utc};
use moltbook_archive::{
    AgentStore, CommentCandidate, Extraction, MemoryStore, PostCandidate, PostStore,
    Reconciler, SubmoltStore,
};
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

const AUTHORS: &[&str] = &["alpha", "Beta", "gamma_bot", "newbie_agent"];
const SUBMOLTS: &[&str] = &["agentops", "Philosophy", "memes"];

fn post_strategy() -> impl Strategy<Value = PostCandidate> {
    (
        0..6usize,
        "[A-Za-z ]{1,30}",
        proptest::option::of(0..AUTHORS.len()),
        proptest::option::of(0..SUBMOLTS.len()),
        0..500u32,
    )
        .prop_map(|(id, title, author, submolt, upvotes)| {
            let mut post = PostCandidate::new(format!("p-{}", id), format!("T {}", title))
                .with_votes(upvotes, 0);
            if let Some(a) = author {
                post = post.with_agent(AUTHORS[a]);
            }
            if let Some(s) = submolt {
                post = post.with_submolt(SUBMOLTS[s]);
            }
            post
        })
}

fn comment_strategy() -> impl Strategy<Value = CommentCandidate> {
    ("[a-z ]{1,20}", 0..AUTHORS.len(), proptest::option::of(0..6usize)).prop_map(
        |(body, author, post)| {
            let post_ref = post.map(|p| format!("p-{}", p));
            CommentCandidate::new(format!("c {}", body), Some(AUTHORS[author]), post_ref.as_deref())
        },
    )
}

fn extraction_strategy() -> impl Strategy<Value = Extraction> {
    (
        prop::collection::vec(post_strategy(), 0..12),
        prop::collection::vec(comment_strategy(), 0..8),
    )
        .prop_map(|(posts, comments)| Extraction {
            posts,
            comments,
            ..Default::default()
        })
}

proptest! {
    #[test]
    fn reconciling_twice_changes_nothing(extraction in extraction_strategy()) {
        tokio_test::block_on(async {
            let store = MemoryStore::new();
            let reconciler = Reconciler::new(&store);
            let now = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();

            reconciler.reconcile(&extraction, now).await;
            let agents = store.list_agents().await.unwrap();
            let posts = store.list_posts().await.unwrap();
            let submolts = store.list_submolts().await.unwrap();

            let second = reconciler.reconcile(&extraction, now).await;
            prop_assert_eq!(second.posts.inserted, 0);
            prop_assert_eq!(second.agents.inserted, 0);
            prop_assert_eq!(second.comments.inserted, 0);
            prop_assert_eq!(store.list_agents().await.unwrap(), agents);
            prop_assert_eq!(store.list_posts().await.unwrap(), posts);
            prop_assert_eq!(store.list_submolts().await.unwrap(), submolts);
            Ok(())
        })?;
    }

    #[test]
    fn natural_keys_stay_unique(extraction in extraction_strategy()) {
        tokio_test::block_on(async {
            let store = MemoryStore::new();
            Reconciler::new(&store).reconcile(&extraction, Utc::now()).await;

            let distinct_posts: HashSet<_> =
                extraction.posts.iter().map(|p| p.external_id.clone()).collect();
            prop_assert_eq!(store.list_posts().await.unwrap().len(), distinct_posts.len());

            let referenced: HashSet<_> = extraction
                .posts
                .iter()
                .filter_map(|p| p.agent_reference.clone())
                .chain(extraction.comments.iter().filter_map(|c| c.agent_reference.clone()))
                .collect();
            let agents = store.list_agents().await.unwrap();
            prop_assert_eq!(agents.len(), referenced.len());
            for username in &referenced {
                prop_assert!(store.get_agent(username).await.unwrap().is_some());
            }
            Ok(())
        })?;
    }

    #[test]
    fn post_count_matches_stored_posts(extraction in extraction_strategy()) {
        tokio_test::block_on(async {
            let store = MemoryStore::new();
            Reconciler::new(&store).reconcile(&extraction, Utc::now()).await;

            let mut expected: HashMap<_, u32> = HashMap::new();
            for post in store.list_posts().await.unwrap() {
                if let Some(agent_id) = post.agent_id {
                    *expected.entry(agent_id).or_default() += 1;
                }
            }
            for agent in store.list_agents().await.unwrap() {
                prop_assert_eq!(agent.post_count, expected.get(&agent.id).copied().unwrap_or(0));
            }
            Ok(())
        })?;
    }
}
