//! Unit tests for conversation batching

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use social_archive_downloader::downloader::{ConversationBacklog, ConversationBatchQueue};
use std::collections::HashMap;

const POSTFIX: &str = "-is:retweet";

fn ids_of(query: &str) -> Vec<String> {
    query
        .trim_end_matches(POSTFIX)
        .trim_end()
        .split(" OR ")
        .map(|part| {
            part.strip_prefix("conversation_id:")
                .unwrap_or_else(|| panic!("malformed query part {part:?}"))
                .to_string()
        })
        .collect()
}

fn random_id(rng: &mut StdRng) -> String {
    let len = rng.gen_range(1..=19);
    (0..len).map(|_| char::from(b'0' + rng.gen_range(0..10u8))).collect()
}

#[test]
fn test_every_id_emitted_exactly_once() {
    for seed in 0..20 {
        let mut rng = StdRng::seed_from_u64(seed);
        let max_length = rng.gen_range(60..=300);
        let mut queue = ConversationBatchQueue::new(POSTFIX, max_length);

        let mut pushed: HashMap<String, usize> = HashMap::new();
        let mut emitted: HashMap<String, usize> = HashMap::new();
        let mut queries = Vec::new();

        for _ in 0..rng.gen_range(0..150) {
            let id = random_id(&mut rng);
            *pushed.entry(id.clone()).or_default() += 1;
            queue.push(id);
            if rng.gen_bool(0.3) {
                queries.extend(queue.get_query(false));
            }
        }
        queries.extend(queue.flush_all());

        for query in &queries {
            assert!(query.chars().count() <= max_length, "seed {seed}: {query}");
            assert!(query.ends_with(POSTFIX));
            for id in ids_of(query) {
                *emitted.entry(id).or_default() += 1;
            }
        }

        assert_eq!(pushed, emitted, "seed {seed}");
        assert!(queue.is_empty());
    }
}

#[test]
fn test_non_final_queries_are_full() {
    let mut queue = ConversationBatchQueue::new(POSTFIX, 100);
    for id in 1000..1010 {
        queue.push(id.to_string());
    }

    let query = queue.get_query(false).unwrap();
    // One more id would have overflowed
    let next_len = " OR conversation_id:".len() + 4;
    assert!(query.chars().count() + next_len > 100);
    assert_eq!(ids_of(&query), vec!["1000", "1001", "1002"]);
}

#[test]
fn test_flush_all_drains_queue() {
    let mut queue = ConversationBatchQueue::new("", 30);
    for id in ["11", "22", "33", "44"] {
        queue.push(id);
    }

    let queries = queue.flush_all();
    assert_eq!(
        queries,
        vec![
            "conversation_id:11",
            "conversation_id:22",
            "conversation_id:33",
            "conversation_id:44",
        ]
    );
    assert!(queue.is_empty());
    assert!(queue.flush_all().is_empty());
}

#[test]
fn test_backlog_offers_each_conversation_once() {
    let mut backlog = ConversationBacklog::new(POSTFIX, 1024);

    assert!(backlog.offer("7"));
    assert!(backlog.offer("8"));
    assert!(!backlog.offer("7"));
    assert_eq!(backlog.pending(), 2);
    assert_eq!(backlog.seen(), 2);

    assert_eq!(backlog.ready_query(), None);
    assert_eq!(
        backlog.drain(),
        vec!["conversation_id:7 OR conversation_id:8 -is:retweet"]
    );

    assert!(!backlog.offer("8"));
    assert_eq!(backlog.pending(), 0);
}
