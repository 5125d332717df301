use super::*;
use chrono::{Duration, Utc};

fn todo(id: &str, title: &str) -> Todo {
    let at = Utc::now() - Duration::minutes(1);
    Todo {
        id: TodoId::from(id),
        title: title.to_string(),
        completed: false,
        created_at: at,
        updated_at: at,
    }
}

#[test]
fn new_cache_reads_empty() {
    let cache = LocalCache::new();
    assert!(cache.read().is_empty());
}

#[test]
fn replace_is_visible_to_later_reads() {
    let cache = LocalCache::new();
    cache.replace(Snapshot::new(vec![todo("a", "first"), todo("b", "second")]));

    let snapshot = cache.read();
    assert_eq!(snapshot.ids(), vec![TodoId::from("a"), TodoId::from("b")]);
    assert_eq!(snapshot.get(&TodoId::from("b")).map(|t| t.title.as_str()), Some("second"));
}

#[test]
fn mutate_returns_the_stored_snapshot() {
    let cache = LocalCache::new();
    cache.replace(Snapshot::new(vec![todo("a", "first")]));

    let stored = cache.mutate(|items| {
        let mut next = vec![todo("z", "newest")];
        next.extend_from_slice(items);
        next
    });

    assert_eq!(stored, cache.read());
    assert_eq!(stored.ids(), vec![TodoId::from("z"), TodoId::from("a")]);
}

#[test]
fn earlier_snapshots_are_unaffected_by_writes() {
    let cache = LocalCache::new();
    cache.replace(Snapshot::new(vec![todo("a", "first")]));
    let before = cache.read();

    cache.mutate(|items| items.iter().filter(|t| t.id.as_str() != "a").cloned().collect());

    assert_eq!(before.len(), 1);
    assert!(cache.read().is_empty());
}

#[test]
fn duplicate_ids_keep_first_occurrence() {
    let snapshot = Snapshot::new(vec![
        todo("a", "kept"),
        todo("b", "other"),
        todo("a", "dropped"),
    ]);
    assert_eq!(snapshot.len(), 2);
    assert_eq!(
        snapshot.get(&TodoId::from("a")).map(|t| t.title.as_str()),
        Some("kept")
    );
}

#[test]
fn mutate_cannot_introduce_duplicates() {
    let cache = LocalCache::new();
    cache.replace(Snapshot::new(vec![todo("a", "first")]));
    let stored = cache.mutate(|items| {
        let mut next = items.to_vec();
        next.extend_from_slice(items);
        next
    });
    assert_eq!(stored.len(), 1);
}

#[test]
fn placeholders_are_listed_separately() {
    let snapshot = Snapshot::new(vec![Todo::placeholder("pending"), todo("a", "real")]);
    let placeholders: Vec<&str> = snapshot.placeholders().map(|t| t.title.as_str()).collect();
    assert_eq!(placeholders, vec!["pending"]);
}

#[test]
fn concurrent_mutations_are_not_lost() {
    let cache = std::sync::Arc::new(LocalCache::new());
    let writers: Vec<_> = (0..8)
        .map(|writer| {
            let cache = std::sync::Arc::clone(&cache);
            std::thread::spawn(move || {
                for n in 0..50 {
                    let item = todo(&format!("{writer}-{n}"), "item");
                    cache.mutate(|items| {
                        let mut next = vec![item.clone()];
                        next.extend_from_slice(items);
                        next
                    });
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().expect("writer thread");
    }
    assert_eq!(cache.read().len(), 400);
}
