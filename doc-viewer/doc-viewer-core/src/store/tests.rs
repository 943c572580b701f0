use super::*;
use crate::document::DocumentMetadata;
use crate::events::Event;

fn doc(title: &str, content: &str) -> NewDocument {
    NewDocument::new(title, content)
}

fn assert_timestamps_ordered(store: &DocumentStore) {
    for d in store.list(None) {
        assert!(d.updated_at >= d.created_at, "{} has updated_at < created_at", d.id);
    }
}

#[test]
fn create_sets_active_status_and_timestamps() {
    let mut store = DocumentStore::new();
    let d = store.create(doc("Release Notes", "v1.0 shipped")).unwrap();
    assert_eq!(d.status, DocumentStatus::Active);
    assert!(!d.id.is_empty());
    assert_eq!(d.created_at, d.updated_at);

    let listed = store.list(None);
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0], d);
}

#[test]
fn create_rejects_empty_title_without_mutation() {
    let mut store = DocumentStore::new();
    let err = store.create(doc("", "body")).unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
    assert!(store.is_empty());
}

#[test]
fn ids_stay_unique_after_delete() {
    let mut store = DocumentStore::new();
    let mut seen = HashSet::new();
    for i in 0..200 {
        let d = store.create(doc(&format!("doc {i}"), "")).unwrap();
        assert!(seen.insert(d.id.clone()));
        if i % 2 == 0 {
            assert!(store.delete(&d.id));
        }
    }
    let again = store.create(doc("after", "")).unwrap();
    assert!(!seen.contains(&again.id));
}

#[test]
fn list_orders_by_most_recently_touched() {
    let mut store = DocumentStore::new();
    let b = store.create(doc("B", "older")).unwrap();
    let a = store.create(doc("A", "newer")).unwrap();
    let order: Vec<_> = store.list(None).into_iter().map(|d| d.id).collect();
    assert_eq!(order, vec![a.id.clone(), b.id.clone()]);

    store.update(&b.id, "B", "edited").unwrap();
    let order: Vec<_> = store.list(None).into_iter().map(|d| d.id).collect();
    assert_eq!(order, vec![b.id, a.id]);
    assert_timestamps_ordered(&store);
}

#[test]
fn list_filters_by_status() {
    let mut store = DocumentStore::new();
    let a = store.create(doc("a", "")).unwrap();
    store.create(doc("b", "")).unwrap();
    store.complete(&a.id).unwrap();

    let complete = store.list(Some(DocumentStatus::Complete));
    assert_eq!(complete.len(), 1);
    assert_eq!(complete[0].id, a.id);
    assert_eq!(store.list(Some(DocumentStatus::Active)).len(), 1);
}

#[test]
fn upsert_reuses_active_document_on_path_match() {
    let mut store = DocumentStore::new();
    let first = store
        .upsert_by_path(doc("Spec v1", "one").with_path("project/specs"))
        .unwrap();
    let second = store
        .upsert_by_path(doc("Spec v2", "two").with_path("project/specs"))
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.title, "Spec v2");
    assert_eq!(second.content, "two");
    assert_eq!(second.created_at, first.created_at);
    assert!(second.updated_at > first.updated_at);
    assert_eq!(store.len(), 1);
}

#[test]
fn upsert_without_match_creates_fresh_document() {
    let mut store = DocumentStore::new();
    let a = store.upsert_by_path(doc("a", "").with_path("x")).unwrap();
    let b = store.upsert_by_path(doc("b", "").with_path("y")).unwrap();
    let c = store.upsert_by_path(doc("c", "")).unwrap();
    let d = store.upsert_by_path(doc("d", "")).unwrap();
    let ids: HashSet<_> = [a.id, b.id, c.id, d.id].into_iter().collect();
    assert_eq!(ids.len(), 4);
}

#[test]
fn completed_document_does_not_block_new_active_one() {
    let mut store = DocumentStore::new();
    let old = store.upsert_by_path(doc("old", "").with_path("p")).unwrap();
    store.complete(&old.id).unwrap();
    let fresh = store.upsert_by_path(doc("new", "").with_path("p")).unwrap();
    assert_ne!(old.id, fresh.id);
    assert_eq!(store.get(&old.id).unwrap().title, "old");
    assert_eq!(store.find_active_by_path("p").unwrap().id, fresh.id);
}

#[test]
fn upsert_keeps_metadata_and_status() {
    let mut store = DocumentStore::new();
    let meta = DocumentMetadata {
        source: Some("claude".into()),
        path: Some("notes".into()),
        tags: vec!["a".into()],
    };
    let first = store
        .upsert_by_path(doc("n", "1").with_metadata(meta.clone()))
        .unwrap();
    let second = store
        .upsert_by_path(NewDocument::new("n2", "2").with_path("notes"))
        .unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.metadata, meta);
    assert_eq!(second.status, DocumentStatus::Active);
}

#[test]
fn upsert_emits_event_only_on_create() {
    let mut store = DocumentStore::new();
    let mut sub = store.subscribe();
    store.upsert_by_path(doc("a", "").with_path("p")).unwrap();
    store.upsert_by_path(doc("b", "").with_path("p")).unwrap();
    assert!(matches!(sub.try_recv(), Some(Event::NewDocument { .. })));
    assert!(sub.try_recv().is_none());
}

#[test]
fn rename_changes_title_only() {
    let mut store = DocumentStore::new();
    let d = store.create(doc("before", "body")).unwrap();
    let renamed = store.rename(&d.id, "after").unwrap();
    assert_eq!(renamed.title, "after");
    assert_eq!(renamed.content, "body");
    assert!(renamed.updated_at > d.updated_at);

    assert!(matches!(
        store.rename(&d.id, " "),
        Err(StoreError::Validation(_))
    ));
    assert!(store.rename("missing", "x").unwrap_err().is_not_found());
}

#[test]
fn update_keeps_status() {
    let mut store = DocumentStore::new();
    let d = store.create(doc("t", "c")).unwrap();
    store.complete(&d.id).unwrap();
    let updated = store.update(&d.id, "t2", "c2").unwrap();
    assert_eq!(updated.status, DocumentStatus::Complete);
    assert_eq!(updated.content, "c2");
    assert!(store.update("nope", "t", "c").unwrap_err().is_not_found());
}

#[test]
fn complete_is_idempotent() {
    let mut store = DocumentStore::new();
    let d = store.create(doc("t", "c")).unwrap();
    let once = store.complete(&d.id).unwrap();
    let twice = store.complete(&d.id).unwrap();
    assert_eq!(once.status, DocumentStatus::Complete);
    assert_eq!(once, twice);
    assert!(store.complete("missing").unwrap_err().is_not_found());
    assert_timestamps_ordered(&store);
}

#[test]
fn delete_reports_missing_ids() {
    let mut store = DocumentStore::new();
    let d = store.create(doc("t", "")).unwrap();
    assert!(!store.delete("missing"));
    assert_eq!(store.len(), 1);
    assert!(store.delete(&d.id));
    assert!(!store.delete(&d.id));
    assert!(store.get(&d.id).is_none());
}

#[test]
fn clear_all_returns_count() {
    let mut store = DocumentStore::new();
    for i in 0..3 {
        store.create(doc(&i.to_string(), "")).unwrap();
    }
    assert_eq!(store.clear_all(), 3);
    assert!(store.is_empty());
    assert_eq!(store.clear_all(), 0);
}

#[tokio::test]
async fn subscriber_sees_creations_until_unsubscribed() {
    let mut store = DocumentStore::new();
    let mut sub = store.subscribe();
    let one = store.create(doc("one", "")).unwrap();
    let two = store.create(doc("two", "")).unwrap();
    assert!(store.unsubscribe(sub.id()));
    store.create(doc("three", "")).unwrap();

    assert_eq!(
        sub.recv().await,
        Some(Event::NewDocument {
            id: one.id,
            title: one.title
        })
    );
    assert_eq!(
        sub.recv().await,
        Some(Event::NewDocument {
            id: two.id,
            title: two.title
        })
    );
    assert_eq!(sub.recv().await, None);
}

#[test]
fn shared_broadcaster_receives_store_events() {
    let events = EventBroadcaster::new();
    let mut sub = events.subscribe();
    let mut store = DocumentStore::with_events(events.clone());
    store.create(doc("x", "")).unwrap();
    assert!(sub.try_recv().is_some());
    assert_eq!(store.events().subscriber_count(), 1);
}
