//! A re-delivery of the same `(authorDID, recordRKey)` under new text
//! updates the existing post in place instead of inserting a duplicate.

use scene_mesh::Visibility;
use scene_mesh_core::RecordKey;
use scene_mesh_repo::{NewPost, NewScene};

fn new_scene() -> NewScene {
    NewScene {
        owner_did: "did:owner".to_string(),
        name: "test".to_string(),
        allow_precise: false,
        precise_point: None,
        coarse_geohash: "u4pruy".to_string(),
        visibility: Visibility::Public,
        tags: vec![],
        palette: vec![],
    }
}

fn post(scene_id: uuid::Uuid, text: &str) -> NewPost {
    NewPost {
        scene_id: Some(scene_id),
        event_id: None,
        author_did: "did:plc:a".to_string(),
        text: text.to_string(),
        attachments: vec![],
        labels: vec![],
        record_key: Some(RecordKey {
            record_did: "did:plc:a".to_string(),
            record_rkey: "p1".to_string(),
        }),
    }
}

#[test]
fn repeated_upsert_under_the_same_record_key_updates_in_place() {
    let mesh = scene_mesh::SceneMesh::default();
    let scene = mesh.create_scene(new_scene()).unwrap();

    let first = mesh.upsert_post(post(scene, "hi")).unwrap();
    assert!(first.inserted);

    let second = mesh.upsert_post(post(scene, "hello")).unwrap();
    assert!(!second.inserted);
    assert_eq!(first.id, second.id);

    let stored = mesh.posts.get_by_id(second.id).unwrap();
    assert_eq!(stored.text, "hello");

    let (page, _) = mesh.posts.list_by_scene(scene, 10, None);
    assert_eq!(page.len(), 1, "only one post exists after the re-delivery");
}
