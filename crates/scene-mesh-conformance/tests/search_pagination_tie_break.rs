//! Twelve posts sharing the same text (and so, created within the same
//! recency bucket, the same composite score) must tie-break on ascending
//! post id and paginate without gaps or duplicates.

use scene_mesh::{Viewer, Visibility};
use scene_mesh_repo::NewPost;
use uuid::Uuid;

fn new_scene() -> scene_mesh_repo::NewScene {
    scene_mesh_repo::NewScene {
        owner_did: "did:owner".to_string(),
        name: "market".to_string(),
        allow_precise: false,
        precise_point: None,
        coarse_geohash: "u4pruy".to_string(),
        visibility: Visibility::Public,
        tags: vec![],
        palette: vec![],
    }
}

#[test]
fn tied_scores_paginate_in_ascending_id_order_with_no_gaps() {
    let mesh = scene_mesh::SceneMesh::default();
    let scene = mesh.create_scene(new_scene()).unwrap();
    let viewer = Viewer::new("did:plc:reader", false);

    let mut ids = Vec::new();
    for _ in 0..12 {
        let id = mesh
            .create_post(NewPost {
                scene_id: Some(scene),
                event_id: None,
                author_did: "did:plc:author".to_string(),
                text: "flea market today".to_string(),
                attachments: vec![],
                labels: vec![],
                record_key: None,
            })
            .unwrap();
        ids.push(id);
    }

    let page1 = mesh.search("flea market", Some(scene), 5, None, None, &viewer);
    assert_eq!(page1.posts.len(), 5);
    let cursor1 = page1.next_cursor.expect("first page should have a cursor");

    let page2 = mesh.search("flea market", Some(scene), 5, Some(cursor1), None, &viewer);
    assert_eq!(page2.posts.len(), 5);
    let cursor2 = page2.next_cursor.expect("second page should have a cursor");

    let page3 = mesh.search("flea market", Some(scene), 5, Some(cursor2), None, &viewer);
    assert_eq!(page3.posts.len(), 2);
    assert!(page3.next_cursor.is_none());

    let page1_ids: Vec<Uuid> = page1.posts.iter().map(|p| p.id).collect();
    let mut sorted_ids = ids.clone();
    sorted_ids.sort();
    assert_eq!(page1_ids, sorted_ids[0..5], "page1 is the five smallest ids, ascending");

    let last_of_page1 = page1.posts.last().unwrap().id;
    let first_of_page2 = page2.posts.first().unwrap().id;
    assert!(last_of_page1 < first_of_page2);

    let mut seen: Vec<Uuid> = page1
        .posts
        .iter()
        .chain(page2.posts.iter())
        .chain(page3.posts.iter())
        .map(|p| p.id)
        .collect();
    let total = seen.len();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), total, "no duplicate ids across pages");
    assert_eq!(total, 12);
    assert_eq!(ids.len(), 12);
}
