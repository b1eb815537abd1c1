//! Viewer-filtered feed queries over `PostRepository`.

use uuid::Uuid;

use scene_mesh_guard::label::{Context, Viewer, visible};
use scene_mesh_repo::FeedCursor;
use scene_mesh_core::Post;

use crate::SceneMesh;

/// A feed page after viewer-side label filtering. May contain fewer than
/// the requested page size when trailing rows were filtered out — the
/// cursor still names the true `(createdAt, id)` boundary of the
/// repository's last returned row, so the next call resumes correctly.
#[derive(Debug, Clone)]
pub struct FeedPage {
    pub posts: Vec<Post>,
    pub next_cursor: Option<FeedCursor>,
}

impl SceneMesh {
    pub fn scene_feed(
        &self,
        scene_id: Uuid,
        limit: usize,
        cursor: Option<FeedCursor>,
        viewer: &Viewer,
    ) -> FeedPage {
        let (page, next_cursor) = self.posts.list_by_scene(scene_id, limit, cursor);
        FeedPage {
            posts: page
                .into_iter()
                .filter(|post| visible(post, viewer, Context::Feed))
                .collect(),
            next_cursor,
        }
    }

    pub fn event_feed(
        &self,
        event_id: Uuid,
        limit: usize,
        cursor: Option<FeedCursor>,
        viewer: &Viewer,
    ) -> FeedPage {
        let (page, next_cursor) = self.posts.list_by_event(event_id, limit, cursor);
        FeedPage {
            posts: page
                .into_iter()
                .filter(|post| visible(post, viewer, Context::Feed))
                .collect(),
            next_cursor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scene_mesh_core::{Label, Visibility};
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

    fn new_post(scene_id: Uuid, author: &str, labels: Vec<Label>) -> NewPost {
        NewPost {
            scene_id: Some(scene_id),
            event_id: None,
            author_did: author.to_string(),
            text: "hi".to_string(),
            attachments: vec![],
            labels,
            record_key: None,
        }
    }

    #[test]
    fn scene_feed_hides_nsfw_from_viewers_who_did_not_opt_in() {
        let mesh = SceneMesh::default();
        let scene = mesh.create_scene(new_scene()).unwrap();
        mesh.create_post(new_post(scene, "did:plc:author", vec![Label::Nsfw]))
            .unwrap();

        let bob = Viewer::new("did:plc:bob", false);
        let page = mesh.scene_feed(scene, 10, None, &bob);
        assert!(page.posts.is_empty());

        let bob_opted_in = Viewer::new("did:plc:bob", true);
        let page = mesh.scene_feed(scene, 10, None, &bob_opted_in);
        assert_eq!(page.posts.len(), 1);
    }

    #[test]
    fn scene_feed_always_shows_the_author_their_own_post() {
        let mesh = SceneMesh::default();
        let scene = mesh.create_scene(new_scene()).unwrap();
        mesh.create_post(new_post(scene, "did:plc:author", vec![Label::Nsfw]))
            .unwrap();

        let author = Viewer::new("did:plc:author", false);
        let page = mesh.scene_feed(scene, 10, None, &author);
        assert_eq!(page.posts.len(), 1);
    }
}
