// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0
//! Filesystem service integration tests, run against a temp-directory
//! backed runtime fake instead of a container engine.

mod support;

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use aisu_core::application::container_fs::ContainerFs;
use aisu_core::application::file_system::{
    BatchUpdateDesktopPositionsRequest, BulkDeleteRequest, BulkMoveRequest, CopyNodeRequest,
    CreateNodeRequest, DeleteNodeRequest, DesktopPositionItem, FileSystemService,
    MoveNodeRequest, NodeResponse, RenameNodeRequest, RestoreNodeRequest, SortBy, SortDir,
    TreeNodeResponse,
};
use aisu_core::domain::error::CoreError;
use aisu_core::domain::node::NodeType;
use aisu_core::domain::runtime::ContainerRuntime;
use aisu_core::domain::store::NodeMetaStore;
use aisu_core::infrastructure::stores::InMemoryNodeMetaStore;
use support::LocalRuntime;

const STANDARD_DIRS: &[&str] = &[
    "Desktop",
    "Documents",
    "Downloads",
    "Pictures",
    "Music",
    "Videos",
    ".Trash",
];

struct Harness {
    _tmp: tempfile::TempDir,
    runtime: Arc<LocalRuntime>,
    meta: Arc<InMemoryNodeMetaStore>,
    service: FileSystemService,
    user_id: Uuid,
}

fn harness() -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    for dir in STANDARD_DIRS {
        std::fs::create_dir_all(tmp.path().join(dir)).unwrap();
    }

    let runtime = Arc::new(LocalRuntime::new(tmp.path().to_path_buf()));
    let meta = Arc::new(InMemoryNodeMetaStore::new());
    let user_id = Uuid::new_v4();

    let dyn_runtime: Arc<dyn ContainerRuntime> = Arc::clone(&runtime) as Arc<dyn ContainerRuntime>;
    let fs = ContainerFs::new(dyn_runtime, format!("aisu_{user_id}"));
    let dyn_meta: Arc<dyn NodeMetaStore> = Arc::clone(&meta) as Arc<dyn NodeMetaStore>;
    let service = FileSystemService::new(user_id, fs, dyn_meta);

    Harness {
        _tmp: tmp,
        runtime,
        meta,
        service,
        user_id,
    }
}

async fn create_file(service: &FileSystemService, parent: &str, name: &str) -> NodeResponse {
    service
        .create_node(CreateNodeRequest {
            parent_path: parent.to_string(),
            name: name.to_string(),
            node_type: NodeType::File,
            mime_type: None,
            size: 0,
        })
        .await
        .unwrap()
}

async fn create_dir(service: &FileSystemService, parent: &str, name: &str) -> NodeResponse {
    service
        .create_node(CreateNodeRequest {
            parent_path: parent.to_string(),
            name: name.to_string(),
            node_type: NodeType::Directory,
            mime_type: None,
            size: 0,
        })
        .await
        .unwrap()
}

fn find_node<'a>(tree: &'a TreeNodeResponse, path: &str) -> Option<&'a NodeResponse> {
    if tree.node.path == path {
        return Some(&tree.node);
    }
    tree.children.iter().find_map(|child| find_node(child, path))
}

#[tokio::test]
async fn fresh_home_has_the_standard_layout() {
    let h = harness();

    let tree = h.service.get_tree().await.unwrap();
    assert_eq!(tree.node.path, "/");
    let names: HashSet<String> = tree.children.iter().map(|c| c.node.name.clone()).collect();
    let expected: HashSet<String> = STANDARD_DIRS.iter().map(|d| d.to_string()).collect();
    assert_eq!(names, expected);

    let listing = h
        .service
        .list_directory("/", SortBy::Name, SortDir::Asc)
        .await
        .unwrap();
    assert_eq!(listing.total, 7);
}

#[tokio::test]
async fn traversal_paths_never_reach_the_content_side() {
    let h = harness();
    let before = h.runtime.execs();

    let result = h.service.get_node("/Documents/../../etc/passwd").await;
    assert!(matches!(result, Err(CoreError::Validation(_))));

    let result = h
        .service
        .delete_node(DeleteNodeRequest {
            path: "/../etc".to_string(),
            permanent: true,
        })
        .await;
    assert!(matches!(result, Err(CoreError::Validation(_))));

    let result = h
        .service
        .move_node(MoveNodeRequest {
            source_path: "/a/..".to_string(),
            dest_parent_path: "/Documents".to_string(),
        })
        .await;
    assert!(matches!(result, Err(CoreError::Validation(_))));

    assert_eq!(h.runtime.execs(), before, "no exec may be issued for an invalid path");
}

#[tokio::test]
async fn root_is_protected() {
    let h = harness();

    for permanent in [true, false] {
        let result = h
            .service
            .delete_node(DeleteNodeRequest {
                path: "/".to_string(),
                permanent,
            })
            .await;
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    let result = h
        .service
        .rename_node(RenameNodeRequest {
            path: "/".to_string(),
            new_name: "home".to_string(),
        })
        .await;
    assert!(matches!(result, Err(CoreError::Validation(_))));

    let result = h
        .service
        .move_node(MoveNodeRequest {
            source_path: "/".to_string(),
            dest_parent_path: "/Documents".to_string(),
        })
        .await;
    assert!(matches!(result, Err(CoreError::Validation(_))));
}

#[tokio::test]
async fn create_resolves_name_collisions_silently() {
    let h = harness();

    let first = create_file(&h.service, "/Documents", "note.txt").await;
    assert_eq!(first.path, "/Documents/note.txt");
    assert_eq!(first.name, "note.txt");

    let second = create_file(&h.service, "/Documents", "note.txt").await;
    assert_eq!(second.path, "/Documents/note.txt 2");

    let third = create_file(&h.service, "/Documents", "note.txt").await;
    assert_eq!(third.path, "/Documents/note.txt 3");

    let listing = h
        .service
        .list_directory("/Documents", SortBy::Name, SortDir::Asc)
        .await
        .unwrap();
    let names: Vec<&str> = listing.children.iter().map(|c| c.name.as_str()).collect();
    let unique: HashSet<&&str> = names.iter().collect();
    assert_eq!(names.len(), unique.len(), "no two siblings may share a name");
}

#[tokio::test]
async fn create_rejects_missing_or_non_directory_parent() {
    let h = harness();

    let result = h
        .service
        .create_node(CreateNodeRequest {
            parent_path: "/Nowhere".to_string(),
            name: "a.txt".to_string(),
            node_type: NodeType::File,
            mime_type: None,
            size: 0,
        })
        .await;
    assert!(matches!(result, Err(CoreError::NotFound(_))));

    create_file(&h.service, "/Documents", "plain.txt").await;
    let result = h
        .service
        .create_node(CreateNodeRequest {
            parent_path: "/Documents/plain.txt".to_string(),
            name: "a.txt".to_string(),
            node_type: NodeType::File,
            mime_type: None,
            size: 0,
        })
        .await;
    assert!(matches!(result, Err(CoreError::Validation(_))));
}

#[tokio::test]
async fn rename_moves_and_conflicts() {
    let h = harness();

    create_file(&h.service, "/Documents", "note.txt").await;
    let renamed = h
        .service
        .rename_node(RenameNodeRequest {
            path: "/Documents/note.txt".to_string(),
            new_name: "note2.txt".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(renamed.old_path, "/Documents/note.txt");
    assert_eq!(renamed.new_path, "/Documents/note2.txt");

    assert!(h.service.get_node("/Documents/note.txt").await.is_err());
    assert!(h.service.get_node("/Documents/note2.txt").await.is_ok());

    // Rename onto an existing sibling: conflict, source intact.
    create_file(&h.service, "/Documents", "other.txt").await;
    let result = h
        .service
        .rename_node(RenameNodeRequest {
            path: "/Documents/other.txt".to_string(),
            new_name: "note2.txt".to_string(),
        })
        .await;
    assert!(matches!(result, Err(CoreError::Conflict(_))));
    assert!(h.service.get_node("/Documents/other.txt").await.is_ok());
    assert!(h.service.get_node("/Documents/note2.txt").await.is_ok());
}

#[tokio::test]
async fn move_into_self_or_descendant_is_rejected() {
    let h = harness();
    create_dir(&h.service, "/Documents", "Projects").await;
    create_dir(&h.service, "/Documents/Projects", "inner").await;

    for dest in ["/Documents/Projects", "/Documents/Projects/inner"] {
        let result = h
            .service
            .move_node(MoveNodeRequest {
                source_path: "/Documents/Projects".to_string(),
                dest_parent_path: dest.to_string(),
            })
            .await;
        assert!(matches!(result, Err(CoreError::Validation(_))), "dest {dest}");
    }
}

#[tokio::test]
async fn move_lands_on_a_unique_name() {
    let h = harness();

    create_file(&h.service, "/Documents", "a.txt").await;
    let moved = h
        .service
        .move_node(MoveNodeRequest {
            source_path: "/Documents/a.txt".to_string(),
            dest_parent_path: "/Downloads".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(moved.new_path, "/Downloads/a.txt");

    // A second "a.txt" moving into the same destination gets suffixed.
    create_file(&h.service, "/Documents", "a.txt").await;
    let moved = h
        .service
        .move_node(MoveNodeRequest {
            source_path: "/Documents/a.txt".to_string(),
            dest_parent_path: "/Downloads".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(moved.new_path, "/Downloads/a.txt 2");
    assert!(h.service.get_node("/Downloads/a.txt").await.is_ok());
}

#[tokio::test]
async fn directory_copy_is_recursive_and_leaves_the_source() {
    let h = harness();

    create_dir(&h.service, "/Documents", "Projects").await;
    create_file(&h.service, "/Documents/Projects", "readme.txt").await;
    h.service
        .write_file("/Documents/Projects/readme.txt", "hello")
        .await
        .unwrap();

    let copied = h
        .service
        .copy_node(CopyNodeRequest {
            source_path: "/Documents/Projects".to_string(),
            dest_parent_path: "/Desktop".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(copied.new_path, "/Desktop/Projects");

    let copy = h
        .service
        .read_file("/Desktop/Projects/readme.txt")
        .await
        .unwrap();
    assert_eq!(copy.content, "hello");

    // Originals untouched.
    assert!(h.service.get_node("/Documents/Projects/readme.txt").await.is_ok());
}

#[tokio::test]
async fn soft_delete_round_trips_with_content() {
    let h = harness();

    create_file(&h.service, "/Documents", "temp.txt").await;
    h.service
        .write_file("/Documents/temp.txt", "precious bytes")
        .await
        .unwrap();

    let deleted = h
        .service
        .delete_node(DeleteNodeRequest {
            path: "/Documents/temp.txt".to_string(),
            permanent: false,
        })
        .await
        .unwrap();
    assert!(deleted.path.starts_with("/.Trash/"), "got {}", deleted.path);
    assert!(deleted.is_trashed);
    assert_eq!(deleted.original_path.as_deref(), Some("/Documents/temp.txt"));

    let trash = h.service.list_trash().await.unwrap();
    assert!(trash.iter().any(|n| n.path == deleted.path));
    assert!(trash
        .iter()
        .any(|n| n.original_path.as_deref() == Some("/Documents/temp.txt")));

    let restored = h
        .service
        .restore_node(RestoreNodeRequest {
            path: deleted.path.clone(),
        })
        .await
        .unwrap();
    assert_eq!(restored.new_path, "/Documents/temp.txt");

    let content = h.service.read_file("/Documents/temp.txt").await.unwrap();
    assert_eq!(content.content, "precious bytes");

    // Nothing left behind.
    assert_eq!(h.service.empty_trash().await.unwrap(), 0);
}

#[tokio::test]
async fn restore_into_an_occupied_path_takes_the_unique_variant() {
    let h = harness();

    create_file(&h.service, "/Documents", "temp.txt").await;
    let deleted = h
        .service
        .delete_node(DeleteNodeRequest {
            path: "/Documents/temp.txt".to_string(),
            permanent: false,
        })
        .await
        .unwrap();

    // Occupy the original path before restoring.
    create_file(&h.service, "/Documents", "temp.txt").await;

    let restored = h
        .service
        .restore_node(RestoreNodeRequest {
            path: deleted.path,
        })
        .await
        .unwrap();
    assert_eq!(restored.new_path, "/Documents/temp.txt 2");
}

#[tokio::test]
async fn restore_requires_trash_metadata() {
    let h = harness();
    let result = h
        .service
        .restore_node(RestoreNodeRequest {
            path: "/.Trash/ghost".to_string(),
        })
        .await;
    assert!(matches!(result, Err(CoreError::NotFound(_))));
}

#[tokio::test]
async fn permanent_delete_erases_metadata_for_the_subtree() {
    let h = harness();

    create_dir(&h.service, "/Documents", "Projects").await;
    create_file(&h.service, "/Documents/Projects", "a.txt").await;
    h.service
        .update_desktop_positions(BatchUpdateDesktopPositionsRequest {
            positions: vec![DesktopPositionItem {
                path: "/Documents/Projects/a.txt".to_string(),
                x: 5,
                y: 6,
            }],
        })
        .await
        .unwrap();
    assert!(h.meta.get(h.user_id, "/Documents/Projects/a.txt").is_some());

    h.service
        .delete_node(DeleteNodeRequest {
            path: "/Documents/Projects".to_string(),
            permanent: true,
        })
        .await
        .unwrap();

    assert!(h.service.get_node("/Documents/Projects").await.is_err());
    assert!(h.meta.get(h.user_id, "/Documents/Projects/a.txt").is_none());
}

#[tokio::test]
async fn bulk_operations_never_short_circuit() {
    let h = harness();

    create_file(&h.service, "/Documents", "a.txt").await;
    create_file(&h.service, "/Documents", "b.txt").await;

    let moved = h
        .service
        .bulk_move(BulkMoveRequest {
            source_paths: vec![
                "/Documents/a.txt".to_string(),
                "/Documents/b.txt".to_string(),
            ],
            dest_parent_path: "/Downloads".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(moved.succeeded.len(), 2);
    assert!(moved.failed.is_empty());

    let deleted = h
        .service
        .bulk_delete(BulkDeleteRequest {
            paths: vec![
                "/Downloads/a.txt".to_string(),
                "/Downloads/missing.txt".to_string(),
                "/Downloads/b.txt".to_string(),
            ],
            permanent: true,
        })
        .await
        .unwrap();
    assert_eq!(
        deleted.succeeded,
        vec!["/Downloads/a.txt", "/Downloads/b.txt"]
    );
    assert_eq!(deleted.failed.len(), 1);
    assert_eq!(deleted.failed[0].path, "/Downloads/missing.txt");
    assert!(deleted.failed[0].error.contains("Node not found"));
}

#[tokio::test]
async fn empty_trash_reports_the_number_of_entries() {
    let h = harness();

    for name in ["x.txt", "y.txt"] {
        create_file(&h.service, "/Documents", name).await;
        h.service
            .delete_node(DeleteNodeRequest {
                path: format!("/Documents/{name}"),
                permanent: false,
            })
            .await
            .unwrap();
    }

    assert_eq!(h.service.empty_trash().await.unwrap(), 2);
    assert!(h.service.list_trash().await.unwrap().is_empty());
    assert_eq!(h.service.empty_trash().await.unwrap(), 0);
}

#[tokio::test]
async fn node_ids_are_stable_until_the_path_changes() {
    let h = harness();

    create_file(&h.service, "/Documents", "stable.txt").await;
    let first = h.service.get_node("/Documents/stable.txt").await.unwrap();
    let second = h.service.get_node("/Documents/stable.txt").await.unwrap();
    assert_eq!(first.id, second.id);

    let renamed = h
        .service
        .rename_node(RenameNodeRequest {
            path: "/Documents/stable.txt".to_string(),
            new_name: "renamed.txt".to_string(),
        })
        .await
        .unwrap();
    assert_ne!(renamed.node.id, first.id);
}

#[tokio::test]
async fn desktop_positions_appear_only_on_annotated_paths() {
    let h = harness();

    create_file(&h.service, "/Desktop", "pinned.txt").await;
    create_file(&h.service, "/Desktop", "loose.txt").await;

    let updated = h
        .service
        .update_desktop_positions(BatchUpdateDesktopPositionsRequest {
            positions: vec![
                DesktopPositionItem {
                    path: "/Desktop/pinned.txt".to_string(),
                    x: 120,
                    y: 48,
                },
                DesktopPositionItem {
                    path: "/Desktop/vanished.txt".to_string(),
                    x: 1,
                    y: 1,
                },
            ],
        })
        .await
        .unwrap();
    // The missing path is skipped, not an error.
    assert_eq!(updated.len(), 1);

    let tree = h.service.get_tree().await.unwrap();
    let pinned = find_node(&tree, "/Desktop/pinned.txt").unwrap();
    assert_eq!((pinned.desktop_x, pinned.desktop_y), (Some(120), Some(48)));
    let loose = find_node(&tree, "/Desktop/loose.txt").unwrap();
    assert_eq!((loose.desktop_x, loose.desktop_y), (None, None));
}

#[tokio::test]
async fn read_file_error_kinds() {
    let h = harness();

    assert!(matches!(
        h.service.read_file("/Documents/none.txt").await,
        Err(CoreError::NotFound(_))
    ));
    assert!(matches!(
        h.service.read_file("/Documents").await,
        Err(CoreError::Validation(_))
    ));
}

#[tokio::test]
async fn listing_sorts_by_the_requested_key() {
    let h = harness();

    create_file(&h.service, "/Documents", "banana.txt").await;
    create_file(&h.service, "/Documents", "Apple.txt").await;
    create_file(&h.service, "/Documents", "cherry.txt").await;

    let ascending = h
        .service
        .list_directory("/Documents", SortBy::Name, SortDir::Asc)
        .await
        .unwrap();
    let names: Vec<&str> = ascending.children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Apple.txt", "banana.txt", "cherry.txt"]);

    let descending = h
        .service
        .list_directory("/Documents", SortBy::Name, SortDir::Desc)
        .await
        .unwrap();
    let names: Vec<&str> = descending.children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["cherry.txt", "banana.txt", "Apple.txt"]);
}

#[tokio::test]
async fn search_is_case_insensitive_and_scoped() {
    let h = harness();

    create_file(&h.service, "/Documents", "Meeting Notes.txt").await;
    create_file(&h.service, "/Downloads", "notes-backup.txt").await;

    let all = h.service.search("notes", None).await.unwrap();
    assert_eq!(all.len(), 2);

    let scoped = h.service.search("notes", Some("/Documents")).await.unwrap();
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].path, "/Documents/Meeting Notes.txt");
}
