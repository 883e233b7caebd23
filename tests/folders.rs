mod common;

#[cfg(test)]
mod tests {
    use folio::error::ErrorKind;
    use uuid::Uuid;

    use crate::common::{self, upload};

    #[tokio::test]
    async fn sibling_names_are_unique() {
        let s = common::setup().await;
        let c = &s.catalog;

        let y2024 = c.create_folder("2024", None).await.unwrap();
        let y2025 = c.create_folder("2025", None).await.unwrap();

        // roots are siblings too
        let err = c.create_folder("2024", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        // names are trimmed before checking
        let err = c.create_folder("  2024 ", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        c.create_folder("Spring", Some(y2024.id)).await.unwrap();
        let err = c.create_folder("Spring", Some(y2024.id)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        // ...but the same name under another parent is fine
        c.create_folder("Spring", Some(y2025.id))
            .await
            .expect("different parents don't clash");
    }

    #[tokio::test]
    async fn bad_folder_input() {
        let s = common::setup().await;
        let c = &s.catalog;

        let err = c.create_folder("   ", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = c
            .create_folder("Orphan", Some(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn resolves_full_paths() {
        let s = common::setup().await;
        let c = &s.catalog;

        let year = c.create_folder("2024", None).await.unwrap();
        let spring = c.create_folder("Spring", Some(year.id)).await.unwrap();

        assert_eq!(c.resolve_path(spring.id).await.unwrap(), ["2024", "Spring"]);
        assert_eq!(c.resolve_path(year.id).await.unwrap(), ["2024"]);

        let err = c.resolve_path(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn tree_is_sorted_by_name() {
        let s = common::setup().await;
        let c = &s.catalog;

        let b = c.create_folder("b", None).await.unwrap();
        c.create_folder("a", None).await.unwrap();
        c.create_folder("z", Some(b.id)).await.unwrap();
        c.create_folder("m", Some(b.id)).await.unwrap();

        let tree = c.folder_tree().await.unwrap();
        let roots: Vec<&str> = tree.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(roots, ["a", "b"]);

        let b_node = &tree[1];
        assert_eq!(b_node.id, b.id);
        let kids: Vec<&str> = b_node.children.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(kids, ["m", "z"]);
        assert!(b_node.children.iter().all(|n| n.parent_id == Some(b.id)));
    }

    #[tokio::test]
    async fn children_dont_recurse() {
        let s = common::setup().await;
        let c = &s.catalog;

        let year = c.create_folder("2024", None).await.unwrap();
        let spring = c.create_folder("Spring", Some(year.id)).await.unwrap();
        let autumn = c.create_folder("Autumn", Some(year.id)).await.unwrap();
        let week = c.create_folder("Week 1", Some(spring.id)).await.unwrap();

        let top = upload(c, "top.pdf", &[], &[year.id]).await;
        upload(c, "deep.pdf", &[], &[week.id]).await;

        let children = c.folder_children(year.id).await.unwrap();
        let names: Vec<&str> = children.folders.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["Autumn", "Spring"]);
        assert_eq!(children.folders[0].id, autumn.id);

        assert_eq!(children.files.len(), 1);
        assert_eq!(children.files[0].id, top.file_id);

        let err = c.folder_children(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn deleting_a_folder_takes_its_subtree() {
        let s = common::setup().await;
        let c = &s.catalog;

        let year = c.create_folder("2024", None).await.unwrap();
        let spring = c.create_folder("Spring", Some(year.id)).await.unwrap();
        let week = c.create_folder("Week 1", Some(spring.id)).await.unwrap();
        let keep = c.create_folder("Keep", None).await.unwrap();

        let file = upload(c, "etude.pdf", &[], &[week.id, keep.id]).await;

        let deleted = c.delete_folder(year.id).await.unwrap();
        assert_eq!(deleted.len(), 3);
        assert_eq!(deleted[0], year.id);
        assert!(deleted.contains(&spring.id));
        assert!(deleted.contains(&week.id));

        // the file stays, minus the deleted memberships
        let fetched = c.file(file.file_id).await.unwrap();
        assert_eq!(fetched.folders.len(), 1);
        assert_eq!(fetched.folders[0].id, keep.id);

        let tree = c.folder_tree().await.unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].id, keep.id);

        // the name is free again
        c.create_folder("2024", None).await.unwrap();

        let err = c.delete_folder(spring.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn deleting_a_wide_folder() {
        let s = common::setup().await;
        let c = &s.catalog;

        let root = c.create_folder("Archive", None).await.unwrap();
        sqlx::query(
            "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 1200)
            INSERT INTO folders (id, name, parent_id, created_at)
            SELECT randomblob(16), 'box_' || i, $1, '2024-01-01T00:00:00+00:00'
            FROM n",
        )
        .bind(root.id)
        .execute(c.pool())
        .await
        .unwrap();

        let deleted = c.delete_folder(root.id).await.unwrap();
        assert_eq!(deleted.len(), 1_201);
        assert_eq!(deleted[0], root.id);
        assert!(c.folder_tree().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_folders_by_name() {
        let s = common::setup().await;
        let c = &s.catalog;

        let year = c.create_folder("2024", None).await.unwrap();
        let spring = c.create_folder("Spring", Some(year.id)).await.unwrap();
        c.create_folder("Summer", Some(year.id)).await.unwrap();
        let odd = c.create_folder("100% done", None).await.unwrap();

        let hits = c.search_folders("spr").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, spring.id);
        assert_eq!(hits[0].parent_id, Some(year.id));
        assert_eq!(hits[0].full_path, ["2024", "Spring"]);

        // `%` is a literal, not a wildcard
        let hits = c.search_folders("%").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, odd.id);

        assert!(c.search_folders("winter").await.unwrap().is_empty());

        let err = c.search_folders("  ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
