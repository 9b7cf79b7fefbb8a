#![allow(clippy::unwrap_used)]

mod common;

use common::{client, json, page_body, parse_q, query_param, ScriptedHttp};
use http::StatusCode;

use gdrive::query::Query;
use gdrive::ROOT_ID;

/// Fixture: `(parent, id, name, is_folder)` rows answered per list call.
fn drive_fixture(
    rows: Vec<(&'static str, &'static str, &'static str, bool)>,
) -> ScriptedHttp {
    ScriptedHttp::new(move |req, _| {
        let q = query_param(req, "q").unwrap();
        let parsed = parse_q(q);
        let parent = parsed.parent.unwrap();
        let matches: Vec<(&str, &str, bool)> = rows
            .iter()
            .filter(|(p, _, name, is_dir)| {
                *p == parent
                    && parsed.name.as_deref().is_none_or(|n| n == *name)
                    && (!parsed.folders_only || *is_dir)
            })
            .map(|(_, id, name, is_dir)| (*id, *name, *is_dir))
            .collect();
        json(StatusCode::OK, &page_body(&matches, None))
    })
}

#[tokio::test]
async fn empty_and_root_paths_resolve_to_the_root_alias() {
    let drive = client(drive_fixture(vec![]));
    for path in ["", "/", "foo/../"] {
        let id = drive.find_file(path, Query::new()).await.unwrap();
        assert_eq!(id.as_deref(), Some(ROOT_ID), "path {path:?}");
    }
}

#[tokio::test]
async fn resolves_a_nested_path() {
    let drive = client(drive_fixture(vec![
        (ROOT_ID, "d1", "backup", true),
        ("d1", "d2", "photos", true),
        ("d2", "f1", "cat.jpg", false),
    ]));

    let id = drive
        .find_file("/backup/photos/cat.jpg", Query::new())
        .await
        .unwrap();
    assert_eq!(id.as_deref(), Some("f1"));
}

#[tokio::test]
async fn missing_component_yields_none() {
    let drive = client(drive_fixture(vec![(ROOT_ID, "d1", "backup", true)]));

    let id = drive.find_file("/backup/nope", Query::new()).await.unwrap();
    assert_eq!(id, None);
}

#[tokio::test]
async fn searches_every_same_name_sibling() {
    // Two folders both named `data`; only the second contains the target.
    let drive = client(drive_fixture(vec![
        (ROOT_ID, "d1", "data", true),
        (ROOT_ID, "d2", "data", true),
        ("d2", "f1", "target.csv", false),
    ]));

    let id = drive
        .find_file("/data/target.csv", Query::new())
        .await
        .unwrap();
    assert_eq!(id.as_deref(), Some("f1"));
}

#[tokio::test]
async fn leaf_query_filters_the_terminal_component() {
    // A file and a folder share the leaf name; the folder filter must win.
    let drive = client(drive_fixture(vec![
        (ROOT_ID, "f9", "stuff", false),
        (ROOT_ID, "d9", "stuff", true),
    ]));

    let id = drive
        .find_file("/stuff", Query::new().folders_only())
        .await
        .unwrap();
    assert_eq!(id.as_deref(), Some("d9"));
}

#[tokio::test]
async fn intermediate_components_only_match_folders() {
    // `data` exists as a file; it must not be descended into.
    let drive = client(drive_fixture(vec![(ROOT_ID, "f1", "data", false)]));

    let id = drive.find_file("/data/x", Query::new()).await.unwrap();
    assert_eq!(id, None);
}
