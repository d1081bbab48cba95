use std::collections::BTreeMap;

use serial_test::serial;

use exhibit_migrate::asset_id::derive_asset_id;
use exhibit_migrate::asset_index::AssetIndex;
use exhibit_migrate::contentful::{MockContentPlatform, NewAsset, RemoteAsset, RemoteEntry};
use exhibit_migrate::credits::{migrate_credits, publish_credits, CreditOutcome};
use exhibit_migrate::essence::{EssenceKind, EssenceRef};
use exhibit_migrate::images::{migrate_images, ImageOutcome};
use exhibit_migrate::store::{MockContentStore, PageRow, PictureRow};

const IMAGE_SERVER: &str = "https://images.example.org/show?uid=";

fn picture_row(uid: &str, title: Option<&str>, file_name: &str, format: Option<&str>) -> PictureRow {
    PictureRow {
        uid: uid.to_string(),
        title: title.map(str::to_string),
        file_name: file_name.to_string(),
        format: format.map(str::to_string),
    }
}

fn publishing_platform() -> MockContentPlatform {
    let mut platform = MockContentPlatform::new();
    platform
        .expect_create_asset_with_id()
        .returning(|asset_id, _fields: NewAsset| {
            Ok(RemoteAsset {
                id: asset_id.to_string(),
                version: 1,
            })
        });
    platform
        .expect_process_asset_for_all_locales()
        .returning(|asset| {
            Ok(RemoteAsset {
                id: asset.id.clone(),
                version: asset.version + 1,
            })
        });
    platform.expect_publish_asset().returning(|_| Ok(()));
    platform
}

#[tokio::test]
#[serial]
async fn image_migration_uploads_only_absent_assets() {
    let mut store = MockContentStore::new();
    store.expect_pictures().returning(|| {
        Ok(vec![
            picture_row("already-there", Some("Old"), "old.jpg", Some("jpeg")),
            picture_row("brand-new", Some("New"), "new.png", Some("png")),
        ])
    });

    let mut platform = MockContentPlatform::new();
    platform
        .expect_create_asset_with_id()
        .times(1)
        .withf(|asset_id: &str, _| asset_id == derive_asset_id("brand-new"))
        .returning(|asset_id, _| {
            Ok(RemoteAsset {
                id: asset_id.to_string(),
                version: 1,
            })
        });
    platform
        .expect_process_asset_for_all_locales()
        .times(1)
        .returning(|asset| Ok(asset.clone()));
    platform.expect_publish_asset().times(1).returning(|_| Ok(()));

    let index = AssetIndex::from_ids([derive_asset_id("already-there")]);
    let report = migrate_images(&store, &platform, &index, IMAGE_SERVER)
        .await
        .expect("image migration should succeed");

    assert_eq!(report.existing, 1);
    assert_eq!(report.published, 1);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
#[serial]
async fn second_run_is_a_no_op_once_the_index_reflects_the_first() {
    let row = picture_row("abc123", None, "sunset.jpg", Some("jpeg"));

    // First run: the index has never seen the uid, so exactly one
    // creation happens.
    let mut store = MockContentStore::new();
    store.expect_pictures().returning({
        let row = row.clone();
        move || Ok(vec![row.clone()])
    });

    let platform = publishing_platform();
    let empty_index = AssetIndex::default();
    let first = migrate_images(&store, &platform, &empty_index, IMAGE_SERVER)
        .await
        .unwrap();
    assert_eq!(first.published, 1);

    // Second run with a refreshed index: no remote write happens at
    // all; the mock would panic on any platform call.
    let refreshed = AssetIndex::from_ids([derive_asset_id("abc123")]);
    let silent_platform = MockContentPlatform::new();
    let second = migrate_images(&store, &silent_platform, &refreshed, IMAGE_SERVER)
        .await
        .unwrap();
    assert_eq!(second.published, 0);
    assert_eq!(second.existing, 1);
    assert!(matches!(
        second.outcomes[0],
        ImageOutcome::AlreadyExists { .. }
    ));
}

#[tokio::test]
#[serial]
async fn credit_documents_are_assembled_per_locale_and_published() {
    let mut store = MockContentStore::new();
    store.expect_credit_pages().returning(|| {
        Ok(vec![
            PageRow {
                urlname: "monet/credits".to_string(),
                language_code: "de".to_string(),
                essences: vec![EssenceRef {
                    kind: EssenceKind::Text,
                    id: 1,
                }],
            },
            PageRow {
                urlname: "monet/credits".to_string(),
                language_code: "en".to_string(),
                essences: vec![EssenceRef {
                    kind: EssenceKind::Text,
                    id: 2,
                }],
            },
        ])
    });
    store.expect_essence_text().returning(|id| {
        Ok(Some(match id {
            1 => "Leihgeber".to_string(),
            _ => "Lenders".to_string(),
        }))
    });

    let mut platform = MockContentPlatform::new();
    platform
        .expect_find_entry()
        .withf(|content_type, locale, identifier| {
            content_type == "exhibitionPage" && locale == "en-GB" && identifier == "monet"
        })
        .returning(|_, _, _| {
            Ok(Some(RemoteEntry {
                id: "entry-1".to_string(),
                version: 5,
                fields: serde_json::Map::new(),
            }))
        });
    platform
        .expect_update_entry()
        .withf(|entry: &RemoteEntry| {
            let credits = entry.fields.get("credits").and_then(|v| v.as_object());
            credits.is_some_and(|c| {
                c.get("de-DE").and_then(|v| v.as_str()) == Some("## Leihgeber\n")
                    && c.get("en-GB").and_then(|v| v.as_str()) == Some("## Lenders\n")
            })
        })
        .returning(|entry| {
            Ok(RemoteEntry {
                id: entry.id.clone(),
                version: entry.version + 1,
                fields: entry.fields.clone(),
            })
        });
    platform.expect_publish_entry().returning(|_| Ok(()));

    let index = AssetIndex::default();
    let report = migrate_credits(&store, &platform, &index)
        .await
        .expect("credit migration should succeed");

    assert_eq!(report.published, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
#[serial]
async fn documents_without_a_remote_entry_are_skipped_not_failed() {
    let mut store = MockContentStore::new();
    store.expect_credit_pages().returning(|| {
        Ok(vec![PageRow {
            urlname: "unknown-exhibition/credits".to_string(),
            language_code: "en".to_string(),
            essences: vec![EssenceRef {
                kind: EssenceKind::Text,
                id: 1,
            }],
        }])
    });

    let mut platform = MockContentPlatform::new();
    platform.expect_find_entry().returning(|_, _, _| Ok(None));

    let index = AssetIndex::default();
    let report = migrate_credits(&store, &platform, &index).await.unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(report.published, 0);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
#[serial]
async fn one_failing_document_does_not_abort_its_siblings() {
    let mut store = MockContentStore::new();
    store
        .expect_essence_text()
        .returning(|_| Ok(Some("Thanks".to_string())));

    let mut platform = MockContentPlatform::new();
    platform.expect_find_entry().returning(|_, _, identifier| {
        Ok(Some(RemoteEntry {
            id: format!("entry-{identifier}"),
            version: 1,
            fields: serde_json::Map::new(),
        }))
    });
    platform.expect_update_entry().returning(|entry| {
        Ok(RemoteEntry {
            id: entry.id.clone(),
            version: entry.version + 1,
            fields: entry.fields.clone(),
        })
    });
    platform.expect_publish_entry().returning(|entry| {
        if entry.id == "entry-flaky" {
            Err("upstream rejected the publish".into())
        } else {
            Ok(())
        }
    });

    let index = AssetIndex::default();
    let refs = vec![EssenceRef {
        kind: EssenceKind::Text,
        id: 1,
    }];
    let per_locale = BTreeMap::from([("en".to_string(), refs)]);

    let flaky = publish_credits(&store, &platform, &index, "flaky", &per_locale)
        .await
        .unwrap();
    assert!(matches!(flaky, CreditOutcome::Failed { .. }));

    let healthy = publish_credits(&store, &platform, &index, "healthy", &per_locale)
        .await
        .unwrap();
    assert!(matches!(healthy, CreditOutcome::Published { .. }));
}

#[tokio::test]
#[serial]
async fn unknown_essence_type_aborts_the_credit_run() {
    let mut store = MockContentStore::new();
    store.expect_credit_pages().returning(|| {
        Ok(vec![PageRow {
            urlname: "monet/credits".to_string(),
            language_code: "en".to_string(),
            essences: vec![EssenceRef {
                kind: EssenceKind::Unknown("Alchemy::EssenceHtml".to_string()),
                id: 9,
            }],
        }])
    });

    let mut platform = MockContentPlatform::new();
    platform.expect_find_entry().returning(|_, _, _| {
        Ok(Some(RemoteEntry {
            id: "entry-1".to_string(),
            version: 1,
            fields: serde_json::Map::new(),
        }))
    });

    let index = AssetIndex::default();
    let err = migrate_credits(&store, &platform, &index)
        .await
        .expect_err("an unknown essence type must be fatal");
    assert!(err.to_string().contains("Alchemy::EssenceHtml"));
}
