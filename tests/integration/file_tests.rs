use anyhow::Result;
use chrono::Utc;
use shopware_mediafs::error::MediaFsError;
use shopware_mediafs::fs::{Filesystem, HashType, Precision};

use crate::common::setup;

#[tokio::test]
async fn test_put_twice_creates_one_record() -> Result<()> {
    let (mock, fs) = setup().await?;

    let first = fs.put("notes/today.txt", b"first draft", None).await?;
    let second = fs.put("notes/today.txt", b"second, longer draft", None).await?;

    assert_eq!(first.id(), second.id());
    assert_eq!(mock.get_call_count("create_media"), 1);
    assert_eq!(mock.get_call_count("upload_media"), 2);
    assert_eq!(mock.all_media().len(), 1);

    assert_eq!(second.size(), 20);
    assert_eq!(second.open().await?, b"second, longer draft");
    Ok(())
}

#[tokio::test]
async fn test_new_object_and_open() -> Result<()> {
    let (mock, fs) = setup().await?;
    let photos = mock.add_folder(None, "photos");
    let id = mock.add_media(Some(&photos), "cat", "jpg", b"not really a jpeg");

    let object = fs.new_object("photos/cat.jpg").await?;
    assert_eq!(object.id(), id);
    assert_eq!(object.name(), "cat.jpg");
    assert_eq!(object.remote(), "photos/cat.jpg");
    assert_eq!(object.size(), 17);
    assert_eq!(object.to_string(), "cat.jpg");
    assert_eq!(object.open().await?, b"not really a jpeg");

    // same base name, different extension
    let err = fs.new_object("photos/cat.png").await.unwrap_err();
    assert!(matches!(err, MediaFsError::ObjectNotFound(ref path) if path == "photos/cat.png"));

    let err = fs.new_object("elsewhere/cat.jpg").await.unwrap_err();
    assert!(err.is_not_found());
    Ok(())
}

#[tokio::test]
async fn test_item_without_content_found_by_original_name() -> Result<()> {
    let (mock, fs) = setup().await?;
    // upload never happens, so only the recorded original name can match
    mock.fail_next("upload_media", &[400]);
    mock.fail_next("delete_media", &[400]);

    let err = fs.put("draft.txt", b"lost", None).await.unwrap_err();
    assert!(matches!(err.root_cause(), MediaFsError::ExtensionNotAllowed(_)));
    assert_eq!(mock.all_media().len(), 1);

    let orphan = fs.new_object("draft.txt").await?;
    assert_eq!(orphan.size(), 0);
    assert!(orphan.open().await.unwrap_err().is_not_found());

    // listed under the same name, never as the directory itself
    let entries = fs.list("").await?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name(), "draft.txt");
    assert_eq!(entries[0].remote(), "draft.txt");
    assert!(!entries[0].is_dir());
    Ok(())
}

#[tokio::test]
async fn test_get_media_reads_metadata_by_id() -> Result<()> {
    let (mock, fs) = setup().await?;
    let docs = mock.add_folder(None, "docs");
    let id = mock.add_media(Some(&docs), "manual", "pdf", b"%PDF-1.7");

    let item = fs.client().get_media(&id).await?;
    assert_eq!(item.id, id);
    assert_eq!(item.display_name(), "manual.pdf");
    assert_eq!(item.file_size, Some(8));
    assert_eq!(item.media_folder_id.as_deref(), Some(docs.as_str()));
    assert_eq!(mock.get_call_count("get_media"), 1);

    let err = fs.client().get_media("0123456789abcdef").await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(mock.get_call_count("get_media"), 2);
    Ok(())
}

#[tokio::test]
async fn test_failed_refresh_names_the_file() -> Result<()> {
    let (mock, fs) = setup().await?;
    mock.add_media(None, "log", "txt", b"old");

    let mut object = fs.new_object("log.txt").await?;
    mock.fail_next("search_media", &[400]);
    let err = object.update(b"new content").await.unwrap_err();

    assert!(err.to_string().starts_with("couldn't refresh log.txt"), "{}", err);
    assert_eq!(err.status(), Some(400));
    assert_eq!(mock.get_call_count("upload_media"), 1);
    Ok(())
}

#[tokio::test]
async fn test_put_without_extension_makes_no_remote_call() -> Result<()> {
    let (mock, fs) = setup().await?;

    for name in ["README", "dir/Makefile", ".hidden", "trailing."] {
        let err = fs.put(name, b"data", None).await.unwrap_err();
        assert!(
            matches!(err, MediaFsError::ExtensionNotAllowed(_)),
            "{} gave {:?}",
            name,
            err
        );
    }
    assert!(mock.requests().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_rejected_extension_is_not_retried_and_cleaned_up() -> Result<()> {
    let (mock, fs) = setup().await?;

    let err = fs.put("tool.exe", b"MZ", None).await.unwrap_err();
    assert!(matches!(err.root_cause(), MediaFsError::ExtensionNotAllowed(ext) if ext == "exe"));
    assert_eq!(mock.get_call_count("upload_media"), 1);

    assert_eq!(mock.get_call_count("create_media"), 1);
    assert_eq!(mock.get_call_count("delete_media"), 1);
    assert!(mock.all_media().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_failed_upload_removes_orphaned_record() -> Result<()> {
    let (mock, fs) = setup().await?;
    mock.fail_next("upload_media", &[500; 5]);

    let err = fs.put("report.pdf", b"%PDF", None).await.unwrap_err();
    assert!(matches!(
        err.root_cause(),
        MediaFsError::RetriesExhausted { attempts: 5, .. }
    ));
    assert_eq!(err.status(), Some(500));
    assert_eq!(mock.get_call_count("upload_media"), 5);
    assert!(mock.all_media().is_empty());

    // the next attempt starts from scratch
    let object = fs.put("report.pdf", b"%PDF", None).await?;
    assert_eq!(object.size(), 4);
    assert_eq!(mock.get_call_count("create_media"), 2);
    Ok(())
}

#[tokio::test]
async fn test_delete() -> Result<()> {
    let (mock, fs) = setup().await?;
    fs.put("a/b.txt", b"bye", None).await?;

    fs.delete("a/b.txt").await?;
    assert!(mock.all_media().is_empty());
    assert!(fs.new_object("a/b.txt").await.unwrap_err().is_not_found());
    assert!(fs.delete("a/b.txt").await.unwrap_err().is_not_found());

    // the directory stays
    assert!(fs.list("a").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_object_capabilities() -> Result<()> {
    let (_mock, fs) = setup().await?;
    let mut object = fs.put("x.txt", b"x", None).await?;

    assert!(object.storable());
    assert!(matches!(
        object.hash(HashType::Md5),
        Err(MediaFsError::HashUnsupported)
    ));
    assert!(matches!(
        object.set_mod_time(Utc::now()),
        Err(MediaFsError::ModTimeNotSettable)
    ));
    assert!(object.url().is_some());

    assert_eq!(fs.precision(), Precision::NotSupported);
    assert!(fs.hashes().is_empty());
    assert!(fs.features().can_have_empty_directories);
    assert!(!fs.features().can_set_mod_time);
    assert_eq!(fs.name(), "test");
    Ok(())
}
