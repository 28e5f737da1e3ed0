// Integration tests for the on-disk transcript archive

use anyhow::Result;
use live_voice::{
    ArchiveError, JsonFileArchive, Speaker, Transcript, TranscriptArchive, TranscriptMessage,
};
use tempfile::TempDir;

fn transcript(lines: &[(Speaker, &str)]) -> Transcript {
    Transcript::from(
        lines
            .iter()
            .enumerate()
            .map(|(i, (speaker, text))| TranscriptMessage {
                id: i as u64 + 1,
                speaker: *speaker,
                text: text.to_string(),
                is_partial: false,
            })
            .collect::<Vec<_>>(),
    )
}

#[tokio::test]
async fn test_missing_file_lists_empty() -> Result<()> {
    let dir = TempDir::new()?;
    let archive = JsonFileArchive::new(dir.path().join("transcripts.json"));

    assert!(archive.list().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_save_persists_across_instances() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("nested").join("transcripts.json");

    let first = JsonFileArchive::new(&path)
        .save(transcript(&[(Speaker::User, "Hi"), (Speaker::Agent, "Hello!")]))
        .await?;
    let second = JsonFileArchive::new(&path)
        .save(transcript(&[(Speaker::User, "Bye")]))
        .await?;

    let entries = JsonFileArchive::new(&path).list().await?;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].id, second.id, "newest entry comes first");
    assert_eq!(entries[1], first);
    assert_eq!(entries[1].messages[1].speaker, Speaker::Agent);
    Ok(())
}

#[tokio::test]
async fn test_partial_transcript_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let archive = JsonFileArchive::new(dir.path().join("transcripts.json"));

    let mut messages = transcript(&[(Speaker::User, "Hello")]).into_messages();
    messages.push(TranscriptMessage {
        id: 2,
        speaker: Speaker::Agent,
        text: "Hel".to_string(),
        is_partial: true,
    });

    let err = archive.save(Transcript::from(messages)).await.unwrap_err();
    assert!(matches!(err, ArchiveError::NotFinalized(2)));
    assert!(archive.list().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_delete_and_clear() -> Result<()> {
    let dir = TempDir::new()?;
    let archive = JsonFileArchive::new(dir.path().join("transcripts.json"));

    let keep = archive.save(transcript(&[(Speaker::User, "keep")])).await?;
    let drop = archive.save(transcript(&[(Speaker::User, "drop")])).await?;

    archive.delete(&drop.id).await?;
    let ids: Vec<String> = archive.list().await?.into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![keep.id.clone()]);

    assert!(matches!(
        archive.delete("no-such-entry").await,
        Err(ArchiveError::NotFound(_))
    ));

    archive.clear().await?;
    assert!(archive.list().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_corrupt_file_is_an_error() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("transcripts.json");
    std::fs::write(&path, "not json")?;

    let archive = JsonFileArchive::new(&path);
    assert!(matches!(archive.list().await, Err(ArchiveError::Serde(_))));
    Ok(())
}
