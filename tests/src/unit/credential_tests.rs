use mindbridge_core::security::{ACCESS_TOKEN, REFRESH_TOKEN};
use mindbridge_core::{CredentialStore, LocalStore};
use std::fs;
use tempfile::TempDir;

#[test]
fn tokens_are_not_written_in_plain_text() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let store = LocalStore::open(temp_dir.path())?;
    let credentials = CredentialStore::new(store);
    credentials.set_token(ACCESS_TOKEN, "super-secret-access");

    let on_disk = fs::read_to_string(temp_dir.path().join("_sec_access_token.item"))?;
    assert!(!on_disk.contains("super-secret-access"));
    assert!(!on_disk.is_empty());
    Ok(())
}

#[test]
fn tokens_survive_a_restart_and_clear_together() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    {
        let credentials = CredentialStore::new(LocalStore::open(temp_dir.path())?);
        credentials.set_token(ACCESS_TOKEN, "a");
        credentials.set_token(REFRESH_TOKEN, "r");
    }

    let store = LocalStore::open(temp_dir.path())?;
    store.set_item("device_id", "device_1")?;
    let credentials = CredentialStore::new(store.clone());
    assert_eq!(credentials.get_token(ACCESS_TOKEN).as_deref(), Some("a"));
    assert_eq!(credentials.get_token(REFRESH_TOKEN).as_deref(), Some("r"));

    credentials.clear_all();

    let fresh = CredentialStore::new(store.clone());
    assert_eq!(fresh.get_token(ACCESS_TOKEN), None);
    assert_eq!(fresh.get_token(REFRESH_TOKEN), None);
    assert_eq!(store.keys()?, vec!["device_id".to_string()]);
    Ok(())
}

#[test]
fn tampered_backup_reads_as_missing() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    fs::write(temp_dir.path().join("_sec_access_token.item"), "not*base64")?;

    let credentials = CredentialStore::new(LocalStore::open(temp_dir.path())?);
    assert_eq!(credentials.get_token(ACCESS_TOKEN), None);
    Ok(())
}
