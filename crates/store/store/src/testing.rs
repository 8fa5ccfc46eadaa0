use std::time::Duration;

use crate::error::StoreError;
use crate::script::AtomicScript;
use crate::store::{KeyValueStore, SetOptions};

/// Run the full key-value store conformance test suite.
///
/// Call this from your backend's test module with a fresh store instance.
///
/// # Errors
///
/// Returns an error if any conformance test fails.
pub async fn run_store_conformance_tests(store: &dyn KeyValueStore) -> Result<(), StoreError> {
    test_get_missing(store).await?;
    test_set_and_get(store).await?;
    test_set_overwrites(store).await?;
    test_set_if_not_exists_new(store).await?;
    test_set_if_not_exists_existing(store).await?;
    test_set_with_expiry(store).await?;
    test_delete(store).await?;
    test_compare_and_delete_owner(store).await?;
    test_compare_and_delete_foreign(store).await?;
    test_compare_and_delete_missing(store).await?;
    Ok(())
}

async fn test_get_missing(store: &dyn KeyValueStore) -> Result<(), StoreError> {
    let val = store.get("conformance:missing").await?;
    assert!(val.is_none(), "get on missing key should return None");
    Ok(())
}

async fn test_set_and_get(store: &dyn KeyValueStore) -> Result<(), StoreError> {
    let written = store
        .set("conformance:set-get", b"hello", SetOptions::new())
        .await?;
    assert!(written, "plain set should report a write");
    let val = store.get("conformance:set-get").await?;
    assert_eq!(val.as_deref(), Some(&b"hello"[..]));
    Ok(())
}

async fn test_set_overwrites(store: &dyn KeyValueStore) -> Result<(), StoreError> {
    let key = "conformance:overwrite";
    store.set(key, b"v1", SetOptions::new()).await?;
    store.set(key, b"v2", SetOptions::new()).await?;
    let val = store.get(key).await?;
    assert_eq!(val.as_deref(), Some(&b"v2"[..]), "last write should win");
    Ok(())
}

async fn test_set_if_not_exists_new(store: &dyn KeyValueStore) -> Result<(), StoreError> {
    let key = "conformance:nx-new";
    let opts = SetOptions::new()
        .expire(Duration::from_secs(60))
        .only_if_not_exists();
    let written = store.set(key, b"owner-a", opts).await?;
    assert!(written, "NX set on new key should succeed");
    let val = store.get(key).await?;
    assert_eq!(val.as_deref(), Some(&b"owner-a"[..]));
    Ok(())
}

async fn test_set_if_not_exists_existing(store: &dyn KeyValueStore) -> Result<(), StoreError> {
    let key = "conformance:nx-existing";
    store.set(key, b"owner-a", SetOptions::new()).await?;
    let written = store
        .set(key, b"owner-b", SetOptions::new().only_if_not_exists())
        .await?;
    assert!(!written, "NX set on existing key should not write");
    let val = store.get(key).await?;
    assert_eq!(
        val.as_deref(),
        Some(&b"owner-a"[..]),
        "original value should remain"
    );
    Ok(())
}

async fn test_set_with_expiry(store: &dyn KeyValueStore) -> Result<(), StoreError> {
    let key = "conformance:setex";
    let written = store
        .set_with_expiry(key, b"ephemeral", Duration::from_secs(3600))
        .await?;
    assert!(written);
    let val = store.get(key).await?;
    assert_eq!(val.as_deref(), Some(&b"ephemeral"[..]));
    Ok(())
}

async fn test_delete(store: &dyn KeyValueStore) -> Result<(), StoreError> {
    let key = "conformance:delete";
    store.set(key, b"bye", SetOptions::new()).await?;
    let removed = store.delete(key).await?;
    assert_eq!(removed, 1, "delete should remove the existing key");
    assert!(store.get(key).await?.is_none(), "get after delete should return None");

    let removed = store.delete(key).await?;
    assert_eq!(removed, 0, "delete on missing key should remove nothing");
    Ok(())
}

async fn test_compare_and_delete_owner(store: &dyn KeyValueStore) -> Result<(), StoreError> {
    let key = "conformance:cad-owner";
    store.set(key, b"token-1", SetOptions::new()).await?;
    let result = store
        .eval(&AtomicScript::COMPARE_AND_DELETE, &[key], &["token-1"])
        .await?;
    assert_eq!(result, 1, "owner should be able to delete");
    assert!(store.get(key).await?.is_none());
    Ok(())
}

async fn test_compare_and_delete_foreign(store: &dyn KeyValueStore) -> Result<(), StoreError> {
    let key = "conformance:cad-foreign";
    store.set(key, b"token-b", SetOptions::new()).await?;
    let result = store
        .eval(&AtomicScript::COMPARE_AND_DELETE, &[key], &["token-a"])
        .await?;
    assert_eq!(result, 0, "a foreign token must not delete the key");
    let val = store.get(key).await?;
    assert_eq!(val.as_deref(), Some(&b"token-b"[..]));
    Ok(())
}

async fn test_compare_and_delete_missing(store: &dyn KeyValueStore) -> Result<(), StoreError> {
    let result = store
        .eval(
            &AtomicScript::COMPARE_AND_DELETE,
            &["conformance:cad-missing"],
            &["token-a"],
        )
        .await?;
    assert_eq!(result, 0, "compare-and-delete on a missing key is a no-op");
    Ok(())
}
