//! End-to-end tests for the authentication/lockout state machine through
//! the caller-facing service.

use secrecy::SecretString;

use snapvault_core::auth::{AuthError, PinHasher, ScryptParams};
use snapvault_core::store::{MemoryVaultStore, StoreError};
use snapvault_core::transfer::MemoryTransfer;
use snapvault_core::vault::{ExpiryPolicy, NewVault, ServiceError, VaultService};

fn service() -> VaultService<MemoryVaultStore, MemoryTransfer> {
    let hasher =
        PinHasher::with_params(ScryptParams::new(8, 4, 1, ScryptParams::RECOMMENDED_LEN).unwrap());
    VaultService::with_hasher(MemoryVaultStore::new(), MemoryTransfer::new(), hasher)
}

fn pin(s: &str) -> SecretString {
    SecretString::from(s.to_string())
}

fn new_vault(username: &str, pin_digits: &str) -> NewVault {
    NewVault {
        username: username.into(),
        display_name: None,
        pin: pin(pin_digits),
        expiry_policy: ExpiryPolicy::SevenDays,
    }
}

#[tokio::test]
async fn create_then_authenticate_round_trip() {
    let service = service();
    let created = service.create_vault(new_vault("ghost", "1234")).await.unwrap();
    assert_eq!(created.username, "ghost");
    assert_eq!(created.failed_attempts, 0);
    assert!(!created.is_locked);

    let opened = service.authenticate("ghost", &pin("1234")).await.unwrap();
    assert_eq!(opened.id, created.id);
    assert_eq!(opened.failed_attempts, 0);
}

#[tokio::test]
async fn usernames_are_normalised_and_unique() {
    let service = service();
    let created = service.create_vault(new_vault("  Ghost ", "1234")).await.unwrap();
    assert_eq!(created.username, "ghost");

    let err = service.create_vault(new_vault("GHOST", "9999")).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Store(StoreError::UsernameTaken)
    ));

    // Lookup matches any casing.
    service.authenticate("GhOsT", &pin("1234")).await.unwrap();
}

#[tokio::test]
async fn creation_enforces_username_and_pin_policy() {
    let service = service();
    assert!(matches!(
        service.create_vault(new_vault("ab", "1234")).await.unwrap_err(),
        ServiceError::UsernameTooShort
    ));
    assert!(matches!(
        service.create_vault(new_vault("ghost", "12")).await.unwrap_err(),
        ServiceError::Pin(_)
    ));
    assert!(matches!(
        service.create_vault(new_vault("ghost", "12ab")).await.unwrap_err(),
        ServiceError::Pin(_)
    ));
}

/// The spec scenario: four wrong PINs leave the vault open, the fifth locks
/// it, and from then on even the correct PIN is refused.
#[tokio::test]
async fn five_consecutive_failures_lock_permanently() {
    let service = service();
    let vault = service.create_vault(new_vault("ghost", "1234")).await.unwrap();

    for attempt in 1..=4u32 {
        let err = service.authenticate("ghost", &pin("0000")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Auth(AuthError::InvalidPin)));
        let current = service.vault_by_id(vault.id).await.unwrap().unwrap();
        assert_eq!(current.failed_attempts, attempt);
        assert!(!current.is_locked);
    }

    let err = service.authenticate("ghost", &pin("0000")).await.unwrap_err();
    assert!(matches!(err, ServiceError::Auth(AuthError::Locked)));

    let locked = service.vault_by_id(vault.id).await.unwrap().unwrap();
    assert!(locked.is_locked);
    assert_eq!(locked.failed_attempts, 5);

    let err = service.authenticate("ghost", &pin("1234")).await.unwrap_err();
    assert!(matches!(err, ServiceError::Auth(AuthError::Locked)));
}

#[tokio::test]
async fn success_resets_the_failure_counter() {
    let service = service();
    let vault = service.create_vault(new_vault("ghost", "1234")).await.unwrap();

    for _ in 0..4 {
        let _ = service.authenticate("ghost", &pin("0000")).await;
    }
    let opened = service.authenticate("ghost", &pin("1234")).await.unwrap();
    assert_eq!(opened.failed_attempts, 0);

    let current = service.vault_by_id(vault.id).await.unwrap().unwrap();
    assert_eq!(current.failed_attempts, 0);
    assert!(!current.is_locked);
}

#[tokio::test]
async fn unknown_usernames_are_distinguishable_from_lockouts() {
    let service = service();
    service.create_vault(new_vault("ghost", "1234")).await.unwrap();

    let err = service.authenticate("phantom", &pin("1234")).await.unwrap_err();
    assert!(matches!(err, ServiceError::Auth(AuthError::VaultNotFound)));
}

#[tokio::test]
async fn panic_lock_is_immediate_and_one_way() {
    let service = service();
    let vault = service.create_vault(new_vault("ghost", "1234")).await.unwrap();

    let locked = service.panic_lock(&vault).await.unwrap();
    assert!(locked.is_locked);
    // The counter played no part.
    assert_eq!(locked.failed_attempts, 0);

    let err = service.authenticate("ghost", &pin("1234")).await.unwrap_err();
    assert!(matches!(err, ServiceError::Auth(AuthError::Locked)));
}

#[tokio::test]
async fn view_only_blocks_byte_extraction_but_not_settings() {
    let service = service();
    let vault = service.create_vault(new_vault("ghost", "1234")).await.unwrap();

    let vault = service.toggle_view_only(&vault).await.unwrap();
    assert!(vault.is_view_only);

    let err = service
        .export_assets(&vault, &snapvault_core::vault::ExportSelection::All)
        .unwrap_err();
    assert!(matches!(err, ServiceError::ViewOnly));

    // Reads and settings changes stay available.
    assert!(service.vault_by_id(vault.id).await.unwrap().is_some());
    let vault = service.rename_vault(&vault, "still mine").await.unwrap();
    assert_eq!(vault.display_name.as_deref(), Some("still mine"));

    let vault = service.toggle_view_only(&vault).await.unwrap();
    assert!(!vault.is_view_only);
    service
        .export_assets(&vault, &snapvault_core::vault::ExportSelection::All)
        .unwrap();
}

#[tokio::test]
async fn deletion_is_total() {
    let service = service();
    let vault = service.create_vault(new_vault("ghost", "1234")).await.unwrap();

    service.delete_vault(&vault).await.unwrap();
    assert!(service.vault_by_id(vault.id).await.unwrap().is_none());
    let err = service.authenticate("ghost", &pin("1234")).await.unwrap_err();
    assert!(matches!(err, ServiceError::Auth(AuthError::VaultNotFound)));

    // The username is free to claim again.
    service.create_vault(new_vault("ghost", "4321")).await.unwrap();
}
