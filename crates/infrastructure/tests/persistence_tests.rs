//! Integration tests for the mail stores using in-memory SQLite databases
//!
//! The last section drives a full POP3 sync through `EmailService` against a
//! scripted server on a local socket.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use std::sync::Arc;

use application::{
    EmailService, SyncOptions,
    ports::{AccountStorePort, CredentialCipherPort, EmailQuery, MessageStorePort},
};
use chrono::{Duration, Utc};
use domain::{
    AccountId, EmailAccount, EmailAddress, EmailMessage, EmailProvider, SENT_FOLDER,
    ServerEndpoint, UserId,
};
use infrastructure::{
    AesGcmCredentialCipher, AsyncAccountStore, AsyncDatabase, AsyncMessageStore,
    NetworkMailConnector,
};
use secrecy::{ExposeSecret, SecretString};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpListener,
};

// ============================================================================
// Test Helpers
// ============================================================================

async fn create_test_db() -> AsyncDatabase {
    let db = AsyncDatabase::in_memory()
        .await
        .expect("Failed to create in-memory database");
    db.migrate().await.expect("Failed to run migrations");
    db
}

fn cipher() -> AesGcmCredentialCipher {
    AesGcmCredentialCipher::new(&SecretString::from("integration-passphrase"), "salt")
        .expect("cipher should build")
}

fn account(provider: EmailProvider) -> EmailAccount {
    let preset = provider.preset();
    EmailAccount::new(
        UserId::new(),
        EmailAddress::new("ceo@startup.io").unwrap(),
        provider,
        preset.incoming,
        preset.outgoing,
        "00:00:00",
    )
}

fn message(account_id: AccountId, message_id: &str, minutes_ago: i64) -> EmailMessage {
    let mut msg = EmailMessage::new(account_id, message_id, "INBOX");
    msg.subject = format!("Subject {message_id}");
    msg.from_address = "investor@fund.com".to_string();
    msg.received_at = Utc::now() - Duration::minutes(minutes_ago);
    msg
}

// ============================================================================
// Account Store
// ============================================================================

mod account_store_tests {
    use super::*;

    #[tokio::test]
    async fn stored_password_decrypts_to_original() {
        let db = create_test_db().await;
        let store = AsyncAccountStore::new(db.pool().clone());
        let cipher = cipher();

        let mut acc = account(EmailProvider::Gmail);
        acc.encrypted_password = cipher.encrypt("app-password").unwrap();
        store.insert(&acc).await.unwrap();

        let loaded = store.get(&acc.id).await.unwrap().unwrap();
        assert_ne!(loaded.encrypted_password, "app-password");
        assert_eq!(
            cipher.decrypt(&loaded.encrypted_password).unwrap().expose_secret(),
            "app-password"
        );
    }

    #[tokio::test]
    async fn deleting_account_cascades_to_messages() {
        let db = create_test_db().await;
        let accounts = AsyncAccountStore::new(db.pool().clone());
        let messages = AsyncMessageStore::new(db.pool().clone());

        let acc = account(EmailProvider::Gmail);
        accounts.insert(&acc).await.unwrap();
        let msg = message(acc.id, "a@fund.com", 1);
        messages.upsert(&msg).await.unwrap();

        assert!(accounts.delete(&acc.id).await.unwrap());
        assert!(messages.get(&msg.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn message_for_unknown_account_is_rejected() {
        let db = create_test_db().await;
        let messages = AsyncMessageStore::new(db.pool().clone());

        let result = messages.upsert(&message(AccountId::new(), "orphan", 0)).await;
        assert!(result.is_err());
    }
}

// ============================================================================
// Message Store
// ============================================================================

mod message_store_tests {
    use super::*;

    async fn setup() -> (AsyncDatabase, AsyncMessageStore, AccountId) {
        let db = create_test_db().await;
        let acc = account(EmailProvider::Gmail);
        AsyncAccountStore::new(db.pool().clone())
            .insert(&acc)
            .await
            .unwrap();
        let store = AsyncMessageStore::new(db.pool().clone());
        (db, store, acc.id)
    }

    #[tokio::test]
    async fn resync_does_not_duplicate() {
        let (_db, store, account_id) = setup().await;
        let msg = message(account_id, "dup@fund.com", 5);

        store.upsert(&msg).await.unwrap();
        let mut again = message(account_id, "dup@fund.com", 5);
        again.subject = "Edited upstream".to_string();
        store.upsert(&again).await.unwrap();

        let all = store.query(&account_id, &EmailQuery::default()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].subject, "Edited upstream");
        assert_eq!(all[0].id, msg.id);
    }

    #[tokio::test]
    async fn sent_mirror_lists_under_sent_folder() {
        let (_db, store, account_id) = setup().await;
        let mut sent = EmailMessage::new(account_id, "out-1@startup.io", SENT_FOLDER);
        sent.is_sent = true;
        sent.is_read = true;
        sent.sent_at = Some(Utc::now());
        store.insert(&sent).await.unwrap();
        store.upsert(&message(account_id, "in-1", 0)).await.unwrap();

        let listed = store
            .query(&account_id, &EmailQuery::default().in_folder(SENT_FOLDER))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].is_sent);
        assert!(listed[0].sent_at.is_some());
    }

    #[tokio::test]
    async fn sent_mirror_survives_resync_of_server_sent_folder() {
        let (_db, store, account_id) = setup().await;
        let mut mirror = EmailMessage::new(account_id, "<abc@startup.io>", SENT_FOLDER);
        mirror.is_sent = true;
        mirror.is_read = true;
        mirror.sent_at = Some(Utc::now());
        mirror.to_addresses = vec!["vc@fund.com".to_string()];
        mirror.bcc_addresses = vec!["board@startup.io".to_string()];
        store.insert(&mirror).await.unwrap();

        // What an IMAP sync of the server copy produces: no Bcc header, not marked sent
        let mut synced = EmailMessage::new(account_id, "<abc@startup.io>", "[Gmail]/Sent Mail");
        synced.uid = 17;
        synced.is_read = true;
        synced.to_addresses = vec!["vc@fund.com".to_string()];
        store.upsert(&synced).await.unwrap();

        let stored = store.get(&mirror.id).await.unwrap().unwrap();
        assert_eq!(stored.folder, "[Gmail]/Sent Mail");
        assert_eq!(stored.uid, 17);
        assert!(stored.is_sent);
        assert!(stored.sent_at.is_some());
        assert_eq!(stored.bcc_addresses, vec!["board@startup.io"]);
    }

    #[tokio::test]
    async fn stats_ignore_trashed_messages() {
        let (_db, store, account_id) = setup().await;
        let read = {
            let mut m = message(account_id, "read", 3);
            m.is_read = true;
            m
        };
        let unread = message(account_id, "unread", 2);
        let trashed = message(account_id, "trashed", 1);
        for m in [&read, &unread, &trashed] {
            store.upsert(m).await.unwrap();
        }
        store.set_starred(&read.id, true).await.unwrap();
        store.set_trash(&trashed.id, true).await.unwrap();

        let stats = store.stats(&account_id).await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.unread, 1);
        assert_eq!(stats.starred, 1);
        assert_eq!(stats.trash, 1);
    }
}

// ============================================================================
// End-to-end POP3 Sync
// ============================================================================

mod pop3_sync_tests {
    use super::*;

    fn pop3_message(n: u32) -> String {
        format!(
            "Message-ID: <e2e-{n}@fund.com>\r\n\
             From: \"Investor {n}\" <investor{n}@fund.com>\r\n\
             To: ceo@startup.io\r\n\
             Subject: Quarterly {n}\r\n\
             Date: Mon, 19 Oct 2026 0{n}:00:00 +0000\r\n\
             \r\n\
             Numbers attached.\r\n"
        )
    }

    /// Serve two messages per session for `sessions` connections
    fn spawn_pop3(listener: TcpListener, sessions: usize) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            for _ in 0..sessions {
                let (socket, _) = listener.accept().await.unwrap();
                let mut stream = BufReader::new(socket);
                stream.get_mut().write_all(b"+OK ready\r\n").await.unwrap();

                let mut line = String::new();
                while stream.read_line(&mut line).await.unwrap_or(0) > 0 {
                    let command = line.trim_end().to_string();
                    line.clear();
                    let reply = match command.split(' ').next().unwrap_or_default() {
                        "USER" => "+OK\r\n".to_string(),
                        "PASS" if command == "PASS pop-secret" => "+OK\r\n".to_string(),
                        "PASS" => "-ERR denied\r\n".to_string(),
                        "STAT" => "+OK 2 400\r\n".to_string(),
                        "UIDL" => "+OK\r\n1 u-1\r\n2 u-2\r\n.\r\n".to_string(),
                        "LIST" => "+OK\r\n1 200\r\n2 200\r\n.\r\n".to_string(),
                        "RETR" => {
                            let n: u32 = command[5..].parse().unwrap();
                            format!("+OK\r\n{}.\r\n", pop3_message(n))
                        },
                        "QUIT" => {
                            stream.get_mut().write_all(b"+OK bye\r\n").await.ok();
                            break;
                        },
                        _ => "-ERR unknown\r\n".to_string(),
                    };
                    stream.get_mut().write_all(reply.as_bytes()).await.ok();
                }
            }
        })
    }

    #[tokio::test]
    async fn sync_stores_messages_and_is_idempotent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = spawn_pop3(listener, 2);

        let db = create_test_db().await;
        let accounts = Arc::new(AsyncAccountStore::new(db.pool().clone()));
        let messages = Arc::new(AsyncMessageStore::new(db.pool().clone()));
        let cipher = Arc::new(cipher());

        let mut acc = account(EmailProvider::Whois);
        acc.incoming = ServerEndpoint::new("127.0.0.1", port, false);
        acc.encrypted_password = cipher.encrypt("pop-secret").unwrap();
        accounts.insert(&acc).await.unwrap();

        let service = EmailService::new(
            accounts.clone(),
            messages.clone(),
            cipher,
            Arc::new(NetworkMailConnector::default()),
        );

        let first = service
            .sync_emails(&acc.id, SyncOptions::default())
            .await
            .unwrap();
        assert_eq!(first.synced, 2, "unexpected error: {:?}", first.error);

        let second = service
            .sync_emails(&acc.id, SyncOptions::default())
            .await
            .unwrap();
        assert_eq!(second.synced, 2);
        server.await.unwrap();

        let stored = service
            .get_emails(&acc.id, &EmailQuery::default())
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].subject, "Quarterly 2");
        assert_eq!(stored[1].subject, "Quarterly 1");
        assert!(stored.iter().all(|m| m.folder == "INBOX" && !m.is_read));

        let synced_account = accounts.get(&acc.id).await.unwrap().unwrap();
        assert!(synced_account.last_sync_at.is_some());
        assert!(synced_account.sync_error.is_none());
    }

    #[tokio::test]
    async fn rejected_login_is_recorded_on_account() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = spawn_pop3(listener, 1);

        let db = create_test_db().await;
        let accounts = Arc::new(AsyncAccountStore::new(db.pool().clone()));
        let cipher = Arc::new(cipher());

        let mut acc = account(EmailProvider::Whois);
        acc.incoming = ServerEndpoint::new("127.0.0.1", port, false);
        acc.encrypted_password = cipher.encrypt("wrong").unwrap();
        accounts.insert(&acc).await.unwrap();

        let service = EmailService::new(
            accounts.clone(),
            Arc::new(AsyncMessageStore::new(db.pool().clone())),
            cipher,
            Arc::new(NetworkMailConnector::default()),
        );

        let result = service
            .sync_emails(&acc.id, SyncOptions::default())
            .await
            .unwrap();
        assert_eq!(result.synced, 0);
        let error = result.error.expect("sync should report the failure");
        assert!(error.contains("denied"), "unexpected error: {error}");
        server.await.unwrap();

        let failed = accounts.get(&acc.id).await.unwrap().unwrap();
        assert_eq!(failed.sync_error.as_deref(), Some(error.as_str()));
    }
}
