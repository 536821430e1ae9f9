//! In-memory account document store
//!
//! Keeps account documents in a map keyed by id and enforces the unique
//! email and username indexes on every write.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{Account, AccountStore, AccountUpdate, NewAccount, StoreError, StoreResult};

/// In-process `AccountStore`
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    accounts: RwLock<HashMap<String, Account>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts
    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }
}

/// Check the unique indexes, ignoring the document being updated
fn check_unique(
    accounts: &HashMap<String, Account>,
    except_id: Option<&str>,
    username: Option<&str>,
    email: Option<&str>,
) -> StoreResult<()> {
    for account in accounts.values() {
        if Some(account.id.as_str()) == except_id {
            continue;
        }
        if email.is_some_and(|e| account.email == e) {
            return Err(StoreError::Duplicate { field: "email" });
        }
        if username.is_some_and(|u| account.username == u) {
            return Err(StoreError::Duplicate { field: "username" });
        }
    }
    Ok(())
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.values().find(|a| a.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.values().find(|a| a.username == username).cloned())
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Account>> {
        Ok(self.accounts.read().await.get(id).cloned())
    }

    async fn create(&self, account: NewAccount) -> StoreResult<Account> {
        let mut accounts = self.accounts.write().await;
        check_unique(
            &accounts,
            None,
            Some(&account.username),
            Some(&account.email),
        )?;

        let now = Utc::now();
        let created = Account {
            id: Uuid::new_v4().to_string(),
            username: account.username,
            email: account.email,
            password_hash: account.password_hash,
            created_at: now,
            updated_at: now,
        };
        accounts.insert(created.id.clone(), created.clone());

        Ok(created)
    }

    async fn update_by_id(&self, id: &str, update: AccountUpdate) -> StoreResult<Option<Account>> {
        let mut accounts = self.accounts.write().await;
        if !accounts.contains_key(id) {
            return Ok(None);
        }
        check_unique(
            &accounts,
            Some(id),
            update.username.as_deref(),
            update.email.as_deref(),
        )?;

        let Some(account) = accounts.get_mut(id) else {
            return Ok(None);
        };
        if let Some(username) = update.username {
            account.username = username;
        }
        if let Some(email) = update.email {
            account.email = email;
        }
        if let Some(password_hash) = update.password_hash {
            account.password_hash = password_hash;
        }
        account.updated_at = Utc::now();

        Ok(Some(account.clone()))
    }

    async fn delete_by_id(&self, id: &str) -> StoreResult<Option<Account>> {
        Ok(self.accounts.write().await.remove(id))
    }
}
