//! In-memory account registry
//!
//! Ordered by creation; public keys are unique.

use tracing::debug;

use crate::error::{Error, Result};

use super::types::Account;

/// Ordered, uniqueness-enforcing account collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountRegistry {
    accounts: Vec<Account>,
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from persisted accounts
    ///
    /// Fails if the list contains the same public key twice.
    pub fn from_accounts(accounts: Vec<Account>) -> Result<Self> {
        let mut registry = Self::new();
        for account in accounts {
            registry.add(account)?;
        }
        Ok(registry)
    }

    /// Append an account
    pub fn add(&mut self, account: Account) -> Result<()> {
        if self.contains(&account.public_key) {
            return Err(Error::DuplicateAccount(account.public_key));
        }

        debug!("Registry add: {}", account.public_key);
        self.accounts.push(account);
        Ok(())
    }

    /// Remove an account, returning its former position
    ///
    /// Any index held by the caller that pointed at or after the returned
    /// position must be revalidated.
    pub fn remove(&mut self, public_key: &str) -> Result<usize> {
        let position = self
            .position(public_key)
            .ok_or_else(|| Error::NotFound(public_key.to_string()))?;

        self.accounts.remove(position);
        debug!("Registry remove: {} (was #{})", public_key, position);
        Ok(position)
    }

    pub fn get(&self, public_key: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.public_key == public_key)
    }

    pub fn get_index(&self, index: usize) -> Option<&Account> {
        self.accounts.get(index)
    }

    pub fn position(&self, public_key: &str) -> Option<usize> {
        self.accounts.iter().position(|a| a.public_key == public_key)
    }

    pub fn contains(&self, public_key: &str) -> bool {
        self.position(public_key).is_some()
    }

    /// Owned copy of all accounts, in creation order
    pub fn list(&self) -> Vec<Account> {
        self.accounts.clone()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Change an account's display name
    pub fn rename(&mut self, public_key: &str, name: &str) -> Result<()> {
        let account = self.get_mut(public_key)?;
        account.name = name.to_string();
        Ok(())
    }

    /// Replace an account's cached balance
    pub fn update_balance(&mut self, public_key: &str, balance: &str) -> Result<()> {
        let account = self.get_mut(public_key)?;
        account.balance = balance.to_string();
        Ok(())
    }

    fn get_mut(&mut self, public_key: &str) -> Result<&mut Account> {
        self.accounts
            .iter_mut()
            .find(|a| a.public_key == public_key)
            .ok_or_else(|| Error::NotFound(public_key.to_string()))
    }
}
