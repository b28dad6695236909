//! Wallet Account Table
//!
//! The set of addresses this wallet controls and how each one is backed.
//! The table is supplied by the caller for every signing session; nothing
//! here is persisted.

use super::address::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How the key for an account is held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccountBacking {
    /// Key material lives in the local vault
    Software,
    /// Key lives on the hardware device at the given account index
    Hardware { device_index: u32 },
    /// Address is tracked but no key is available
    WatchOnly,
}

/// Who can produce a signature for an address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyHolder {
    Software,
    Hardware { device_index: u32 },
}

/// A single account known to the wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAccount {
    pub address: Address,
    pub backing: AccountBacking,
    /// Auth address on record when the account has been rekeyed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_address: Option<Address>,
}

impl WalletAccount {
    pub fn software(address: Address) -> Self {
        Self {
            address,
            backing: AccountBacking::Software,
            auth_address: None,
        }
    }

    pub fn hardware(address: Address, device_index: u32) -> Self {
        Self {
            address,
            backing: AccountBacking::Hardware { device_index },
            auth_address: None,
        }
    }

    pub fn watch_only(address: Address) -> Self {
        Self {
            address,
            backing: AccountBacking::WatchOnly,
            auth_address: None,
        }
    }

    /// Mark the account as rekeyed to `auth_address`
    pub fn rekeyed_to(mut self, auth_address: Address) -> Self {
        self.auth_address = Some(auth_address);
        self
    }
}

/// Lookup table of wallet-controlled addresses
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnedAddresses {
    accounts: HashMap<Address, WalletAccount>,
}

impl OwnedAddresses {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, account: WalletAccount) {
        self.accounts.insert(account.address, account);
    }

    pub fn with(mut self, account: WalletAccount) -> Self {
        self.insert(account);
        self
    }

    pub fn get(&self, address: &Address) -> Option<&WalletAccount> {
        self.accounts.get(address)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.accounts.contains_key(address)
    }

    /// Key holder for `address`, if this wallet can sign for it
    pub fn key_holder(&self, address: &Address) -> Option<KeyHolder> {
        match self.accounts.get(address)?.backing {
            AccountBacking::Software => Some(KeyHolder::Software),
            AccountBacking::Hardware { device_index } => Some(KeyHolder::Hardware { device_index }),
            AccountBacking::WatchOnly => None,
        }
    }

    /// Auth address the wallet has on record for `address`
    pub fn recorded_auth(&self, address: &Address) -> Option<Address> {
        self.accounts.get(address).and_then(|a| a.auth_address)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn accounts(&self) -> impl Iterator<Item = &WalletAccount> {
        self.accounts.values()
    }
}

impl FromIterator<WalletAccount> for OwnedAddresses {
    fn from_iter<I: IntoIterator<Item = WalletAccount>>(iter: I) -> Self {
        let mut owned = OwnedAddresses::new();
        for account in iter {
            owned.insert(account);
        }
        owned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_holder_lookup() {
        let soft = Address::from_bytes([1u8; 32]);
        let hard = Address::from_bytes([2u8; 32]);
        let watch = Address::from_bytes([3u8; 32]);

        let owned: OwnedAddresses = vec![
            WalletAccount::software(soft),
            WalletAccount::hardware(hard, 4),
            WalletAccount::watch_only(watch),
        ]
        .into_iter()
        .collect();

        assert_eq!(owned.key_holder(&soft), Some(KeyHolder::Software));
        assert_eq!(owned.key_holder(&hard), Some(KeyHolder::Hardware { device_index: 4 }));
        assert_eq!(owned.key_holder(&watch), None);
        assert_eq!(owned.key_holder(&Address::from_bytes([9u8; 32])), None);
        assert!(owned.contains(&watch));
    }

    #[test]
    fn test_recorded_auth() {
        let rekeyed = Address::from_bytes([1u8; 32]);
        let auth = Address::from_bytes([2u8; 32]);
        let owned = OwnedAddresses::new().with(WalletAccount::watch_only(rekeyed).rekeyed_to(auth));
        assert_eq!(owned.recorded_auth(&rekeyed), Some(auth));
    }

    #[test]
    fn test_account_json() {
        let json = format!(
            r#"{{"address":"{}","backing":{{"type":"hardware","device_index":2}}}}"#,
            Address::from_bytes([5u8; 32])
        );
        let account: WalletAccount = serde_json::from_str(&json).unwrap();
        assert_eq!(account.backing, AccountBacking::Hardware { device_index: 2 });
        assert!(account.auth_address.is_none());
    }
}
