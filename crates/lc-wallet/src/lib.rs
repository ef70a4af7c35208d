pub mod error;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use error::WalletError;

/// The opaque key-file contents. The core only ever sees a derived address
/// and the keys it is handed; the file format itself is outside the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub address: String,
    pub public_key: String,
    pub private_key: String,
}

fn wallet_path(dir: &Path, address: &str) -> PathBuf {
    dir.join(format!("{address}.json"))
}

/// Generate a new keypair, derive its address, and write a `{address}.json`
/// key file into `dir`.
pub fn create_wallet(dir: &Path) -> Result<Wallet, WalletError> {
    let keypair = lc_crypto::keypair_gen();
    let address = lc_crypto::derive_address(&keypair.public_key)?;
    let wallet = Wallet {
        address: address.clone(),
        public_key: keypair.public_key,
        private_key: keypair.private_key,
    };

    fs::create_dir_all(dir)?;
    let contents = serde_json::to_string_pretty(&wallet)?;
    fs::write(wallet_path(dir, &address), contents)?;

    Ok(wallet)
}

/// Read back a previously created wallet file by address.
pub fn load_wallet(dir: &Path, address: &str) -> Result<Wallet, WalletError> {
    let path = wallet_path(dir, address);
    if !path.exists() {
        return Err(WalletError::NotFound(address.to_string()));
    }
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_load_round_trips() {
        let dir = std::env::temp_dir().join(format!("lc-wallet-test-{}", std::process::id()));
        let wallet = create_wallet(&dir).unwrap();
        let loaded = load_wallet(&dir, &wallet.address).unwrap();
        assert_eq!(loaded.address, wallet.address);
        assert_eq!(loaded.private_key, wallet.private_key);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn load_missing_wallet_errors() {
        let dir = std::env::temp_dir().join(format!("lc-wallet-missing-{}", std::process::id()));
        assert!(matches!(
            load_wallet(&dir, &"a".repeat(30)),
            Err(WalletError::NotFound(_))
        ));
    }
}
