//! Identity files: the hex encoded X25519 secret on a single line

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use veilform_crypto::KeyPair;
use zeroize::Zeroizing;

/// Write a key pair's secret, readable by the owner only on unix
pub fn write(path: &Path, keys: &KeyPair, force: bool) -> anyhow::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true);
    if force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(path)
        .with_context(|| format!("cannot create identity file {}", path.display()))?;
    let secret = keys.secret_hex();
    file.write_all(secret.as_bytes())?;
    file.write_all(b"\n")?;
    file.sync_all()?;
    Ok(())
}

/// Read a key pair from an identity file
pub fn read(path: &Path) -> anyhow::Result<KeyPair> {
    let contents = Zeroizing::new(
        fs::read_to_string(path)
            .with_context(|| format!("cannot read identity file {}", path.display()))?,
    );
    KeyPair::from_secret_hex(&contents)
        .with_context(|| format!("invalid identity file {}", path.display()))
}
