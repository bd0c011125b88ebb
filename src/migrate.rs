use std::borrow::Cow;
use std::time::{Duration, Instant};

use bytes::Bytes;
use miette::{Context, Result, miette};

use crate::client::StoreClient;
use crate::protocol::{self, Command};

/// Outcome of one migration run
#[derive(Debug)]
pub struct MigrationReport {
    pub keys_seen: usize,
    pub hashes_copied: usize,
    pub skipped: Vec<SkippedKey>,
    pub elapsed: Duration,
}

/// A key left behind because its type cannot be copied
#[derive(Debug)]
pub struct SkippedKey {
    pub key: Bytes,
    pub kind: String,
}

enum KeyOutcome {
    Copied,
    Skipped { kind: String },
}

pub struct Migrator {
    source: StoreClient,
    dest: StoreClient,
}

impl Migrator {
    pub fn new(source: StoreClient, dest: StoreClient) -> Self {
        Migrator { source, dest }
    }

    /// Copy every hash key from the source store to the destination store.
    ///
    /// The first failing step aborts the whole run; keys of other types are
    /// logged and skipped without failing.
    pub async fn run(mut self, source_db: &str, dest_db: &str) -> Result<MigrationReport> {
        let started_at = Instant::now();

        tracing::info!(
            "starting hash migration from {} db {} to {} db {}",
            self.source.addr(),
            source_db,
            self.dest.addr(),
            dest_db
        );

        self.source
            .select(source_db)
            .await
            .wrap_err("selecting source database")?;
        self.dest
            .select(dest_db)
            .await
            .wrap_err("selecting destination database")?;

        let keys = self.list_keys().await.wrap_err("enumerating source keys")?;
        tracing::info!("found {} keys in source database {}", keys.len(), source_db);

        let mut report = MigrationReport {
            keys_seen: keys.len(),
            hashes_copied: 0,
            skipped: Vec::new(),
            elapsed: Duration::ZERO,
        };

        for key in keys {
            match self.copy_key(&key).await? {
                KeyOutcome::Copied => report.hashes_copied += 1,
                KeyOutcome::Skipped { kind } => {
                    tracing::warn!("unsupported {} type key {}", kind, display_key(&key));
                    report.skipped.push(SkippedKey { key, kind });
                }
            }
        }

        report.elapsed = started_at.elapsed();
        Ok(report)
    }

    async fn list_keys(&mut self) -> Result<Vec<Bytes>> {
        let reply = self
            .source
            .roundtrip(&Command::Keys {
                pattern: "*".to_string(),
            })
            .await?;

        protocol::expect_key_list(reply).map_err(|e| miette!("listing keys: {}", e))
    }

    async fn copy_key(&mut self, key: &Bytes) -> Result<KeyOutcome> {
        let reply = self
            .source
            .roundtrip(&Command::Type { key: key.clone() })
            .await?;
        let kind = protocol::expect_string(reply)
            .map_err(|e| miette!("reading type of key {}: {}", display_key(key), e))?;

        if kind != "hash" {
            return Ok(KeyOutcome::Skipped { kind });
        }

        self.copy_hash(key)
            .await
            .wrap_err(format!("copying hash key {}", display_key(key)))?;

        Ok(KeyOutcome::Copied)
    }

    /// Copy one hash key: all fields in a single write, then its expiration
    async fn copy_hash(&mut self, key: &Bytes) -> Result<()> {
        let reply = self
            .source
            .roundtrip(&Command::HGetAll { key: key.clone() })
            .await?;
        let field_values =
            protocol::expect_field_pairs(reply).map_err(|e| miette!("decoding hash fields: {}", e))?;

        let reply = self
            .dest
            .roundtrip(&Command::HMSet {
                key: key.clone(),
                field_values,
            })
            .await?;
        protocol::expect_ok(reply).map_err(|e| miette!("writing hash fields: {}", e))?;

        let reply = self
            .source
            .roundtrip(&Command::Ttl { key: key.clone() })
            .await?;
        let ttl = protocol::expect_integer(reply).map_err(|e| miette!("reading ttl: {}", e))?;

        if ttl > 0 {
            let reply = self
                .dest
                .roundtrip(&Command::HExpire {
                    key: key.clone(),
                    seconds: ttl,
                })
                .await?;
            let acknowledged =
                protocol::expect_integer(reply).map_err(|e| miette!("setting ttl: {}", e))?;

            if acknowledged != 1 {
                return Err(miette!(
                    "destination did not confirm expiration of {}s (reply {})",
                    ttl,
                    acknowledged
                ));
            }
        }

        tracing::info!("copied hash {}", display_key(key));
        Ok(())
    }
}

/// Render key bytes for logs; keys stay binary on the wire
fn display_key(key: &Bytes) -> Cow<'_, str> {
    String::from_utf8_lossy(key)
}
