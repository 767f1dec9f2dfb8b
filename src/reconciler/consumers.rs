//! Consumers and their key-auth and JWT credentials.

use serde_json::{Value, json};
use std::collections::HashSet;
use tracing::info;

use crate::config::{ConsumerEntry, ConsumersDocument};
use crate::error::Result;
use crate::kong::{Consumer, Jwt, KeyAuth, Record, ResourceKind, Scope};
use crate::planner::{Action, normalize, three_way};

use super::{ChangeKind, Reconciler, Tally, require_id};

/// Credential body for a create call, without id or owner.
fn credential_body<R: Record>(credential: &R) -> Value {
    normalize(credential)
}

impl Reconciler<'_> {
    /// Converges every consumer of a consumers document.
    ///
    /// Consumers are only ever created; a consumer missing from the document
    /// is left in place.
    pub(super) async fn ensure_consumers(&self, doc: &ConsumersDocument, tally: &mut Tally) -> Result<()> {
        for entry in doc.consumers() {
            info!("Processing consumer: {}", entry.username());
            self.ensure_consumer(entry, tally).await?;

            let scope = Scope::Consumer(entry.username().to_string());
            if let Some(keys) = &entry.keyauth_credentials {
                self.ensure_key_auth(&scope, keys, tally).await?;
            }
            if let Some(secrets) = &entry.jwt_secrets {
                self.ensure_jwt(&scope, secrets, tally).await?;
            }
        }
        Ok(())
    }

    async fn ensure_consumer(&self, entry: &ConsumerEntry, tally: &mut Tally) -> Result<()> {
        let username = entry.username();
        match self
            .client
            .get::<Consumer>(ResourceKind::Consumer, &Scope::Global, username)
            .await
        {
            Ok(_) => {
                tally.unchanged(ResourceKind::Consumer, username);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                let _: Consumer = self
                    .client
                    .upsert(
                        ResourceKind::Consumer,
                        &Scope::Global,
                        username,
                        json!({"username": username}),
                    )
                    .await?;
                tally.record(ChangeKind::Created, ResourceKind::Consumer, username);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Key-auth credentials are matched by key value; a matched key never
    /// needs an update. Repeated keys are created once.
    async fn ensure_key_auth(&self, scope: &Scope, keys: &[KeyAuth], tally: &mut Tally) -> Result<()> {
        let key = |credential: &KeyAuth| credential.key.clone().unwrap_or_default();

        let mut seen = HashSet::new();
        let desired: Vec<&KeyAuth> = keys.iter().filter(|k| seen.insert(key(*k))).collect();
        let live: Vec<KeyAuth> = self.client.list(ResourceKind::KeyAuth, scope).await?;

        let diff = three_way(&desired, &live, |d: &&KeyAuth| key(*d), key, |_, _| true);

        for credential in diff.deletes {
            self.client
                .delete(ResourceKind::KeyAuth, scope, require_id(credential)?)
                .await?;
            tally.record(ChangeKind::Deleted, ResourceKind::KeyAuth, key(credential));
        }

        for action in diff.actions {
            match action {
                Action::Create(desired) => {
                    let _: KeyAuth = self
                        .client
                        .create(ResourceKind::KeyAuth, scope, credential_body(*desired))
                        .await?;
                    tally.record(ChangeKind::Created, ResourceKind::KeyAuth, key(*desired));
                }
                Action::Update { desired, .. } | Action::Unchanged { desired, .. } => {
                    tally.unchanged(ResourceKind::KeyAuth, &key(*desired));
                }
            }
        }
        Ok(())
    }

    /// JWT credentials are matched by key. A match is unchanged when every
    /// field the document states has the same value live; fields the gateway
    /// fills in (`algorithm`, `rsa_public_key`) only count when stated.
    /// Credentials cannot be patched, so a changed secret is a delete
    /// followed by a create.
    async fn ensure_jwt(&self, scope: &Scope, secrets: &[Jwt], tally: &mut Tally) -> Result<()> {
        let key = |secret: &Jwt| secret.key.clone().unwrap_or_default();

        let mut seen = HashSet::new();
        let desired: Vec<&Jwt> = secrets.iter().filter(|s| seen.insert(key(*s))).collect();
        let live: Vec<Jwt> = self.client.list(ResourceKind::Jwt, scope).await?;

        let diff = three_way(
            &desired,
            &live,
            |d: &&Jwt| key(*d),
            key,
            |d: &&Jwt, l: &Jwt| stated_fields_match(*d, l),
        );

        for secret in diff.deletes {
            self.client
                .delete(ResourceKind::Jwt, scope, require_id(secret)?)
                .await?;
            tally.record(ChangeKind::Deleted, ResourceKind::Jwt, key(secret));
        }

        for action in diff.actions {
            match action {
                Action::Create(desired) => {
                    let _: Jwt = self
                        .client
                        .create(ResourceKind::Jwt, scope, credential_body(*desired))
                        .await?;
                    tally.record(ChangeKind::Created, ResourceKind::Jwt, key(*desired));
                }
                Action::Update { desired, live } => {
                    self.client
                        .delete(ResourceKind::Jwt, scope, require_id(live)?)
                        .await?;
                    let _: Jwt = self
                        .client
                        .create(ResourceKind::Jwt, scope, credential_body(*desired))
                        .await?;
                    tally.record(ChangeKind::Updated, ResourceKind::Jwt, key(*desired));
                }
                Action::Unchanged { desired, .. } => {
                    tally.unchanged(ResourceKind::Jwt, &key(*desired));
                }
            }
        }
        Ok(())
    }
}

/// True when every field of the normalized desired record has the same
/// value on the live one.
fn stated_fields_match<R: Record>(desired: &R, live: &R) -> bool {
    match (normalize(desired), normalize(live)) {
        (Value::Object(stated), Value::Object(actual)) => stated
            .iter()
            .all(|(field, value)| actual.get(field) == Some(value)),
        _ => false,
    }
}
