// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0
//! In-memory store implementations.
//!
//! Used by the integration test harness (and single-node experiments) in
//! place of PostgreSQL. The metadata transaction clones the whole map on
//! `begin` and swaps it back on `commit`, so dropping an uncommitted
//! transaction discards its writes just like a rollback.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::container::{ContainerEvent, ContainerRecord};
use crate::domain::node::{NodeMetaPatch, NodeMetadata, NodeType};
use crate::domain::store::{
    BetaAccessRequest, BetaAccessStore, ContainerStore, ContainerUpsert, NodeMetaStore,
    NodeMetaTx, StoreError, UserStore,
};
use crate::domain::user::User;

#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<Vec<User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn insert(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.lock().unwrap();
        if users
            .iter()
            .any(|u| u.email == user.email || u.username == user.username)
        {
            return Err(StoreError::Conflict(
                "email or username already registered".to_string(),
            ));
        }
        users.push(user.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryContainerStore {
    records: Mutex<HashMap<Uuid, ContainerRecord>>,
    events: Mutex<Vec<ContainerEvent>>,
}

impl InMemoryContainerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: the event log so far.
    pub fn events(&self) -> Vec<ContainerEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerStore for InMemoryContainerStore {
    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<ContainerRecord>, StoreError> {
        Ok(self.records.lock().unwrap().get(&user_id).cloned())
    }

    async fn upsert(&self, record: &ContainerUpsert) -> Result<ContainerRecord, StoreError> {
        let mut records = self.records.lock().unwrap();
        let created_at = records
            .get(&record.user_id)
            .map(|r| r.created_at)
            .unwrap_or_else(Utc::now);
        let stored = ContainerRecord {
            user_id: record.user_id,
            container_id: record.container_id.clone(),
            container_name: record.container_name.clone(),
            container_ip: record.container_ip.clone(),
            status: record.status,
            cpu_limit: record.cpu_limit,
            ram_limit: record.ram_limit,
            disk_limit: record.disk_limit,
            network_rate: record.network_rate.clone(),
            started_at: record.started_at,
            last_activity: None,
            created_at,
        };
        records.insert(record.user_id, stored.clone());
        Ok(stored)
    }

    async fn append_event(
        &self,
        user_id: Uuid,
        event_type: &str,
        details: Option<serde_json::Value>,
    ) -> Result<(), StoreError> {
        self.events.lock().unwrap().push(ContainerEvent {
            id: Uuid::new_v4(),
            user_id,
            event_type: event_type.to_string(),
            details,
            created_at: Utc::now(),
        });
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryBetaAccessStore {
    requests: Mutex<Vec<BetaAccessRequest>>,
}

impl InMemoryBetaAccessStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, request: BetaAccessRequest) {
        self.requests.lock().unwrap().push(request);
    }
}

#[async_trait]
impl BetaAccessStore for InMemoryBetaAccessStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<BetaAccessRequest>, StoreError> {
        Ok(self
            .requests
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.email == email)
            .cloned())
    }

    async fn mark_used(&self, id: Uuid) -> Result<(), StoreError> {
        let mut requests = self.requests.lock().unwrap();
        if let Some(request) = requests.iter_mut().find(|r| r.id == id) {
            request.token_used_at = Some(Utc::now());
        }
        Ok(())
    }
}

type NodeMap = HashMap<(Uuid, String), NodeMetadata>;

#[derive(Default)]
pub struct InMemoryNodeMetaStore {
    nodes: Arc<Mutex<NodeMap>>,
}

impl InMemoryNodeMetaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: direct read of a committed row.
    pub fn get(&self, user_id: Uuid, path: &str) -> Option<NodeMetadata> {
        self.nodes
            .lock()
            .unwrap()
            .get(&(user_id, path.to_string()))
            .cloned()
    }
}

#[async_trait]
impl NodeMetaStore for InMemoryNodeMetaStore {
    async fn begin(&self) -> Result<Box<dyn NodeMetaTx>, StoreError> {
        let working = self.nodes.lock().unwrap().clone();
        Ok(Box::new(InMemoryNodeMetaTx {
            shared: Arc::clone(&self.nodes),
            working,
        }))
    }
}

pub struct InMemoryNodeMetaTx {
    shared: Arc<Mutex<NodeMap>>,
    working: NodeMap,
}

#[async_trait]
impl NodeMetaTx for InMemoryNodeMetaTx {
    async fn find(&mut self, user_id: Uuid, path: &str) -> Result<Option<NodeMetadata>, StoreError> {
        Ok(self.working.get(&(user_id, path.to_string())).cloned())
    }

    async fn upsert(
        &mut self,
        user_id: Uuid,
        path: &str,
        name: &str,
        node_type: NodeType,
        patch: NodeMetaPatch,
    ) -> Result<NodeMetadata, StoreError> {
        let key = (user_id, path.to_string());
        let meta = self
            .working
            .entry(key)
            .or_insert_with(|| NodeMetadata::new(user_id, path, name, node_type));
        meta.apply(patch);
        Ok(meta.clone())
    }

    async fn delete(&mut self, user_id: Uuid, path: &str) -> Result<(), StoreError> {
        self.working.remove(&(user_id, path.to_string()));
        Ok(())
    }

    async fn delete_prefix(&mut self, user_id: Uuid, prefix: &str) -> Result<(), StoreError> {
        let prefix = format!("{prefix}/");
        self.working
            .retain(|(uid, path), _| !(*uid == user_id && path.starts_with(&prefix)));
        Ok(())
    }

    async fn rename_prefix(
        &mut self,
        user_id: Uuid,
        old_path: &str,
        new_path: &str,
        new_name: &str,
    ) -> Result<(), StoreError> {
        if old_path == new_path {
            return Ok(());
        }
        let child_prefix = format!("{old_path}/");
        let affected: Vec<(Uuid, String)> = self
            .working
            .keys()
            .filter(|(uid, path)| {
                *uid == user_id && (path == old_path || path.starts_with(&child_prefix))
            })
            .cloned()
            .collect();

        for key in affected {
            if let Some(mut meta) = self.working.remove(&key) {
                let rewritten = format!("{new_path}{}", &key.1[old_path.len()..]);
                if key.1 == old_path {
                    meta.name = new_name.to_string();
                }
                meta.path = rewritten.clone();
                meta.updated_at = Utc::now();
                self.working.insert((user_id, rewritten), meta);
            }
        }
        Ok(())
    }

    async fn list_trashed(&mut self, user_id: Uuid) -> Result<Vec<NodeMetadata>, StoreError> {
        Ok(self
            .working
            .values()
            .filter(|m| m.user_id == user_id && m.is_trashed)
            .cloned()
            .collect())
    }

    async fn list_with_desktop_pos(
        &mut self,
        user_id: Uuid,
    ) -> Result<Vec<NodeMetadata>, StoreError> {
        Ok(self
            .working
            .values()
            .filter(|m| m.user_id == user_id && m.desktop_x.is_some() && m.desktop_y.is_some())
            .cloned()
            .collect())
    }

    async fn delete_all_trash(&mut self, user_id: Uuid) -> Result<u64, StoreError> {
        let before = self.working.len();
        self.working
            .retain(|(uid, _), meta| !(*uid == user_id && meta.is_trashed));
        Ok((before - self.working.len()) as u64)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        *self.shared.lock().unwrap() = self.working;
        Ok(())
    }
}
