// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0

pub mod memory;
pub mod postgres_beta;
pub mod postgres_container;
pub mod postgres_node_meta;
pub mod postgres_user;

pub use memory::{
    InMemoryBetaAccessStore, InMemoryContainerStore, InMemoryNodeMetaStore, InMemoryUserStore,
};
pub use postgres_beta::PgBetaAccessStore;
pub use postgres_container::PgContainerStore;
pub use postgres_node_meta::PgNodeMetaStore;
pub use postgres_user::PgUserStore;
