// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0
//! # aisu-core
//!
//! Control-plane crate for the Aisu web desktop. Each authenticated user is
//! granted an isolated Linux container, a virtual filesystem rooted at the
//! container's home directory, and a persistent terminal session streamed
//! over a WebSocket.
//!
//! ## Layer Structure
//!
//! ```text
//! presentation/   ← HTTP API (axum) + WebSocket terminal endpoint
//!     ↓
//! application/    ← ContainerManager, ContainerFs, FileSystemService,
//!                   TerminalSession, AuthService
//!     ↓
//! domain/         ← User, ContainerRecord, NodeMetadata, VFS paths,
//!                   runtime / store / rate-limit traits, error model
//!     ↓
//! infrastructure/ ← Docker adapter (bollard), Postgres stores, rate
//!                   limiter backends, JWT codec, password hashing
//! ```
//!
//! The container engine is only ever reached through the
//! [`domain::runtime::ContainerRuntime`] trait, which is what lets the
//! integration tests in `core/tests/` drive the whole filesystem service
//! against a local-filesystem fake instead of a real engine.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
