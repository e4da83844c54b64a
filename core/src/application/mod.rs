// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0

pub mod auth;
pub mod container_fs;
pub mod container_manager;
pub mod file_system;
pub mod terminal;
