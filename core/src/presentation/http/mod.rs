// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0

pub mod auth;
pub mod container;
pub mod fs;
pub mod terminal;
