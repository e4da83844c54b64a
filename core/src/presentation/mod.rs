// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0

pub mod api;
pub mod error;
pub mod extract;
pub mod http;

pub use api::{app, AppState};
