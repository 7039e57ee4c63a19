// SPDX-FileCopyrightText: 2026 Meterr Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for the queue and dead-letter tables.

pub mod dead_letter;
pub mod queue;
