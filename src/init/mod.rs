// SPDX-License-Identifier: Apache-2.0

//! Command line arguments and task supervision for the `edwatch` binary.

pub mod args;
pub mod wait;
