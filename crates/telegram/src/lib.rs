//! Telegram surface for rollcall: the chat interface as pure data.
//!
//! This crate owns everything between raw Bot API JSON and the core
//! engines, without doing any I/O of its own:
//! - **Commands** (`commands`) - `/attend 1 2`, `/undo`, aliases, and the
//!   router over an async `AttendanceCommandService` trait
//! - **Callbacks** (`callbacks`) - the colon-delimited payload codec for
//!   inline-keyboard taps, validated field by field
//! - **Keyboards** (`keyboards`) - inline keyboard construction for the
//!   multi-select attendance flow
//! - **Messages** (`messages`) - reply text rendering
//! - **Bot API models** (`api`) - inbound `Update` shapes, outbound request
//!   payloads, and the transport trait the server implements
//!
//! Payloads round-trip selection state through Telegram rather than holding
//! it server-side, so every field is re-validated against the freshly
//! resolved schedule before use; payloads may be stale or replayed.

pub mod api;
pub mod callbacks;
pub mod commands;
pub mod keyboards;
pub mod messages;
