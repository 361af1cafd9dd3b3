//! qrpair Web - Embedded web assets
//!
//! This crate embeds the session dashboard into the binary.

use rust_embed::Embed;

#[derive(Embed)]
#[folder = "www/"]
pub struct Assets;
