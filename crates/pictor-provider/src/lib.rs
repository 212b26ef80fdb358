// SPDX-FileCopyrightText: 2026 Pictor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP image generation providers for Pictor.
//!
//! Two backends implement [`pictor_core::ImageProvider`]:
//! [`ImageApiProvider`] for DALL·E-style JSON endpoints and
//! [`ChatRenderProvider`] for chat models that reply with embedded images.
//! [`HttpProviderFactory`] picks one per channel.

pub mod chat_render;
pub mod extract;
pub mod factory;
pub mod http;
pub mod image;
pub mod image_api;

pub use chat_render::ChatRenderProvider;
pub use factory::HttpProviderFactory;
pub use image_api::{ImageApiParams, ImageApiProvider};
