//! WarpFE - bulge/pinch image-effects editor.
//!
//! The GUI (`main.rs` / `app.rs`) and the headless CLI share everything here:
//! coordinate mapping, selection strategies, the effect invoker, the engine
//! backends and the editor session.

#![allow(clippy::too_many_arguments)]

#[macro_use]
pub mod logger;

pub mod effect;
pub mod engine;
pub mod gpu;
pub mod io;
pub mod mapper;
pub mod selection;
pub mod session;
pub mod settings;
pub mod surface;
