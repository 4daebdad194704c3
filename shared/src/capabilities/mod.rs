//! Capabilities the core needs from the shell.
//!
//! Render, Http and `KeyValue` are Crux's built-in capabilities; this module
//! adds the typed routes and storage keys layered on top of them.

mod http;
mod kv;

pub use self::http::{ApiFailure, PageCursor, PageQuery, Routes};
pub use self::kv::{KeyNamespace, KvError, KvKey, StoredSession};

pub use crux_core::render::Render;
pub use crux_http::Http;
pub use crux_kv::KeyValue;

use crux_core::bridge::ResolveSerialized;
use crux_core::capability::ProtoContext;
use crux_core::render::RenderOperation;
use crux_core::{Request, WithContext};
use crux_http::protocol::HttpRequest;
use crux_kv::KeyValueOperation;
use serde::{Deserialize, Serialize};

use crate::app::App;
use crate::event::Event;

pub struct Capabilities {
    pub http: Http<Event>,
    pub key_value: KeyValue<Event>,
    pub render: Render<Event>,
}

/// One variant per capability, carrying the pending request.
#[derive(Debug)]
pub enum Effect {
    Http(Request<HttpRequest>),
    KeyValue(Request<KeyValueOperation>),
    Render(Request<RenderOperation>),
}

/// The operation half of [`Effect`], as it crosses the FFI boundary.
#[derive(Debug, Serialize, Deserialize)]
pub enum EffectFfi {
    Http(HttpRequest),
    KeyValue(KeyValueOperation),
    Render(RenderOperation),
}

impl crux_core::Effect for Effect {
    type Ffi = EffectFfi;

    fn serialize(self) -> (Self::Ffi, ResolveSerialized) {
        match self {
            Effect::Http(request) => request.serialize(EffectFfi::Http),
            Effect::KeyValue(request) => request.serialize(EffectFfi::KeyValue),
            Effect::Render(request) => request.serialize(EffectFfi::Render),
        }
    }
}

impl WithContext<App, Effect> for Capabilities {
    fn new_with_context(context: ProtoContext<Effect, Event>) -> Capabilities {
        Capabilities {
            http: Http::new(context.specialize(Effect::Http)),
            key_value: KeyValue::new(context.specialize(Effect::KeyValue)),
            render: Render::new(context.specialize(Effect::Render)),
        }
    }
}
