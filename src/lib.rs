//! Custom-element widgets that keep working while an out-of-band HTML swap library replaces their markup.
//!
//! Every widget is a [`Bindable`](lifecycle::Bindable) driven by a [`Widget`](lifecycle::Widget),
//! which re-locates children and re-binds listeners whenever the swap library reports that
//! the widget's descendants were replaced.
//!
//! The crate is written against the [`Dom`](dom::Dom) abstraction, with a `web-sys` backend
//! (`web`, only on `wasm32`) and an in-memory [`headless`] backend.

#![doc(html_root_url = "https://docs.rs/rebind-widgets/0.0.1")]
#![warn(clippy::pedantic)]

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod dom;
pub mod expandable_detail;
pub mod headless;
pub mod lifecycle;
pub mod registry;
pub mod swap;
pub mod visibility_toggle;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use expandable_detail::{ExpandableDetail, ExpandableDetailConfig};
pub use lifecycle::{Bindable, Phase, Signal, Widget};
pub use registry::Registry;
pub use visibility_toggle::{VisibilityToggle, VisibilityToggleConfig};

/// Formats a DOM value for logging, unless that could leak page content.
#[cfg(feature = "dangerous-logging")]
pub(crate) fn redact(value: &str) -> &str {
	value
}

/// Formats a DOM value for logging, unless that could leak page content.
#[cfg(not(feature = "dangerous-logging"))]
pub(crate) fn redact(_value: &str) -> &str {
	"<redacted>"
}
