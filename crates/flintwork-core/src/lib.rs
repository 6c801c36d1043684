//! Flintwork Core -- the dependency-gated state machines behind stone-tool
//! knapping and hafting.
//!
//! A tool blank is a set of removable [`knapping::Flake`]s owned by an
//! [`knapping::Objective`]; a haft is a set of [`hafting::AttachPoint`]s owned
//! by a [`hafting::Handle`]. Both sides share the same pattern: nodes sit in a
//! [`dependency::DependencyGraph`] and only become actionable once every
//! predecessor has been cleared.
//!
//! # Inbound / Outbound
//!
//! The host engine drives the core from its physics callbacks:
//!
//! - **Impacts** ([`impact::Impact`]) are delivered to flakes and validated by
//!   the [`impact::ImpactValidator`] (force, dependency ratio, cooldown, angle,
//!   in that order).
//! - **Contacts** are delivered to attach points together with the contacting
//!   object's [`capability::PartCapabilities`].
//!
//! Every outcome, including every rejection, is reported as an
//! [`event::Event`]. Scene-graph surgery is expressed as intents against the
//! [`scene::SceneMutator`] trait, so the core never owns engine memory.
//!
//! # Key Types
//!
//! - [`workbench::Workbench`] -- owns both modules, the event bus and the tick.
//! - [`knapping::KnappingModule`] -- flake arena, objectives, impact handling.
//! - [`hafting::HaftingModule`] -- attach point arena, handles, contact handling.
//! - [`event::EventBus`] -- per-kind ring buffers with passive subscribers.
//! - [`scene::HeadlessScene`] -- in-memory scene graph for tests and replays.

pub mod capability;
pub mod dependency;
pub mod event;
pub mod geometry;
pub mod hafting;
pub mod id;
pub mod impact;
pub mod knapping;
pub mod scene;
pub mod sim;
pub mod workbench;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
