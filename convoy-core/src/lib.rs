//! Convoy Core
//!
//! Core types shared by the Convoy release orchestrator and its clients.
//!
//! This crate contains:
//! - Domain types: persisted entities (Deploy, Group, Project, Pipeline, Job)
//! - DTOs: submission payloads, remote CI shapes and live events

pub mod domain;
pub mod dto;
