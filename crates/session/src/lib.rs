//! Session and round handling for the visual-markets system.
//!
//! This crate handles:
//! - Round activity and per-round config resolution
//! - Group formation
//! - Group market setup and end-of-round payoffs
//! - Page sequence and template variables

pub mod group;
pub mod pages;
pub mod subsession;

pub use group::{Group, PlayerPayoff};
pub use pages::{displayed_pages, page_sequence, MarketPage, Page, PracticeRoundPauseScreen};
pub use subsession::{group_matrix, GroupAssignment, Member, Participant, Subsession};
