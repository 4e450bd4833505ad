//! mealcal — client-side engine for a sliding-window meal-slot calendar.
//!
//! The engine keeps a month-granular cache of slot records, projects them
//! into a fixed 9-week grid around an anchor date, and pages that window by
//! vertical swipe gestures. Mutations (publishing slots, booking seats) go
//! through explicit API traits; the server stays the single source of truth
//! and every successful mutation is followed by a forced refetch.

pub mod api;
pub mod config;
pub mod engine;
pub mod model;
pub mod notify;
pub mod observability;
