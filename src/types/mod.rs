//! Shared type definitions for the playback engine

pub mod action;

pub use action::{
    Action, ActionTiming, Bounds, ExecutionOutcome, ExecutionStatus, Point, TargetSpec,
};
