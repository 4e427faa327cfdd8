#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod collector;
mod config;
mod error;
mod generator;
mod gun;
mod limiter;
mod profile;
mod telemetry;

pub mod mock;

pub use barrage_core as core;
pub use collector::ResponseData;
pub use config::GeneratorConfig;
pub use error::GeneratorError;
pub use generator::Generator;
pub use gun::{CallFuture, Gun, Instance, LoadImpl};
pub use profile::Profile;

pub mod prelude {
    pub use crate::{
        CallFuture, Generator, GeneratorConfig, GeneratorError, Gun, Instance, LoadImpl, Profile,
        ResponseData,
    };
    pub use barrage_core::{
        combine, combine_and_repeat, line, plain, CallResult, Labels, Schedule, ScheduleKind,
        Segment, Sink, StatsSnapshot,
    };
}
