//! Core data model definitions shared across cinedex crates.
#![allow(missing_docs)]

pub mod category;
pub mod failure;
pub mod film;
pub mod search;
pub mod source;

pub use category::{CategoryNode, CategoryTree};
pub use failure::{FailureRecord, RetryStatus};
pub use film::{FilmDetail, MovieBasicInfo, PlayLink, PlaySource};
pub use search::SearchInfo;
pub use source::{CollectType, FilmSource, ResultModel, SourceGrade};
