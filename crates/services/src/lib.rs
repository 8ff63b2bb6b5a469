#![forbid(unsafe_code)]

pub mod app_services;
pub mod attempt_service;
pub mod error;
pub mod hidden_set;
pub mod quiz_service;
pub mod result_assembler;

pub use quiz_core::Clock;

pub use app_services::AppServices;
pub use attempt_service::{AttemptService, ReviewRow};
pub use error::{
    AppServicesError, AttemptServiceError, HiddenSetError, QuizServiceError, ResultError,
    StoreFailure,
};
pub use hidden_set::HiddenSet;
pub use quiz_service::{QuizListing, QuizService};
pub use result_assembler::ResultAssembler;
