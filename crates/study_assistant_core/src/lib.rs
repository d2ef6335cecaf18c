pub mod domain;
pub mod ports;

pub use domain::{
    Caller, Difficulty, InputType, NewPaymentEvent, NewStudySession, Profile, Question, Topic,
    TopicOutline, UsageCounter,
};
pub use ports::{
    DatabaseService, GenerationParams, PortError, PortResult, TextGenerationService,
};
