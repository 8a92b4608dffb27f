pub mod name;
pub mod profanity;
pub mod rng;
