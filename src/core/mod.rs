pub mod catalogue;
pub mod config;
pub mod corpus;
pub mod crystallizer;
pub mod dictionary;
pub mod evolution;
pub mod letter_soup;
pub mod markov;
pub mod phonetics;
pub mod pipeline;
pub mod ranker;
pub mod scorer;
pub mod seed;
pub mod spread;
