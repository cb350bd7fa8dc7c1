pub mod knapsack;

pub use knapsack::{
    ChallengeA, ContinuousUniform, DiscreteUniform, KnapsackInstance, MultiKnapsackGenerator,
    MultiKnapsackInstance,
};
