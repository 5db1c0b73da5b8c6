pub mod catalogue;
pub mod data;
pub mod params;

pub use catalogue::{
    catalogue, next_unlocked, step_by_id, StepDefinition, StepError, StepKind, StepOption,
};
pub use params::{BuildParams, TortieLayer, MAX_ACCESSORY_SLOTS, MAX_SCAR_SLOTS, MAX_TORTIE_LAYERS};
