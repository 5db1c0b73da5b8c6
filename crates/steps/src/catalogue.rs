use thiserror::Error;

use crate::data;
use crate::params::{
    format_display_name, BuildParams, TortieLayer, MAX_ACCESSORY_SLOTS, MAX_SCAR_SLOTS,
    MAX_TORTIE_LAYERS,
};

#[derive(Debug, Error)]
pub enum StepError {
    #[error("unknown step '{0}'")]
    UnknownStep(String),
    #[error("option '{key}' is not selectable for step '{step_id}'")]
    UnknownOption { step_id: String, key: String },
}

/// The closed set of decision points. The step sequence is fixed per
/// deployment; conditional variants carry the zero-based layer/slot index
/// they operate on. That index flows into the option keys
/// (`accessory_slot_0_HOLLY`), while the matching step ids number slots
/// from one (`accessory_slot_1`) for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    BaseColour,
    Pattern,
    TortieToggle,
    TortieLayerMask(u32),
    TortieLayerPattern(u32),
    TortieLayerColour(u32),
    TortieMore,
    EyePrimary,
    EyeSecondary,
    WhitePatches,
    Points,
    Vitiligo,
    Skin,
    Tint,
    AccessoryToggle,
    AccessorySlot(u32),
    AccessoryMore,
    ScarToggle,
    ScarSlot(u32),
    ScarMore,
    Pose,
}

/// What applying an option does to the params. Derived from the option key,
/// so a persisted vote stays applicable as long as the option is still
/// computable from current state.
#[derive(Debug, Clone, PartialEq)]
enum Mutation {
    SetColour(String),
    SetPelt(String),
    EnableTortie,
    DisableTortie,
    SetTortieMask { layer: u32, mask: String },
    SetTortiePattern { layer: u32, pattern: String },
    SetTortieColour { layer: u32, colour: String },
    AddTortieLayer,
    KeepTortieLayers,
    SetEyePrimary(String),
    SetEyeSecondary(Option<String>),
    SetWhitePatches(Option<String>),
    SetPoints(Option<String>),
    SetVitiligo(Option<String>),
    SetSkin(String),
    SetTint(String),
    EnableAccessories,
    DisableAccessories,
    SetAccessory { slot: u32, item: Option<String> },
    AddAccessorySlot,
    KeepAccessorySlots,
    EnableScars,
    DisableScars,
    SetScar { slot: u32, item: Option<String> },
    AddScarSlot,
    KeepScarSlots,
    SetPose(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepOption {
    pub key: String,
    pub label: String,
    mutation: Mutation,
}

impl StepOption {
    fn new(key: impl Into<String>, label: impl Into<String>, mutation: Mutation) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            mutation,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StepDefinition {
    pub id: String,
    pub title: String,
    pub description: String,
    pub kind: StepKind,
}

impl StepDefinition {
    fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        kind: StepKind,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            kind,
        }
    }

    /// Computes the selectable options for the current params. Read-only:
    /// the same params always yield the same option set.
    pub fn options(&self, params: &BuildParams) -> Vec<StepOption> {
        match self.kind {
            StepKind::BaseColour => colour_options(params),
            StepKind::Pattern => pattern_options(),
            StepKind::TortieToggle => tortie_toggle_options(),
            StepKind::TortieLayerMask(layer) => tortie_mask_options(layer),
            StepKind::TortieLayerPattern(layer) => tortie_pattern_options(layer),
            StepKind::TortieLayerColour(layer) => tortie_colour_options(layer),
            StepKind::TortieMore => tortie_more_options(params.tortie_layers),
            StepKind::EyePrimary => eye_primary_options(),
            StepKind::EyeSecondary => eye_secondary_options(),
            StepKind::WhitePatches => white_patch_options(),
            StepKind::Points => points_options(),
            StepKind::Vitiligo => vitiligo_options(),
            StepKind::Skin => skin_options(),
            StepKind::Tint => tint_options(),
            StepKind::AccessoryToggle => accessory_toggle_options(),
            StepKind::AccessorySlot(slot) => accessory_slot_options(slot),
            StepKind::AccessoryMore => accessory_more_options(params.accessory_slots),
            StepKind::ScarToggle => scar_toggle_options(),
            StepKind::ScarSlot(slot) => scar_slot_options(slot),
            StepKind::ScarMore => scar_more_options(params.scar_slots),
            StepKind::Pose => pose_options(),
        }
    }

    /// Resolves `option_key` against the currently computable options and
    /// mutates the params. Returns the applied option so callers can record
    /// its label. The only mutating entry point of the catalogue.
    pub fn apply(&self, option_key: &str, params: &mut BuildParams) -> Result<StepOption, StepError> {
        let option = self
            .options(params)
            .into_iter()
            .find(|option| option.key == option_key)
            .ok_or_else(|| StepError::UnknownOption {
                step_id: self.id.clone(),
                key: option_key.to_string(),
            })?;
        apply_mutation(&option.mutation, params);
        params.sync_derived_state();
        Ok(option)
    }

    pub fn summarize(&self, option: &StepOption) -> String {
        option.label.clone()
    }
}

fn apply_mutation(mutation: &Mutation, params: &mut BuildParams) {
    match mutation {
        Mutation::SetColour(colour) => params.colour = colour.clone(),
        Mutation::SetPelt(pelt) => params.pelt_name = pelt.clone(),
        Mutation::EnableTortie => {
            params.is_tortie = true;
            params.tortie_layers = params.tortie_layers.max(1);
        }
        Mutation::DisableTortie => {
            params.is_tortie = false;
            params.tortie_layers = 0;
            params.tortie.clear();
        }
        Mutation::SetTortieMask { layer, mask } => {
            ensure_tortie_layer(params, *layer);
            params.tortie[*layer as usize].mask = mask.clone();
        }
        Mutation::SetTortiePattern { layer, pattern } => {
            ensure_tortie_layer(params, *layer);
            params.tortie[*layer as usize].pattern = pattern.clone();
        }
        Mutation::SetTortieColour { layer, colour } => {
            ensure_tortie_layer(params, *layer);
            params.tortie[*layer as usize].colour = colour.clone();
        }
        Mutation::AddTortieLayer => {
            params.tortie_layers = (params.tortie_layers + 1).min(MAX_TORTIE_LAYERS);
        }
        Mutation::KeepTortieLayers => {}
        Mutation::SetEyePrimary(colour) => {
            params.eye_colour = colour.clone();
            params.eye_colour2 = None;
        }
        Mutation::SetEyeSecondary(colour) => {
            // Picking the primary colour again collapses back to matching eyes.
            params.eye_colour2 = colour
                .as_ref()
                .filter(|c| **c != params.eye_colour)
                .cloned();
        }
        Mutation::SetWhitePatches(patch) => params.white_patches = patch.clone(),
        Mutation::SetPoints(points) => params.points = points.clone(),
        Mutation::SetVitiligo(vitiligo) => params.vitiligo = vitiligo.clone(),
        Mutation::SetSkin(skin) => params.skin_colour = skin.clone(),
        Mutation::SetTint(tint) => params.tint = tint.clone(),
        Mutation::EnableAccessories => {
            params.accessory_slots = params.accessory_slots.max(1);
        }
        Mutation::DisableAccessories => {
            params.accessory_slots = 0;
            params.accessories.clear();
        }
        Mutation::SetAccessory { slot, item } => {
            ensure_slot(&mut params.accessories, *slot);
            params.accessories[*slot as usize] = item.clone();
        }
        Mutation::AddAccessorySlot => {
            params.accessory_slots = (params.accessory_slots + 1).min(MAX_ACCESSORY_SLOTS);
        }
        Mutation::KeepAccessorySlots => {}
        Mutation::EnableScars => {
            params.scar_slots = params.scar_slots.max(1);
        }
        Mutation::DisableScars => {
            params.scar_slots = 0;
            params.scars.clear();
        }
        Mutation::SetScar { slot, item } => {
            ensure_slot(&mut params.scars, *slot);
            params.scars[*slot as usize] = item.clone();
        }
        Mutation::AddScarSlot => {
            params.scar_slots = (params.scar_slots + 1).min(MAX_SCAR_SLOTS);
        }
        Mutation::KeepScarSlots => {}
        Mutation::SetPose(pose) => params.sprite_number = *pose,
    }
}

fn ensure_tortie_layer(params: &mut BuildParams, layer: u32) {
    while params.tortie.len() <= layer as usize {
        params.tortie.push(TortieLayer {
            pattern: params.pelt_name.clone(),
            colour: params.colour.clone(),
            mask: "ONE".to_string(),
        });
    }
}

fn ensure_slot(slots: &mut Vec<Option<String>>, slot: u32) {
    while slots.len() <= slot as usize {
        slots.push(None);
    }
}

fn limited<'a>(list: &'a [&'a str], limit: usize) -> impl Iterator<Item = &'a str> {
    list.iter().copied().take(limit)
}

fn colour_options(params: &BuildParams) -> Vec<StepOption> {
    data::colour_palette(&params.palette_mode)
        .into_iter()
        .map(|colour| {
            StepOption::new(
                colour,
                format_display_name(colour),
                Mutation::SetColour(colour.to_string()),
            )
        })
        .collect()
}

fn pattern_options() -> Vec<StepOption> {
    limited(data::PELT_NAMES, 18)
        .map(|pelt| {
            StepOption::new(
                pelt,
                format_display_name(pelt),
                Mutation::SetPelt(pelt.to_string()),
            )
        })
        .collect()
}

fn tortie_toggle_options() -> Vec<StepOption> {
    vec![
        StepOption::new(
            "tortie_enable",
            "Yes, add tortie overlays",
            Mutation::EnableTortie,
        ),
        StepOption::new("tortie_disable", "No tortie layers", Mutation::DisableTortie),
    ]
}

fn tortie_mask_options(layer: u32) -> Vec<StepOption> {
    data::TORTIE_MASKS
        .iter()
        .map(|mask| {
            StepOption::new(
                format!("tortie_mask_{layer}_{mask}"),
                format!("Layer {}: Mask {}", layer + 1, format_display_name(mask)),
                Mutation::SetTortieMask {
                    layer,
                    mask: mask.to_string(),
                },
            )
        })
        .collect()
}

fn tortie_pattern_options(layer: u32) -> Vec<StepOption> {
    data::PELT_NAMES
        .iter()
        .map(|pattern| {
            StepOption::new(
                format!("tortie_pattern_{layer}_{pattern}"),
                format!(
                    "Layer {}: Pattern {}",
                    layer + 1,
                    format_display_name(pattern)
                ),
                Mutation::SetTortiePattern {
                    layer,
                    pattern: pattern.to_string(),
                },
            )
        })
        .collect()
}

fn tortie_colour_options(layer: u32) -> Vec<StepOption> {
    // Tortie overlays may pull from any palette, not just the session's mode.
    data::colour_palette("all")
        .into_iter()
        .map(|colour| {
            StepOption::new(
                format!("tortie_colour_{layer}_{colour}"),
                format!(
                    "Layer {}: Colour {}",
                    layer + 1,
                    format_display_name(colour)
                ),
                Mutation::SetTortieColour {
                    layer,
                    colour: colour.to_string(),
                },
            )
        })
        .collect()
}

fn tortie_more_options(current_layers: u32) -> Vec<StepOption> {
    let next = current_layers + 1;
    vec![
        StepOption::new(
            format!("tortie_more_{next}_yes"),
            format!("Add tortie layer {next}"),
            Mutation::AddTortieLayer,
        ),
        StepOption::new(
            format!("tortie_more_{next}_no"),
            "No more tortie layers",
            Mutation::KeepTortieLayers,
        ),
    ]
}

fn eye_primary_options() -> Vec<StepOption> {
    limited(data::EYE_COLOURS, 14)
        .map(|colour| {
            StepOption::new(
                format!("eye_primary_{colour}"),
                format_display_name(colour),
                Mutation::SetEyePrimary(colour.to_string()),
            )
        })
        .collect()
}

fn eye_secondary_options() -> Vec<StepOption> {
    let mut options = vec![StepOption::new(
        "eye_secondary_match",
        "Match primary eye colour",
        Mutation::SetEyeSecondary(None),
    )];
    options.extend(limited(data::EYE_COLOURS, 14).map(|colour| {
        StepOption::new(
            format!("eye_secondary_{colour}"),
            format_display_name(colour),
            Mutation::SetEyeSecondary(Some(colour.to_string())),
        )
    }));
    options
}

fn white_patch_options() -> Vec<StepOption> {
    let mut options = vec![StepOption::new(
        "patch_none",
        "None",
        Mutation::SetWhitePatches(None),
    )];
    options.extend(data::WHITE_PATCHES.iter().map(|patch| {
        StepOption::new(
            format!("patch_{patch}"),
            format_display_name(patch),
            Mutation::SetWhitePatches(Some(patch.to_string())),
        )
    }));
    options
}

fn points_options() -> Vec<StepOption> {
    let mut options = vec![StepOption::new(
        "points_none",
        "None",
        Mutation::SetPoints(None),
    )];
    options.extend(limited(data::POINTS, 13).map(|point| {
        StepOption::new(
            format!("points_{point}"),
            format_display_name(point),
            Mutation::SetPoints(Some(point.to_string())),
        )
    }));
    options
}

fn vitiligo_options() -> Vec<StepOption> {
    let mut options = vec![StepOption::new(
        "vitiligo_none",
        "None",
        Mutation::SetVitiligo(None),
    )];
    options.extend(limited(data::VITILIGO, 13).map(|item| {
        StepOption::new(
            format!("vitiligo_{item}"),
            format_display_name(item),
            Mutation::SetVitiligo(Some(item.to_string())),
        )
    }));
    options
}

fn skin_options() -> Vec<StepOption> {
    limited(data::SKIN_COLOURS, 12)
        .map(|skin| {
            StepOption::new(
                format!("skin_{skin}"),
                format_display_name(skin),
                Mutation::SetSkin(skin.to_string()),
            )
        })
        .collect()
}

fn tint_options() -> Vec<StepOption> {
    let mut options = vec![StepOption::new(
        "tint_none",
        "None",
        Mutation::SetTint("none".to_string()),
    )];
    options.extend(limited(data::TINTS, 13).map(|tint| {
        StepOption::new(
            format!("tint_{tint}"),
            format_display_name(tint),
            Mutation::SetTint(tint.to_string()),
        )
    }));
    options
}

fn accessory_toggle_options() -> Vec<StepOption> {
    vec![
        StepOption::new(
            "accessory_enable",
            "Yes, add accessories",
            Mutation::EnableAccessories,
        ),
        StepOption::new(
            "accessory_disable",
            "No accessories",
            Mutation::DisableAccessories,
        ),
    ]
}

fn accessory_slot_options(slot: u32) -> Vec<StepOption> {
    let mut options = vec![StepOption::new(
        format!("accessory_slot_{slot}_none"),
        "None",
        Mutation::SetAccessory { slot, item: None },
    )];
    let catalog = data::PLANT_ACCESSORIES
        .iter()
        .chain(data::WILD_ACCESSORIES)
        .chain(data::COLLAR_ACCESSORIES);
    options.extend(catalog.map(|item| {
        StepOption::new(
            format!("accessory_slot_{slot}_{item}"),
            format_display_name(item),
            Mutation::SetAccessory {
                slot,
                item: Some(item.to_string()),
            },
        )
    }));
    options
}

fn accessory_more_options(current_slots: u32) -> Vec<StepOption> {
    let next = current_slots + 1;
    vec![
        StepOption::new(
            format!("accessory_more_{next}_yes"),
            format!("Add accessory slot {next}"),
            Mutation::AddAccessorySlot,
        ),
        StepOption::new(
            format!("accessory_more_{next}_no"),
            "No more accessories",
            Mutation::KeepAccessorySlots,
        ),
    ]
}

fn scar_toggle_options() -> Vec<StepOption> {
    vec![
        StepOption::new("scars_enable", "Yes, add scars", Mutation::EnableScars),
        StepOption::new("scars_disable", "No scars", Mutation::DisableScars),
    ]
}

fn scar_slot_options(slot: u32) -> Vec<StepOption> {
    let mut options = vec![StepOption::new(
        format!("scar_slot_{slot}_none"),
        "Leave this slot empty",
        Mutation::SetScar { slot, item: None },
    )];
    let catalog = data::BATTLE_SCARS
        .iter()
        .chain(data::MISSING_SCARS)
        .chain(data::ENVIRONMENTAL_SCARS);
    options.extend(catalog.map(|item| {
        StepOption::new(
            format!("scar_slot_{slot}_{item}"),
            format_display_name(item),
            Mutation::SetScar {
                slot,
                item: Some(item.to_string()),
            },
        )
    }));
    options
}

fn scar_more_options(current_slots: u32) -> Vec<StepOption> {
    let next = current_slots + 1;
    vec![
        StepOption::new(
            format!("scar_more_{next}_yes"),
            format!("Add scar slot {next}"),
            Mutation::AddScarSlot,
        ),
        StepOption::new(
            format!("scar_more_{next}_no"),
            "No more scars",
            Mutation::KeepScarSlots,
        ),
    ]
}

fn pose_options() -> Vec<StepOption> {
    limited_poses()
        .map(|pose| {
            StepOption::new(
                format!("pose_{pose}"),
                format!("Pose #{pose}"),
                Mutation::SetPose(pose),
            )
        })
        .collect()
}

fn limited_poses() -> impl Iterator<Item = u32> {
    data::POSES.iter().copied().take(12)
}

/// Builds the full ordered step list for the given params. Conditional steps
/// (tortie layers, accessory and scar slots) appear exactly when the params
/// call for them, so the list must be recomputed after every apply.
pub fn catalogue(params: &BuildParams) -> Vec<StepDefinition> {
    let mut steps = Vec::new();

    steps.push(StepDefinition::new(
        "colour",
        "Base Colour",
        "Choose the base coat colour that defines the creature.",
        StepKind::BaseColour,
    ));
    steps.push(StepDefinition::new(
        "pattern",
        "Pattern",
        "Select the main fur pattern.",
        StepKind::Pattern,
    ));
    steps.push(StepDefinition::new(
        "tortie_toggle",
        "Tortie Layers",
        "Decide whether to layer tortie patterns.",
        StepKind::TortieToggle,
    ));

    let tortie_layers = params.tortie_layers.min(MAX_TORTIE_LAYERS);
    for i in 0..tortie_layers {
        let display = i + 1;
        steps.push(StepDefinition::new(
            format!("tortie_layer_{display}_mask"),
            format!("Tortie Layer {display}: Mask"),
            "Choose the mask that controls where this layer appears.",
            StepKind::TortieLayerMask(i),
        ));
        steps.push(StepDefinition::new(
            format!("tortie_layer_{display}_pattern"),
            format!("Tortie Layer {display}: Pattern"),
            "Select the pattern that shapes this tortie overlay.",
            StepKind::TortieLayerPattern(i),
        ));
        steps.push(StepDefinition::new(
            format!("tortie_layer_{display}_colour"),
            format!("Tortie Layer {display}: Colour"),
            "Pick the colour for this tortie overlay.",
            StepKind::TortieLayerColour(i),
        ));
    }
    if tortie_layers > 0 && tortie_layers < MAX_TORTIE_LAYERS {
        let next = tortie_layers + 1;
        steps.push(StepDefinition::new(
            format!("tortie_add_layer_{next}"),
            format!("Add tortie layer {next}?"),
            "Viewers can add up to four tortie overlays.",
            StepKind::TortieMore,
        ));
    }

    steps.push(StepDefinition::new(
        "eye_primary",
        "Primary Eye Colour",
        "Pick the main eye colour.",
        StepKind::EyePrimary,
    ));
    steps.push(StepDefinition::new(
        "eye_secondary",
        "Secondary Eye Colour",
        "Choose a secondary eye colour or keep them matching.",
        StepKind::EyeSecondary,
    ));
    steps.push(StepDefinition::new(
        "white_patches",
        "White Patches",
        "Choose a white patch overlay.",
        StepKind::WhitePatches,
    ));
    steps.push(StepDefinition::new(
        "points_pattern",
        "Points Pattern",
        "Select a points (siamese-style) highlight.",
        StepKind::Points,
    ));
    steps.push(StepDefinition::new(
        "vitiligo_pattern",
        "Vitiligo",
        "Add vitiligo overlays if desired.",
        StepKind::Vitiligo,
    ));
    steps.push(StepDefinition::new(
        "skin",
        "Skin Tone",
        "Select nose and ear skin colour.",
        StepKind::Skin,
    ));
    steps.push(StepDefinition::new(
        "tint",
        "Overall Tint",
        "Choose an optional tint overlay.",
        StepKind::Tint,
    ));

    steps.push(StepDefinition::new(
        "accessories_toggle",
        "Accessories",
        "Decide whether to add accessories.",
        StepKind::AccessoryToggle,
    ));
    let accessory_slots = params.accessory_slots.min(MAX_ACCESSORY_SLOTS);
    for i in 0..accessory_slots {
        steps.push(StepDefinition::new(
            format!("accessory_slot_{}", i + 1),
            format!("Accessory Slot {}", i + 1),
            "Select an accessory for this slot.",
            StepKind::AccessorySlot(i),
        ));
    }
    if accessory_slots > 0 && accessory_slots < MAX_ACCESSORY_SLOTS {
        steps.push(StepDefinition::new(
            format!("accessory_more_{}", accessory_slots + 1),
            "Add another accessory?",
            "Viewers can queue up to ten accessories.",
            StepKind::AccessoryMore,
        ));
    }

    steps.push(StepDefinition::new(
        "scars_toggle",
        "Scars",
        "Choose whether to add scars.",
        StepKind::ScarToggle,
    ));
    let scar_slots = params.scar_slots.min(MAX_SCAR_SLOTS);
    for i in 0..scar_slots {
        steps.push(StepDefinition::new(
            format!("scar_slot_{}", i + 1),
            format!("Scar Slot {}", i + 1),
            "Pick a scar for this slot.",
            StepKind::ScarSlot(i),
        ));
    }
    if scar_slots > 0 && scar_slots < MAX_SCAR_SLOTS {
        steps.push(StepDefinition::new(
            format!("scar_more_{}", scar_slots + 1),
            "Add another scar?",
            "Viewers can queue several scars, up to six slots.",
            StepKind::ScarMore,
        ));
    }

    steps.push(StepDefinition::new(
        "pose",
        "Pose",
        "Choose the final sprite pose to present the creature.",
        StepKind::Pose,
    ));

    steps
}

pub fn step_by_id<'a>(steps: &'a [StepDefinition], id: &str) -> Option<&'a StepDefinition> {
    steps.iter().find(|step| step.id == id)
}

/// First step not yet present in the locked id set, in catalogue order.
pub fn next_unlocked<'a>(
    steps: &'a [StepDefinition],
    locked_ids: &[String],
) -> Option<&'a StepDefinition> {
    steps
        .iter()
        .find(|step| !locked_ids.iter().any(|id| *id == step.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_catalogue_starts_with_colour_and_ends_with_pose() {
        let steps = catalogue(&BuildParams::default());
        assert_eq!(steps.first().map(|s| s.id.as_str()), Some("colour"));
        assert_eq!(steps.last().map(|s| s.id.as_str()), Some("pose"));
        assert!(step_by_id(&steps, "tortie_toggle").is_some());
        assert!(step_by_id(&steps, "tortie_layer_1_mask").is_none());
    }

    #[test]
    fn enabling_tortie_grows_the_catalogue() {
        let mut params = BuildParams::default();
        let steps = catalogue(&params);
        let toggle = step_by_id(&steps, "tortie_toggle").expect("toggle step");
        toggle
            .apply("tortie_enable", &mut params)
            .expect("apply enable");

        let grown = catalogue(&params);
        assert!(step_by_id(&grown, "tortie_layer_1_mask").is_some());
        assert!(step_by_id(&grown, "tortie_layer_1_pattern").is_some());
        assert!(step_by_id(&grown, "tortie_layer_1_colour").is_some());
        assert!(step_by_id(&grown, "tortie_add_layer_2").is_some());
    }

    #[test]
    fn options_are_pure_for_fixed_params() {
        let params = BuildParams::default();
        let steps = catalogue(&params);
        for step in &steps {
            let first = step.options(&params);
            let second = step.options(&params);
            assert_eq!(first, second, "options changed between reads: {}", step.id);
            assert!(!first.is_empty(), "step {} offers no options", step.id);
        }
    }

    #[test]
    fn apply_rejects_unknown_option_key() {
        let mut params = BuildParams::default();
        let steps = catalogue(&params);
        let colour = step_by_id(&steps, "colour").expect("colour step");
        let err = colour
            .apply("NOT_A_COLOUR", &mut params)
            .expect_err("should reject");
        assert!(matches!(err, StepError::UnknownOption { .. }));
        assert_eq!(params, BuildParams::default());
    }

    #[test]
    fn applying_colour_mutates_params() {
        let mut params = BuildParams::default();
        let steps = catalogue(&params);
        let colour = step_by_id(&steps, "colour").expect("colour step");
        let applied = colour.apply("GINGER", &mut params).expect("apply");
        assert_eq!(params.colour, "GINGER");
        assert_eq!(applied.label, "Ginger");
    }

    #[test]
    fn secondary_eye_matching_primary_collapses_to_none() {
        let mut params = BuildParams::default();
        let steps = catalogue(&params);
        let secondary = step_by_id(&steps, "eye_secondary").expect("secondary step");
        secondary
            .apply("eye_secondary_YELLOW", &mut params)
            .expect("apply matching");
        assert_eq!(params.eye_colour2, None);

        secondary
            .apply("eye_secondary_GREEN", &mut params)
            .expect("apply distinct");
        assert_eq!(params.eye_colour2.as_deref(), Some("GREEN"));

        secondary
            .apply("eye_secondary_match", &mut params)
            .expect("apply match option");
        assert_eq!(params.eye_colour2, None);
    }

    #[test]
    fn palette_mode_changes_colour_options() {
        let mut params = BuildParams::default();
        params.palette_mode = "bold".to_string();
        let steps = catalogue(&params);
        let colour = step_by_id(&steps, "colour").expect("colour step");
        let options = colour.options(&params);
        assert!(options.iter().any(|o| o.key == "CRIMSON"));
        assert!(!options.iter().any(|o| o.key == "WHITE"));
    }

    #[test]
    fn next_unlocked_walks_catalogue_in_order() {
        let params = BuildParams::default();
        let steps = catalogue(&params);
        let locked = vec!["colour".to_string(), "pattern".to_string()];
        let next = next_unlocked(&steps, &locked).expect("next step");
        assert_eq!(next.id, "tortie_toggle");

        let all: Vec<String> = steps.iter().map(|s| s.id.clone()).collect();
        assert!(next_unlocked(&steps, &all).is_none());
    }

    #[test]
    fn accessory_flow_adds_and_fills_slots() {
        let mut params = BuildParams::default();
        let steps = catalogue(&params);
        let toggle = step_by_id(&steps, "accessories_toggle").expect("toggle");
        toggle
            .apply("accessory_enable", &mut params)
            .expect("enable");
        assert_eq!(params.accessory_slots, 1);
        assert_eq!(params.accessories.len(), 1);

        let steps = catalogue(&params);
        let slot = step_by_id(&steps, "accessory_slot_1").expect("slot step");
        slot.apply("accessory_slot_0_HOLLY", &mut params)
            .expect("pick accessory");
        assert_eq!(params.accessories[0].as_deref(), Some("HOLLY"));

        let steps = catalogue(&params);
        let more = step_by_id(&steps, "accessory_more_2").expect("more step");
        more.apply("accessory_more_2_yes", &mut params)
            .expect("add slot");
        assert_eq!(params.accessory_slots, 2);
    }
}
