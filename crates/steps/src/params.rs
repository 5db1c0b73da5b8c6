use serde::{Deserialize, Serialize};

pub const MAX_TORTIE_LAYERS: u32 = 4;
pub const MAX_ACCESSORY_SLOTS: u32 = 10;
pub const MAX_SCAR_SLOTS: u32 = 6;

/// One tortie overlay: a pattern masked onto the base coat in a colour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TortieLayer {
    pub pattern: String,
    pub colour: String,
    pub mask: String,
}

/// The accumulated build parameters a session evolves step by step.
///
/// Serialized camelCase (with underscore-prefixed control fields) so stored
/// sessions keep the JSON shape downstream consumers already read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildParams {
    pub sprite_number: u32,
    pub pelt_name: String,
    pub colour: String,
    pub is_tortie: bool,
    pub tortie: Vec<TortieLayer>,
    pub eye_colour: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eye_colour2: Option<String>,
    pub skin_colour: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub white_patches: Option<String>,
    pub white_patches_tint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vitiligo: Option<String>,
    pub tint: String,
    pub shading: bool,
    pub reverse: bool,
    pub accessories: Vec<Option<String>>,
    pub scars: Vec<Option<String>>,
    #[serde(rename = "_tortieLayers")]
    pub tortie_layers: u32,
    #[serde(rename = "_accessorySlots")]
    pub accessory_slots: u32,
    #[serde(rename = "_scarSlots")]
    pub scar_slots: u32,
    #[serde(rename = "_signupsOpen")]
    pub signups_open: bool,
    #[serde(rename = "_votesOpen")]
    pub votes_open: bool,
    #[serde(rename = "_paletteMode")]
    pub palette_mode: String,
}

impl Default for BuildParams {
    fn default() -> Self {
        Self {
            sprite_number: 8,
            pelt_name: "SingleColour".to_string(),
            colour: "WHITE".to_string(),
            is_tortie: false,
            tortie: Vec::new(),
            eye_colour: "YELLOW".to_string(),
            eye_colour2: None,
            skin_colour: "PINK".to_string(),
            white_patches: None,
            white_patches_tint: "none".to_string(),
            points: None,
            vitiligo: None,
            tint: "none".to_string(),
            shading: false,
            reverse: false,
            accessories: Vec::new(),
            scars: Vec::new(),
            tortie_layers: 0,
            accessory_slots: 0,
            scar_slots: 0,
            signups_open: true,
            votes_open: false,
            palette_mode: "classic".to_string(),
        }
    }
}

impl BuildParams {
    /// Normalizes derived state after any mutation: layer and slot counts are
    /// clamped, backing arrays resized, and the tortie flag kept consistent.
    pub fn sync_derived_state(&mut self) {
        // Tortie layers.
        let mut count = self.tortie_layers.min(MAX_TORTIE_LAYERS);
        if !self.is_tortie && self.tortie.is_empty() && count == 0 {
            count = 0;
        }
        if !self.is_tortie {
            count = 0;
        }
        self.tortie_layers = count;
        self.is_tortie = count > 0;
        let mut layers = Vec::with_capacity(count as usize);
        for i in 0..count as usize {
            let existing = self.tortie.get(i);
            layers.push(TortieLayer {
                pattern: existing
                    .map(|l| l.pattern.clone())
                    .unwrap_or_else(|| self.pelt_name.clone()),
                colour: existing
                    .map(|l| l.colour.clone())
                    .unwrap_or_else(|| self.colour.clone()),
                mask: existing
                    .map(|l| l.mask.clone())
                    .unwrap_or_else(|| "ONE".to_string()),
            });
        }
        self.tortie = layers;

        // Accessory slots.
        self.accessory_slots = self.accessory_slots.min(MAX_ACCESSORY_SLOTS);
        self.accessories.truncate(self.accessory_slots as usize);
        self.accessories
            .resize(self.accessory_slots as usize, None);

        // Scar slots.
        self.scar_slots = self.scar_slots.min(MAX_SCAR_SLOTS);
        self.scars.truncate(self.scar_slots as usize);
        self.scars.resize(self.scar_slots as usize, None);
    }
}

/// Turns a trait key into a viewer-facing label: `FORGET ME NOTS` becomes
/// `Forget Me Nots`, `pelt_name` style keys get their separators spaced.
pub fn format_display_name(value: &str) -> String {
    let spaced = value.replace(['_', '-'], " ");
    let mut out = String::with_capacity(spaced.len());
    let mut at_word_start = true;
    for ch in spaced.chars() {
        if ch.is_whitespace() {
            at_word_start = true;
            out.push(ch);
        } else if at_word_start {
            out.extend(ch.to_uppercase());
            at_word_start = false;
        } else {
            out.extend(ch.to_lowercase());
        }
    }
    out
}
