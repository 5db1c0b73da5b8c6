//! Static trait vocabulary the catalogue draws options from.
//!
//! The lists are fixed per deployment; steps only ever read them.

pub const CLASSIC_COLOURS: &[&str] = &[
    "WHITE",
    "PALEGREY",
    "SILVER",
    "GREY",
    "DARKGREY",
    "GHOST",
    "BLACK",
    "CREAM",
    "PALEGINGER",
    "GOLDEN",
    "GINGER",
    "DARKGINGER",
    "SIENNA",
    "LIGHTBROWN",
    "LILAC",
    "BROWN",
    "GOLDENBROWN",
    "DARKBROWN",
    "CHOCOLATE",
];

pub const MOOD_COLOURS: &[&str] = &[
    "MIST", "STORM", "DUSK", "SAGE", "ROSEQUARTZ", "HEATHER", "FOG", "EMBERGLOW",
];

pub const BOLD_COLOURS: &[&str] = &[
    "CRIMSON", "FLAME", "COBALT", "EMERALD", "VIOLET", "FUCHSIA", "TEAL", "MARIGOLD",
];

pub const DARKER_COLOURS: &[&str] = &["ONYX", "CHARCOAL", "UMBER", "MAHOGANY", "RAVEN", "SOOT"];

pub const BLACKOUT_COLOURS: &[&str] = &["BLACK", "OBSIDIAN", "VOID", "INKBLACK"];

pub const PELT_NAMES: &[&str] = &[
    "SingleColour",
    "Tabby",
    "Marbled",
    "Rosette",
    "Smoke",
    "Ticked",
    "Speckled",
    "Bengal",
    "Mackerel",
    "Classic",
    "Sokoke",
    "Agouti",
    "Singlestripe",
    "Masked",
];

pub const EYE_COLOURS: &[&str] = &[
    "YELLOW",
    "AMBER",
    "HAZEL",
    "PALEGREEN",
    "GREEN",
    "BLUE",
    "DARKBLUE",
    "GREY",
    "CYAN",
    "EMERALD",
    "PALEBLUE",
    "GOLD",
    "COPPER",
    "SAGE",
    "COBALT",
    "SUNLITICE",
    "BRONZE",
];

pub const WHITE_PATCHES: &[&str] = &[
    "FULLWHITE",
    "ANY",
    "TUXEDO",
    "LITTLE",
    "COLOURPOINT",
    "VAN",
    "ANYTWO",
    "MOON",
    "PHANTOM",
    "POWDER",
    "BLEACHED",
    "SAVANNAH",
    "FADESPOTS",
    "PEBBLESHINE",
];

pub const POINTS: &[&str] = &[
    "COLOURPOINT",
    "RAGDOLL",
    "SEPIAPOINT",
    "MINKPOINT",
    "SEALPOINT",
];

pub const VITILIGO: &[&str] = &[
    "VITILIGO",
    "VITILIGOTWO",
    "MOON",
    "PHANTOM",
    "KARPATI",
    "POWDER",
    "BLEACHED",
    "SMOKEY",
];

pub const SKIN_COLOURS: &[&str] = &[
    "PINK",
    "BLACK",
    "DARKBROWN",
    "BROWN",
    "LIGHTBROWN",
    "DARKGREY",
    "GREY",
    "DARKSALMON",
    "SALMON",
    "PEACH",
    "BLUE",
    "RED",
];

pub const TINTS: &[&str] = &[
    "pink", "gray", "red", "orange", "yellow", "purple", "blue",
];

pub const TORTIE_MASKS: &[&str] = &[
    "ONE",
    "TWO",
    "THREE",
    "FOUR",
    "REDTAIL",
    "DELILAH",
    "HALF",
    "STREAK",
    "MASK",
    "SMOKE",
    "OREO",
    "SWOOP",
    "CHIMERA",
    "CHEST",
    "ARMTAIL",
    "MOTTLED",
    "SIDEMASK",
    "EYEDOT",
    "BANDANA",
    "PACMAN",
];

pub const PLANT_ACCESSORIES: &[&str] = &[
    "MAPLE LEAF",
    "HOLLY",
    "BLUE BERRIES",
    "FORGET ME NOTS",
    "RYE STALK",
    "LAUREL",
    "BLUEBELLS",
    "NETTLE",
    "POPPY",
    "LAVENDER",
    "HERBS",
    "PETALS",
];

pub const WILD_ACCESSORIES: &[&str] = &[
    "RED FEATHERS",
    "BLUE FEATHERS",
    "JAY FEATHERS",
    "MOTH WINGS",
    "CICADA WINGS",
];

pub const COLLAR_ACCESSORIES: &[&str] = &[
    "CRIMSON", "BLUE", "YELLOW", "CYAN", "RED", "LIME", "GREEN", "RAINBOW", "BLACK", "SPIKES",
    "WHITE", "PINK", "PURPLE", "MULTI", "INDIGO",
];

pub const BATTLE_SCARS: &[&str] = &[
    "ONE", "TWO", "THREE", "TAILSCAR", "SNOUT", "CHEEK", "SIDE", "THROAT", "TAILBASE", "BELLY",
    "LEGBITE", "NECKBITE", "FACE",
];

pub const MISSING_SCARS: &[&str] = &[
    "LEFTEAR",
    "RIGHTEAR",
    "NOTAIL",
    "HALFTAIL",
    "NOPAW",
    "NOLEFTEAR",
    "NORIGHTEAR",
    "NOEAR",
];

pub const ENVIRONMENTAL_SCARS: &[&str] = &[
    "SNAKE",
    "TOETRAP",
    "BURNPAWS",
    "BURNTAIL",
    "BURNBELLY",
    "BURNRUMP",
    "FROSTFACE",
    "FROSTTAIL",
    "FROSTMITT",
    "FROSTSOCK",
];

/// Sprite poses viewers may pick from. A handful of internal sprite slots
/// (kits and placeholder frames) are never offered.
pub const POSES: &[u32] = &[6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18];

/// Resolves the colour list for a palette mode; unknown modes fall back to
/// the classic palette, `all` is the deduplicated union.
pub fn colour_palette(mode: &str) -> Vec<&'static str> {
    let mut list: Vec<&'static str> = Vec::new();
    let mut push_all = |source: &[&'static str], list: &mut Vec<&'static str>| {
        for colour in source {
            if !list.contains(colour) {
                list.push(colour);
            }
        }
    };

    match mode.to_ascii_lowercase().as_str() {
        "all" => {
            push_all(CLASSIC_COLOURS, &mut list);
            push_all(MOOD_COLOURS, &mut list);
            push_all(BOLD_COLOURS, &mut list);
            push_all(DARKER_COLOURS, &mut list);
            push_all(BLACKOUT_COLOURS, &mut list);
        }
        "mood" => push_all(MOOD_COLOURS, &mut list),
        "bold" => push_all(BOLD_COLOURS, &mut list),
        "darker" => push_all(DARKER_COLOURS, &mut list),
        "blackout" => push_all(BLACKOUT_COLOURS, &mut list),
        _ => push_all(CLASSIC_COLOURS, &mut list),
    }
    list
}
