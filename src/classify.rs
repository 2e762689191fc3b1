//! Key-pattern classification.
//!
//! Maps a tensor key to a category via an ordered rule table evaluated
//! first-match-wins. Order matters: the indexed text-encoder prefixes are
//! checked before the general single-encoder prefix, and component
//! prefixes are checked before scale-role suffixes so a scale tensor
//! stored inside a component still travels with that component when
//! splitting.
//!
//! Unmatched keys are excluded from every bucket. That is documented
//! behavior, not an error; callers count them for reporting.

use crate::store::CheckpointDictionary;

/// Architecture component a key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    /// Text encoder (single-encoder checkpoints)
    Clip,
    /// First text encoder (dual-encoder checkpoints)
    ClipL,
    /// Second text encoder, OpenCLIP (dual-encoder checkpoints)
    ClipG,
    /// Denoising model
    Unet,
    /// Image encoder/decoder
    Vae,
}

impl Component {
    /// Short name used for selection flags and output file suffixes.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Clip => "clip",
            Self::ClipL => "clip_l",
            Self::ClipG => "clip_g",
            Self::Unet => "unet",
            Self::Vae => "vae",
        }
    }

    /// Parse a selection name (as given on the CLI).
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "clip" => Some(Self::Clip),
            "clip_l" => Some(Self::ClipL),
            "clip_g" => Some(Self::ClipG),
            "unet" => Some(Self::Unet),
            "vae" => Some(Self::Vae),
            _ => None,
        }
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Role a key plays in scale metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleRole {
    /// `.weight_scale`: value multiplies the weight as-is
    DirectMultiplier,
    /// `.scale`, `.scale_weight`, `.scale_reciprocal`: weight is divided
    /// by the stored value, so the multiplier is its reciprocal
    Divisor,
    /// `.scale_inv`: explicitly stored inverse, used as-is
    ExplicitInverse,
    /// Producer-specific artifacts carrying no value (`.comfy_quant`,
    /// `.scale_input`)
    Auxiliary,
}

/// Classification result for a tensor key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Key belongs to an architecture component
    Component(Component),
    /// Key is scale metadata outside any recognized component
    ScaleRole(ScaleRole),
    /// No rule matched; excluded from all buckets
    Unmatched,
}

/// Key predicate for a classification rule.
#[derive(Debug, Clone, Copy)]
enum Matcher {
    Prefix(&'static str),
    Suffix(&'static str),
}

impl Matcher {
    fn matches(self, key: &str) -> bool {
        match self {
            Self::Prefix(p) => key.starts_with(p),
            Self::Suffix(s) => key.ends_with(s),
        }
    }
}

/// Prefix of keys belonging to the second text encoder; its presence
/// anywhere in a dictionary implies the dual-encoder variant.
pub const SECOND_ENCODER_PREFIX: &str = "conditioner.embedders.1.";

/// Prefix applied to denoising-model keys.
pub const UNET_PREFIX: &str = "model.diffusion_model.";

/// Ordered classification rules, first match wins.
const RULES: &[(Matcher, Category)] = &[
    // Indexed encoder prefixes before the general single-encoder prefix.
    (
        Matcher::Prefix("conditioner.embedders.0."),
        Category::Component(Component::ClipL),
    ),
    (
        Matcher::Prefix(SECOND_ENCODER_PREFIX),
        Category::Component(Component::ClipG),
    ),
    (
        Matcher::Prefix("cond_stage_model."),
        Category::Component(Component::Clip),
    ),
    (
        Matcher::Prefix(UNET_PREFIX),
        Category::Component(Component::Unet),
    ),
    (
        Matcher::Prefix("first_stage_model."),
        Category::Component(Component::Vae),
    ),
    (
        Matcher::Suffix(".weight_scale"),
        Category::ScaleRole(ScaleRole::DirectMultiplier),
    ),
    (
        Matcher::Suffix(".scale_weight"),
        Category::ScaleRole(ScaleRole::Divisor),
    ),
    (
        Matcher::Suffix(".scale_reciprocal"),
        Category::ScaleRole(ScaleRole::Divisor),
    ),
    (
        Matcher::Suffix(".scale_inv"),
        Category::ScaleRole(ScaleRole::ExplicitInverse),
    ),
    (
        Matcher::Suffix(".scale_input"),
        Category::ScaleRole(ScaleRole::Auxiliary),
    ),
    // `.scale` last among the scale suffixes: every other convention also
    // ends in a longer, more specific suffix.
    (
        Matcher::Suffix(".scale"),
        Category::ScaleRole(ScaleRole::Divisor),
    ),
    (
        Matcher::Suffix(".comfy_quant"),
        Category::ScaleRole(ScaleRole::Auxiliary),
    ),
];

/// Classify a tensor key. Pure and total: every key maps to exactly one
/// category, falling through to [`Category::Unmatched`].
#[must_use]
pub fn classify(key: &str) -> Category {
    for (matcher, category) in RULES {
        if matcher.matches(key) {
            return *category;
        }
    }
    Category::Unmatched
}

/// Architecture variant of a checkpoint, decided by which text-encoder
/// keys are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchVariant {
    /// One text encoder (`cond_stage_model.`)
    SingleEncoder,
    /// Two text encoders (`conditioner.embedders.{0,1}.`)
    DualEncoder,
}

impl ArchVariant {
    /// Components that exist for this variant, in menu order.
    #[must_use]
    pub fn components(self) -> &'static [Component] {
        match self {
            Self::SingleEncoder => &[Component::Clip, Component::Unet, Component::Vae],
            Self::DualEncoder => &[
                Component::ClipL,
                Component::ClipG,
                Component::Unet,
                Component::Vae,
            ],
        }
    }

    /// True when `component` exists in this variant.
    #[must_use]
    pub fn has(self, component: Component) -> bool {
        self.components().contains(&component)
    }
}

/// Detect the architecture variant. Runs once per dictionary, before any
/// bucket selection is offered: presence of any second-encoder key implies
/// the dual-encoder variant.
#[must_use]
pub fn detect_variant(dict: &CheckpointDictionary) -> ArchVariant {
    if dict.keys().any(|k| k.starts_with(SECOND_ENCODER_PREFIX)) {
        ArchVariant::DualEncoder
    } else {
        ArchVariant::SingleEncoder
    }
}
