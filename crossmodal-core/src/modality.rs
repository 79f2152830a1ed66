//! Sensing Modalities
//!
//! The push task observes the object through three channels:
//!
//! | Modality  | Observation key    | Tensor per element        |
//! |-----------|--------------------|---------------------------|
//! | `Image`   | `image`            | flattened `H × W` frame   |
//! | `Pos`     | `gripper_pos`      | gripper position          |
//! | `Sensors` | `gripper_sensors`  | force / tactile readings  |
//!
//! The set is closed, so it is an enum rather than a string key. Filters
//! bind to a [`ModalitySet`], a validated non-empty bitmask over the
//! three variants, in the same way a fusion update takes a bit mask of
//! available sensors (bit `i` = modality `i`).

use core::fmt;
use core::str::FromStr;

use crate::constants::MODALITY_KINDS;
use crate::errors::{FilterError, FilterResult};

/// One sensing channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Modality {
    /// Camera frame
    Image,
    /// Gripper position
    Pos,
    /// Gripper force / tactile sensors
    Sensors,
}

impl Modality {
    /// All modalities in canonical order
    pub const ALL: [Modality; MODALITY_KINDS] = [Modality::Image, Modality::Pos, Modality::Sensors];

    /// Short configuration name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Pos => "pos",
            Self::Sensors => "sensors",
        }
    }

    /// Key under which the raw tensor is recorded in datasets
    pub fn observation_key(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Pos => "gripper_pos",
            Self::Sensors => "gripper_sensors",
        }
    }

    /// Position in [`Modality::ALL`]
    pub fn index(&self) -> usize {
        match self {
            Self::Image => 0,
            Self::Pos => 1,
            Self::Sensors => 2,
        }
    }

    fn bit(&self) -> u8 {
        1 << self.index()
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Modality {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(Self::Image),
            "pos" | "gripper_pos" => Ok(Self::Pos),
            "sensors" | "gripper_sensors" => Ok(Self::Sensors),
            _ => Err(FilterError::InvalidModality),
        }
    }
}

/// Non-empty set of modalities a filter or measurement model consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModalitySet {
    bits: u8,
}

impl ModalitySet {
    /// Build from explicit variants
    ///
    /// Fails on an empty slice or a repeated modality.
    pub fn new(modalities: &[Modality]) -> FilterResult<Self> {
        if modalities.is_empty() {
            return Err(FilterError::EmptyModalitySet);
        }

        let mut bits = 0u8;
        for modality in modalities {
            if bits & modality.bit() != 0 {
                return Err(FilterError::DuplicateModality { modality: *modality });
            }
            bits |= modality.bit();
        }

        Ok(Self { bits })
    }

    /// Parse configuration names such as `["pos", "sensors"]`
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> FilterResult<Self> {
        let mut modalities = heapless::Vec::<Modality, MODALITY_KINDS>::new();
        for name in names {
            let modality: Modality = name.as_ref().parse()?;
            modalities
                .push(modality)
                .map_err(|modality| FilterError::DuplicateModality { modality })?;
        }
        Self::new(&modalities)
    }

    /// Set holding a single modality
    pub fn single(modality: Modality) -> Self {
        Self { bits: modality.bit() }
    }

    /// Every modality
    pub fn all() -> Self {
        Self { bits: (1 << MODALITY_KINDS) - 1 }
    }

    /// Membership test
    pub fn contains(&self, modality: Modality) -> bool {
        self.bits & modality.bit() != 0
    }

    /// Number of modalities in the set
    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Always false for a validated set
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Modalities in canonical order
    pub fn iter(&self) -> impl Iterator<Item = Modality> + '_ {
        Modality::ALL.into_iter().filter(move |m| self.contains(*m))
    }

    /// Union of two sets
    pub fn union(&self, other: &Self) -> Self {
        Self { bits: self.bits | other.bits }
    }

    /// True when no modality is shared
    pub fn is_disjoint(&self, other: &Self) -> bool {
        self.bits & other.bits == 0
    }

    /// True when `sets` are pairwise disjoint and cover every modality
    /// exactly once.
    pub fn is_partition(sets: &[ModalitySet]) -> bool {
        let mut covered = 0u8;
        for set in sets {
            if covered & set.bits != 0 {
                return false;
            }
            covered |= set.bits;
        }
        covered == Self::all().bits
    }
}

impl fmt::Display for ModalitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, modality) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(modality.name())?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_observation_keys() {
        assert_eq!("image".parse::<Modality>(), Ok(Modality::Image));
        assert_eq!("gripper_pos".parse::<Modality>(), Ok(Modality::Pos));
        assert_eq!("sensors".parse::<Modality>(), Ok(Modality::Sensors));
        assert_eq!("depth".parse::<Modality>(), Err(FilterError::InvalidModality));
    }

    #[test]
    fn rejects_empty_and_duplicate_sets() {
        assert_eq!(ModalitySet::new(&[]), Err(FilterError::EmptyModalitySet));
        assert_eq!(
            ModalitySet::new(&[Modality::Pos, Modality::Pos]),
            Err(FilterError::DuplicateModality { modality: Modality::Pos })
        );
        assert_eq!(
            ModalitySet::from_names(&["pos", "audio"]),
            Err(FilterError::InvalidModality)
        );
    }

    #[test]
    fn four_names_cannot_fit() {
        let err = ModalitySet::from_names(&["image", "pos", "sensors", "image"]).unwrap_err();
        assert_eq!(err, FilterError::DuplicateModality { modality: Modality::Image });
    }

    #[test]
    fn image_vs_pos_sensors_is_a_partition() {
        let image = ModalitySet::from_names(&["image"]).unwrap();
        let proprio = ModalitySet::from_names(&["pos", "sensors"]).unwrap();

        assert!(image.is_disjoint(&proprio));
        assert_eq!(image.union(&proprio), ModalitySet::all());
        assert!(ModalitySet::is_partition(&[image, proprio]));

        // Overlap or missing coverage both fail
        assert!(!ModalitySet::is_partition(&[image, ModalitySet::all()]));
        assert!(!ModalitySet::is_partition(&[proprio]));
    }

    #[test]
    fn iterates_in_canonical_order() {
        let set = ModalitySet::new(&[Modality::Sensors, Modality::Image]).unwrap();
        let order: heapless::Vec<Modality, 3> = set.iter().collect();
        assert_eq!(order.as_slice(), &[Modality::Image, Modality::Sensors]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn observation_keys_parse_back() {
        for modality in Modality::ALL {
            assert_eq!(modality.observation_key().parse::<Modality>(), Ok(modality));
        }
        assert_eq!(Modality::Sensors.observation_key(), "gripper_sensors");
    }
}
